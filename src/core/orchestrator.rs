// src/core/orchestrator.rs — Iteration controller

use std::sync::Arc;
use std::time::Instant;

use super::combiner::{summarize, QualityBand, ScoreCombiner};
use super::policy::{Termination, TerminationPolicy};
use super::prompts::PromptTemplates;
use super::types::*;
use crate::cache::{ArtifactCache, CacheEntry, RunRecord};
use crate::chart::generator::CandidateGenerator;
use crate::chart::prompt::PromptGenerator;
use crate::clarifier::Clarifier;
use crate::evaluator::{QualityEvaluator, RuleEvaluator};
use crate::infra::config::Config;
use crate::infra::errors::ChartsmithError;
use crate::learner::Reviser;
use crate::provider::client::LlmClient;

/// The central orchestrator that drives the generate-evaluate-revise loop.
pub struct Orchestrator {
    prompter: PromptGenerator,
    generator: CandidateGenerator,
    rules: RuleEvaluator,
    quality: QualityEvaluator,
    combiner: ScoreCombiner,
    policy: TerminationPolicy,
    reviser: Reviser,
    clarifier: Clarifier,
    cache: Option<Arc<ArtifactCache>>,
    model: String,
    preflight_clarify: bool,
    /// Optional callback for real-time progress events.
    on_progress: Option<Box<dyn Fn(ProgressEvent) + Send + Sync>>,
}

/// How the iteration loop ended, before the outcome is assembled.
enum LoopEnd {
    Stopped(Termination),
    Escalated(usize),
}

impl Orchestrator {
    /// Fails only when the scoring weights in `config` are invalid.
    pub fn new(
        client: LlmClient,
        config: &Config,
        cache: Option<Arc<ArtifactCache>>,
    ) -> Result<Self, ChartsmithError> {
        let prompts = Arc::new(PromptTemplates::new());

        Ok(Self {
            prompter: PromptGenerator::new(client.clone(), prompts.clone()),
            generator: CandidateGenerator::new(
                client.clone(),
                prompts.clone(),
                config.iteration.cache_first,
            ),
            rules: RuleEvaluator::new(),
            quality: QualityEvaluator::new(client.clone(), prompts.clone()),
            combiner: ScoreCombiner::from_config(&config.scoring)?,
            policy: TerminationPolicy::from(&config.policy),
            reviser: Reviser::new(
                client.clone(),
                prompts,
                cache.clone(),
                config.cache.seed_below_score,
            ),
            clarifier: Clarifier::new(),
            cache,
            model: client.describe(),
            preflight_clarify: config.iteration.preflight_clarify,
            on_progress: None,
        })
    }

    /// Set a callback for real-time progress events.
    pub fn with_progress(mut self, cb: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    /// Fire a progress event if a callback is set.
    fn emit(&self, event: ProgressEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    /// Run the full iteration loop for one query.
    ///
    /// Returns `Err` only for invalid input. Everything that goes wrong once
    /// the loop has started is reported through the outcome.
    pub async fn run(&self, request: RunRequest) -> Result<RunOutcome, ChartsmithError> {
        let query = request.query.trim().to_string();
        if query.is_empty() {
            return Err(ChartsmithError::MissingInput("query is empty".into()));
        }
        if request.max_iterations == 0 {
            return Err(ChartsmithError::MissingInput(
                "max_iterations must be at least 1".into(),
            ));
        }

        let start = Instant::now();

        if self.preflight_clarify {
            let clarification = self.clarifier.analyze(&query);
            if clarification.is_blocking() {
                tracing::info!(category = %clarification.category, "Query needs clarification before generation");
                self.emit(ProgressEvent::Escalated {
                    iteration: None,
                    category: clarification.category,
                });
                return Ok(RunOutcome::Clarification(ClarificationRequest {
                    query,
                    category: clarification.category,
                    question: clarification.question,
                    suggested_query: clarification.suggested_query,
                    iteration: None,
                    history: RunHistory::new(),
                }));
            }
        }

        let mut storage_error = None;
        let cached = match &self.cache {
            Some(cache) => match cache.lookup_exact(&query) {
                Ok(hit) => hit,
                Err(e) => {
                    tracing::error!("Cache lookup failed: {:#}", e);
                    storage_error = Some(ChartsmithError::Storage(format!("{e:#}")).to_string());
                    None
                }
            },
            None => None,
        };

        self.emit(ProgressEvent::RunStarted {
            query: query.clone(),
            max_iterations: request.max_iterations,
            model: self.model.clone(),
            cache_hit: cached.is_some(),
        });

        let mut history = RunHistory::new();
        let mut current = 0;
        let end = self
            .iterate(
                &query,
                request.max_iterations,
                cached,
                &mut history,
                &mut current,
                &mut storage_error,
            )
            .await;

        let termination = match end {
            Ok(LoopEnd::Stopped(termination)) => termination,
            Ok(LoopEnd::Escalated(iteration)) => {
                let clarification = self.clarifier.analyze(&query);
                self.emit(ProgressEvent::Escalated {
                    iteration: Some(iteration),
                    category: clarification.category,
                });
                return Ok(RunOutcome::Clarification(ClarificationRequest {
                    query,
                    category: clarification.category,
                    question: clarification.question,
                    suggested_query: clarification.suggested_query,
                    iteration: Some(iteration),
                    history,
                }));
            }
            Err(e) => {
                tracing::error!(iteration = current, "Run failed: {}", e);
                return Ok(RunOutcome::Failed(RunFailure {
                    error: e.to_string(),
                    iteration: current,
                    history,
                }));
            }
        };

        let Some(best) = history.best().cloned() else {
            return Ok(RunOutcome::Failed(RunFailure {
                error: "loop ended without any iteration".into(),
                iteration: current,
                history,
            }));
        };

        let mut run_id = uuid::Uuid::new_v4().to_string();
        if let Some(cache) = &self.cache {
            let record = RunRecord {
                query: query.clone(),
                artifact: best.artifact.clone(),
                revision_text: best.prompt.clone(),
                combined_score: best.combined,
                iterations: history.len(),
                termination: termination.as_str().to_string(),
                issues: history.all_rule_issues(),
            };
            match cache.record(&record) {
                Ok(outcome) => run_id = outcome.run_id,
                Err(e) => {
                    tracing::error!("Cache write failed: {:#}", e);
                    storage_error
                        .get_or_insert_with(|| ChartsmithError::Storage(format!("{e:#}")).to_string());
                }
            }
        }

        self.emit(ProgressEvent::Complete {
            best_score: best.combined,
            iterations: history.len(),
            termination,
        });

        tracing::info!(
            run_id = %run_id,
            score = best.combined,
            iterations = history.len(),
            termination = %termination,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Run complete"
        );

        Ok(RunOutcome::Completed(RunReport {
            run_id,
            query,
            model: self.model.clone(),
            band: QualityBand::from_score(best.combined),
            summary: summarize(
                best.combined,
                history.len(),
                best.rules.score,
                best.quality.as_ref().map(|q| q.score),
            ),
            best_artifact: best.artifact,
            best_score: best.combined,
            best_iteration: best.index,
            termination,
            history,
            storage_error,
        }))
    }

    async fn iterate(
        &self,
        query: &str,
        max_iterations: usize,
        cached: Option<CacheEntry>,
        history: &mut RunHistory,
        current: &mut usize,
        storage_error: &mut Option<String>,
    ) -> Result<LoopEnd, ChartsmithError> {
        *current = 1;
        let mut prompt = self.prompter.draft(query, cached.as_ref()).await?.text;
        let mut cached = cached;

        for index in 1..=max_iterations {
            *current = index;
            self.emit(ProgressEvent::IterationStart {
                iteration: index,
                max_iterations,
            });

            let ctx = IterationContext {
                index,
                query: query.to_string(),
                prompt: prompt.clone(),
                cached: cached.take(),
            };
            let generated = self.generator.generate(&ctx).await?;
            let rules = self.rules.evaluate(&generated.artifact);

            // Structural failures escalate before the judge is consulted.
            let early = self
                .policy
                .decide(rules.score, index, max_iterations, &rules.issues);
            if early == Termination::EscalateClarify {
                tracing::warn!(iteration = index, "Artifact is structurally invalid; escalating");
                self.emit(ProgressEvent::IterationEnd {
                    iteration: index,
                    rule_score: rules.score,
                    quality_score: None,
                    combined: rules.score,
                    decision: early,
                });
                history.push(IterationRecord {
                    index,
                    prompt,
                    artifact: generated.artifact,
                    source: generated.source,
                    combined: rules.score,
                    rules,
                    quality: None,
                    decision: early,
                    revision_reason: None,
                });
                return Ok(LoopEnd::Escalated(index));
            }

            let quality = self
                .quality
                .evaluate(&generated.artifact, query, index)
                .await?;
            let combined = self.combiner.combine(rules.score, quality.score);
            let decision = self
                .policy
                .decide(combined, index, max_iterations, &rules.issues);

            tracing::debug!(
                iteration = index,
                rule = rules.score,
                quality = quality.score,
                combined,
                decision = %decision,
                "Iteration scored"
            );
            self.emit(ProgressEvent::IterationEnd {
                iteration: index,
                rule_score: rules.score,
                quality_score: Some(quality.score),
                combined,
                decision,
            });

            let revision = if decision == Termination::Continue {
                let mut issues = rules.issues.clone();
                issues.extend(quality.issues.iter().cloned());
                let revision = self
                    .reviser
                    .revise(&prompt, &issues, quality.feedback(), combined, index)
                    .await?;
                if let Some(e) = &revision.storage_error {
                    storage_error.get_or_insert_with(|| e.clone());
                }
                Some(revision)
            } else {
                None
            };

            history.push(IterationRecord {
                index,
                prompt,
                artifact: generated.artifact,
                source: generated.source,
                rules,
                quality: Some(quality),
                combined,
                decision,
                revision_reason: revision.as_ref().map(|r| r.reason.clone()),
            });

            match revision {
                Some(revision) => prompt = revision.text,
                None => return Ok(LoopEnd::Stopped(decision)),
            }
        }

        // The policy stops at the budget, so this is only reached if it is
        // configured to never stop.
        Ok(LoopEnd::Stopped(Termination::StopMaxIter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn offline(cache: Option<Arc<ArtifactCache>>) -> Orchestrator {
        Orchestrator::new(LlmClient::offline(), &Config::default(), cache).unwrap()
    }

    // ─── Input validation ───────────────────────────────────────

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let err = offline(None).run(RunRequest::new("   ", 3)).await.unwrap_err();
        assert!(matches!(err, ChartsmithError::MissingInput(_)));
    }

    #[tokio::test]
    async fn test_zero_iterations_rejected() {
        let err = offline(None)
            .run(RunRequest::new("revenue by region over time", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ChartsmithError::MissingInput(_)));
    }

    #[test]
    fn test_bad_weights_rejected() {
        let mut config = Config::default();
        config.scoring.rule_weight = 0.5;
        assert!(Orchestrator::new(LlmClient::offline(), &config, None).is_err());
    }

    // ─── Offline loop ───────────────────────────────────────────

    #[tokio::test]
    async fn test_offline_run_converges_on_second_iteration() {
        let outcome = offline(None)
            .run(RunRequest::new("Show me revenue by region over time", 5))
            .await
            .unwrap();
        let RunOutcome::Completed(report) = outcome else {
            panic!("expected a completed run");
        };

        assert_eq!(report.history.len(), 2);
        assert_eq!(report.termination, Termination::StopSuccess);
        assert_eq!(report.best_iteration, 2);
        assert_eq!(report.best_score, 10.0);
        assert_eq!(report.band, QualityBand::Optimal);
        assert!(report.storage_error.is_none());

        let first = &report.history.records()[0];
        assert_eq!(first.combined, 9.6);
        assert_eq!(first.decision, Termination::Continue);
        assert!(first.rules.issues.contains("not_responsive"));
        assert!(first.revision_reason.is_some());

        let second = &report.history.records()[1];
        assert!(second.prompt.contains("responsive"));
        assert!(second.artifact.autosize().is_some());
        assert!(second.revision_reason.is_none());
    }

    #[tokio::test]
    async fn test_single_iteration_budget_stops_at_max() {
        let outcome = offline(None)
            .run(RunRequest::new("Show me revenue by region over time", 1))
            .await
            .unwrap();
        let RunOutcome::Completed(report) = outcome else {
            panic!("expected a completed run");
        };
        assert_eq!(report.termination, Termination::StopMaxIter);
        assert_eq!(report.history.len(), 1);
    }

    #[tokio::test]
    async fn test_preflight_blocks_vague_query() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let orch = offline(None).with_progress(move |e| sink.lock().unwrap().push(e));

        let outcome = orch.run(RunRequest::new("show me business data", 3)).await.unwrap();
        let RunOutcome::Clarification(request) = outcome else {
            panic!("expected clarification");
        };
        assert_eq!(request.iteration, None);
        assert!(request.history.is_empty());
        assert_eq!(
            request.suggested_query,
            "Show me revenue trends over the last 12 months"
        );

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ProgressEvent::Escalated { iteration: None, .. }));
    }

    #[tokio::test]
    async fn test_progress_events_in_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let orch = offline(None).with_progress(move |e| sink.lock().unwrap().push(e));
        orch.run(RunRequest::new("Show me revenue by region over time", 5))
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert!(matches!(events[0], ProgressEvent::RunStarted { cache_hit: false, .. }));
        assert!(matches!(events[1], ProgressEvent::IterationStart { iteration: 1, .. }));
        assert!(matches!(events[2], ProgressEvent::IterationEnd { iteration: 1, .. }));
        assert!(matches!(events[3], ProgressEvent::IterationStart { iteration: 2, .. }));
        assert!(matches!(events[4], ProgressEvent::IterationEnd { iteration: 2, .. }));
        assert!(matches!(
            events[5],
            ProgressEvent::Complete { iterations: 2, termination: Termination::StopSuccess, .. }
        ));
    }

    // ─── Cache interplay ────────────────────────────────────────

    #[tokio::test]
    async fn test_completed_run_recorded_and_reused() {
        let cache = Arc::new(ArtifactCache::in_memory(Default::default()).unwrap());
        let orch = offline(Some(cache.clone()));

        orch.run(RunRequest::new("Show me revenue by region over time", 5))
            .await
            .unwrap();

        let entry = cache
            .lookup_exact("show me revenue   by region over time")
            .unwrap()
            .expect("entry written");
        assert_eq!(entry.best_score, 10.0);
        assert!(entry.revision_text.contains("responsive"));
        let fix = cache.best_fix("not_responsive").unwrap().unwrap();
        assert_eq!(fix.text, entry.revision_text);

        let outcome = orch
            .run(RunRequest::new("Show me revenue by region over time", 5))
            .await
            .unwrap();
        let RunOutcome::Completed(report) = outcome else {
            panic!("expected a completed run");
        };
        let first = &report.history.records()[0];
        assert_eq!(first.source, Source::Cache);
        assert_eq!(first.prompt, entry.revision_text);
        assert_eq!(cache.stats().unwrap().total_runs, 2);
    }
}
