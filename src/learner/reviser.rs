// src/learner/reviser.rs — Rewrites the working prompt from evaluation feedback
//
// Order of attempts: seed from remembered fixes (low scores only), external
// rewrite, then a deterministic directive template. The template always
// changes the text, so a revision never hands back the same prompt.

use std::collections::BTreeSet;
use std::sync::Arc;

use minijinja::context;

use crate::cache::ArtifactCache;
use crate::core::prompts::{PromptTemplates, REVISER_SYSTEM, REVISER_USER};
use crate::core::types::Source;
use crate::infra::errors::ChartsmithError;
use crate::provider::client::LlmClient;
use crate::util::truncate_str;

const REVISER_TEMPERATURE: f32 = 0.3;
const REVISER_MAX_TOKENS: u32 = 400;
const SEED_MAX_LEN: usize = 240;

pub const GENERAL_IMPROVEMENT: &str =
    "Please ensure the chart is clear, well-labeled, and effectively communicates the data insights.";

/// (tag fragment, directive). Directive text must not contain any of the
/// fallback generator's selection keywords, or a revision would switch the
/// chart family.
const DIRECTIVES: &[(&str, &str)] = &[
    ("axis", "Label both axes with descriptive titles"),
    ("title", "Give the chart a short descriptive title"),
    ("type", "Use a standard mark such as bar, line or point"),
    ("data", "Embed the values inline under data.values"),
    ("encoding", "Encode fields on both the x and y channels"),
    ("styling", "Set an explicit width and height"),
    ("responsive", "Make the layout responsive so it fits its container"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    pub text: String,
    pub reason: String,
    pub source: Source,
    /// Set when looking up remembered fixes failed; the revision still went ahead.
    pub storage_error: Option<String>,
}

pub struct Reviser {
    client: LlmClient,
    prompts: Arc<PromptTemplates>,
    cache: Option<Arc<ArtifactCache>>,
    seed_below_score: f64,
}

impl Reviser {
    pub fn new(
        client: LlmClient,
        prompts: Arc<PromptTemplates>,
        cache: Option<Arc<ArtifactCache>>,
        seed_below_score: f64,
    ) -> Self {
        Self {
            client,
            prompts,
            cache,
            seed_below_score,
        }
    }

    pub async fn revise(
        &self,
        text: &str,
        issues: &BTreeSet<String>,
        feedback: &str,
        score: f64,
        iteration: usize,
    ) -> Result<Revision, ChartsmithError> {
        let mut storage_error = None;
        let mut seeded_tags = Vec::new();
        let mut working = text.to_string();

        if score < self.seed_below_score {
            if let Some(cache) = &self.cache {
                match seed_from_fixes(cache, &working, issues) {
                    Ok((seeded, tags)) => {
                        working = seeded;
                        seeded_tags = tags;
                    }
                    Err(e) => {
                        tracing::error!(iteration, "Fix lookup failed: {:#}", e);
                        storage_error = Some(ChartsmithError::Storage(format!("{e:#}")).to_string());
                    }
                }
            }
        }

        let (text, mut reason, source) = match self
            .llm_rewrite(text, &working, issues, feedback, score, iteration)
            .await?
        {
            Some(rewritten) => {
                let tags = join_tags(issues);
                let summary = truncate_str(feedback, 80);
                let ellipsis = if summary.len() < feedback.len() { "..." } else { "" };
                (
                    rewritten,
                    format!("LLM rewrite addressed issues [{tags}] and feedback '{summary}{ellipsis}'"),
                    Source::Llm,
                )
            }
            None => {
                let (text, reason) = template_rewrite(&working, issues);
                (text, reason, Source::Template)
            }
        };

        if !seeded_tags.is_empty() {
            reason = format!(
                "Applied learned fix for [{}]; {}",
                seeded_tags.join(", "),
                reason
            );
        }

        Ok(Revision {
            text,
            reason,
            source,
            storage_error,
        })
    }

    /// `Ok(None)` means "use the template": offline, provider error, or a
    /// reply that is empty or repeats either the caller's text or the seeded one.
    async fn llm_rewrite(
        &self,
        original: &str,
        text: &str,
        issues: &BTreeSet<String>,
        feedback: &str,
        score: f64,
        iteration: usize,
    ) -> Result<Option<String>, ChartsmithError> {
        if self.client.is_offline() {
            return Ok(None);
        }

        let system = self.prompts.render(REVISER_SYSTEM, context! {})?;
        let user = self.prompts.render(
            REVISER_USER,
            context! {
                prompt => text,
                issues => issues.iter().collect::<Vec<_>>(),
                feedback => feedback,
                score => format!("{score:.2}"),
            },
        )?;

        match self
            .client
            .complete(&system, &user, REVISER_TEMPERATURE, REVISER_MAX_TOKENS)
            .await
        {
            Ok(reply) => {
                let reply = reply.trim();
                if reply.is_empty() || reply == text.trim() || reply == original.trim() {
                    tracing::warn!(iteration, "Rewrite reply was empty or unchanged; using template");
                    Ok(None)
                } else {
                    Ok(Some(reply.to_string()))
                }
            }
            Err(e) => {
                tracing::warn!(iteration, "Rewrite unavailable, using template: {}", e);
                Ok(None)
            }
        }
    }
}

/// Append the best remembered fix for each issue, unless the text already
/// carries it. Returns the new text and the tags that contributed.
fn seed_from_fixes(
    cache: &ArtifactCache,
    text: &str,
    issues: &BTreeSet<String>,
) -> anyhow::Result<(String, Vec<String>)> {
    let mut out = text.to_string();
    let mut used = Vec::new();

    for tag in issues {
        let Some(fix) = cache.best_fix(tag)? else {
            continue;
        };
        let snippet = truncate_str(fix.text.trim(), SEED_MAX_LEN);
        if snippet.is_empty() || out.contains(snippet) {
            continue;
        }
        out.push_str(&format!(
            "\n\nPreviously successful approach for {tag}: {snippet}"
        ));
        used.push(tag.clone());
    }
    Ok((out, used))
}

/// Deterministic rewrite: one directive per recognized issue category, or
/// the general improvement sentence when nothing new applies.
pub fn template_rewrite(text: &str, issues: &BTreeSet<String>) -> (String, String) {
    let directives: Vec<&str> = DIRECTIVES
        .iter()
        .filter(|(fragment, _)| issues.iter().any(|tag| tag.contains(fragment)))
        .map(|(_, directive)| *directive)
        .filter(|directive| !text.contains(directive))
        .collect();

    if directives.is_empty() {
        return (
            format!("{text}\n\n{GENERAL_IMPROVEMENT}"),
            "General improvement template applied".to_string(),
        );
    }

    let block: Vec<String> = directives.iter().map(|d| format!("- {d}")).collect();
    (
        format!("{text}\n\nAdditional requirements:\n{}", block.join("\n")),
        format!(
            "Template rewrite addressing {} issue{}: {}",
            issues.len(),
            if issues.len() == 1 { "" } else { "s" },
            join_tags(issues)
        ),
    )
}

fn join_tags(issues: &BTreeSet<String>) -> String {
    if issues.is_empty() {
        return "none".into();
    }
    issues.iter().cloned().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RunRecord;
    use crate::chart::templates::{template_for, TemplateKind};
    use crate::infra::config::CacheConfig;
    use crate::provider::{ChatRequest, ChatResponse, ModelInfo, ModelProvider, StopReason, TokenUsage};
    use async_trait::async_trait;

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn offline_reviser(cache: Option<Arc<ArtifactCache>>) -> Reviser {
        Reviser::new(
            LlmClient::offline(),
            Arc::new(PromptTemplates::new()),
            cache,
            8.0,
        )
    }

    struct Canned(&'static str);

    #[async_trait]
    impl ModelProvider for Canned {
        fn id(&self) -> &str {
            "canned"
        }
        fn name(&self) -> &str {
            "Canned"
        }
        fn models(&self) -> Vec<ModelInfo> {
            vec![]
        }
        async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse, ChartsmithError> {
            Ok(ChatResponse {
                content: self.0.to_string(),
                usage: TokenUsage::default(),
                stop_reason: StopReason::EndTurn,
            })
        }
    }

    // ─── Template ───────────────────────────────────────────────

    #[test]
    fn test_template_directives() {
        let (text, reason) = template_rewrite("base", &tags(&["missing_title", "not_responsive"]));
        assert!(text.starts_with("base\n\nAdditional requirements:\n"));
        assert!(text.contains("- Give the chart a short descriptive title"));
        assert!(text.contains("- Make the layout responsive"));
        assert!(reason.contains("2 issues"));
    }

    #[test]
    fn test_template_general_sentence() {
        let (text, reason) = template_rewrite("base", &tags(&[]));
        assert_eq!(text, format!("base\n\n{GENERAL_IMPROVEMENT}"));
        assert_eq!(reason, "General improvement template applied");
    }

    #[test]
    fn test_template_never_unchanged() {
        let issues = tags(&["not_responsive"]);
        let (once, _) = template_rewrite("base", &issues);
        let (twice, _) = template_rewrite(&once, &issues);
        assert_ne!(once, twice);
        assert!(twice.ends_with(GENERAL_IMPROVEMENT));
    }

    #[test]
    fn test_directives_keep_template_family() {
        let all = tags(&[
            "partial_axis_labels",
            "missing_title",
            "invalid_chart_type",
            "missing_data",
            "partial_encoding",
            "missing_styling",
            "not_responsive",
        ]);
        let (text, _) = template_rewrite("Plot widgets", &all);
        assert_eq!(TemplateKind::select(&text), TemplateKind::Default);
    }

    // ─── Revise ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_offline_revise_uses_template() {
        let r = offline_reviser(None)
            .revise("p", &tags(&["not_responsive"]), "", 9.6, 1)
            .await
            .unwrap();
        assert_eq!(r.source, Source::Template);
        assert!(r.text.contains("responsive"));
        assert!(r.storage_error.is_none());
    }

    #[tokio::test]
    async fn test_low_score_seeds_from_fix() {
        let cache = Arc::new(ArtifactCache::in_memory(CacheConfig::default()).unwrap());
        cache
            .record(&RunRecord {
                query: "earlier".into(),
                artifact: template_for("x"),
                revision_text: "Always include a chart title".into(),
                combined_score: 9.0,
                iterations: 2,
                termination: "stop_success".into(),
                issues: tags(&["missing_title"]),
            })
            .unwrap();

        let reviser = offline_reviser(Some(cache));
        let r = reviser
            .revise("p", &tags(&["missing_title"]), "", 5.0, 1)
            .await
            .unwrap();
        assert!(r
            .text
            .contains("Previously successful approach for missing_title: Always include a chart title"));
        assert!(r.reason.starts_with("Applied learned fix for [missing_title]"));

        // High scores skip seeding
        let high = reviser
            .revise("p", &tags(&["missing_title"]), "", 8.5, 1)
            .await
            .unwrap();
        assert!(!high.text.contains("Previously successful approach"));
    }

    #[tokio::test]
    async fn test_llm_rewrite_used() {
        let reviser = Reviser::new(
            LlmClient::new(Arc::new(Canned("  A sharper prompt  ")), "c"),
            Arc::new(PromptTemplates::new()),
            None,
            8.0,
        );
        let r = reviser
            .revise("p", &tags(&["missing_title"]), "needs a title", 6.0, 1)
            .await
            .unwrap();
        assert_eq!(r.source, Source::Llm);
        assert_eq!(r.text, "A sharper prompt");
        assert!(r.reason.contains("[missing_title]"));
    }

    #[tokio::test]
    async fn test_unchanged_llm_reply_falls_back() {
        let reviser = Reviser::new(
            LlmClient::new(Arc::new(Canned("p")), "c"),
            Arc::new(PromptTemplates::new()),
            None,
            8.0,
        );
        let r = reviser
            .revise("p", &tags(&["missing_title"]), "", 6.0, 1)
            .await
            .unwrap();
        assert_eq!(r.source, Source::Template);
        assert_ne!(r.text, "p");
    }

    #[tokio::test]
    async fn test_reply_repeating_input_after_seeding_falls_back() {
        let cache = Arc::new(ArtifactCache::in_memory(CacheConfig::default()).unwrap());
        cache
            .record(&RunRecord {
                query: "earlier".into(),
                artifact: template_for("x"),
                revision_text: "Always include a chart title".into(),
                combined_score: 9.0,
                iterations: 2,
                termination: "stop_success".into(),
                issues: tags(&["missing_title"]),
            })
            .unwrap();

        let reviser = Reviser::new(
            LlmClient::new(Arc::new(Canned("p")), "c"),
            Arc::new(PromptTemplates::new()),
            Some(cache),
            8.0,
        );
        let r = reviser
            .revise("p", &tags(&["missing_title"]), "", 5.0, 1)
            .await
            .unwrap();
        assert_eq!(r.source, Source::Template);
        assert_ne!(r.text, "p");
        assert!(r.text.contains("Previously successful approach for missing_title"));
        assert!(r.text.contains("Give the chart a short descriptive title"));
    }
}
