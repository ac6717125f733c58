// src/evaluator/quality.rs — Quality judge with a deterministic fallback rubric
//
// The judge is an external model asked for a JSON verdict. Any failure
// (provider error, timeout, unparseable or out-of-range reply) falls back to
// a keyword rubric over (artifact, intent) that needs no provider.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use minijinja::context;

use super::parser::parse_judge_response;
use super::{EvaluationDetail, EvaluationMethod, EvaluationResult, QualityDetail};
use crate::chart::Artifact;
use crate::core::prompts::{PromptTemplates, JUDGE_SYSTEM, JUDGE_USER};
use crate::infra::errors::ChartsmithError;
use crate::provider::client::LlmClient;
use crate::util::round2;

const JUDGE_TEMPERATURE: f32 = 0.2;
const JUDGE_MAX_TOKENS: u32 = 400;
const FALLBACK_BASE: f64 = 7.0;

pub struct QualityEvaluator {
    client: LlmClient,
    prompts: Arc<PromptTemplates>,
}

impl QualityEvaluator {
    pub fn new(client: LlmClient, prompts: Arc<PromptTemplates>) -> Self {
        Self { client, prompts }
    }

    /// Judge the artifact against the user's intent.
    ///
    /// Only a prompt rendering failure is returned as an error; every
    /// provider-side problem degrades to [`fallback_evaluation`].
    pub async fn evaluate(
        &self,
        artifact: &Artifact,
        intent: &str,
        iteration: usize,
    ) -> Result<EvaluationResult, ChartsmithError> {
        if self.client.is_offline() {
            return Ok(fallback_evaluation(artifact, intent));
        }

        let system = self.prompts.render(JUDGE_SYSTEM, context! {})?;
        let user = self.prompts.render(
            JUDGE_USER,
            context! { query => intent, chart => artifact.to_pretty_json() },
        )?;

        let reply = match self
            .client
            .complete(&system, &user, JUDGE_TEMPERATURE, JUDGE_MAX_TOKENS)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(iteration, "Quality judge unavailable, using fallback: {}", e);
                return Ok(fallback_evaluation(artifact, intent));
            }
        };

        match parse_judge_response(&reply) {
            Ok(verdict) => Ok(EvaluationResult {
                score: verdict.score,
                issues: weakness_tags(&verdict.weaknesses),
                detail: EvaluationDetail::Quality(QualityDetail {
                    strengths: verdict.strengths,
                    weaknesses: verdict.weaknesses,
                    feedback: verdict.feedback,
                    criteria: BTreeMap::new(),
                }),
                method: EvaluationMethod::Llm,
            }),
            Err(e) => {
                tracing::warn!(iteration, "Quality judge reply rejected, using fallback: {}", e);
                Ok(fallback_evaluation(artifact, intent))
            }
        }
    }
}

/// Keyword hints that turn a judge's free-text weakness into an issue tag.
const WEAKNESS_HINTS: &[(&[&str], &str)] = &[
    (&["axis", "axes"], "judge_axis"),
    (&["title"], "judge_title"),
    (&["chart type", "mark"], "judge_type"),
    (&["encoding", "channel"], "judge_encoding"),
    (&["color", "colour", "style", "visual"], "judge_styling"),
    (&["responsive", "container", "resize"], "judge_responsive"),
];

/// Issue tags for a judge's weaknesses. Unrecognized weaknesses add nothing;
/// they still reach the reviser through the feedback text.
fn weakness_tags(weaknesses: &[String]) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for weakness in weaknesses {
        let lower = weakness.to_lowercase();
        for (words, tag) in WEAKNESS_HINTS {
            if mentions(&lower, words) {
                tags.insert((*tag).to_string());
            }
        }
    }
    tags
}

/// Deterministic rubric: base 7.0 plus per-dimension deltas, clamped to [0, 10].
pub fn fallback_evaluation(artifact: &Artifact, intent: &str) -> EvaluationResult {
    let mut feedback = Vec::new();

    let intent_delta = intent_match(artifact.mark_kind(), intent, &mut feedback);
    let clarity = clarity(artifact, &mut feedback);
    let insight = insight(artifact, &mut feedback);
    let aesthetics = aesthetics(artifact, &mut feedback);
    let accuracy = accuracy(artifact, &mut feedback);

    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    let mut judge = |passed: bool, strength: &str, weakness: &str| {
        if passed {
            strengths.push(strength.to_string());
        } else {
            weaknesses.push(weakness.to_string());
        }
    };
    judge(
        intent_delta > 0.0,
        "Appropriate chart type for the request",
        "Chart type may not be optimal for the request",
    );
    judge(
        clarity > 0.5,
        "Clear and readable design",
        "Could improve clarity and readability",
    );
    judge(
        insight > 0.3,
        "Good potential for insights",
        "Limited insight potential",
    );
    judge(
        aesthetics > 0.5,
        "Good aesthetic quality",
        "Could enhance visual appeal",
    );
    judge(
        accuracy > 0.8,
        "Accurate data representation",
        "Data representation could be improved",
    );

    let raw = FALLBACK_BASE + intent_delta + clarity + insight + aesthetics + accuracy;
    let criteria = BTreeMap::from([
        ("intent".to_string(), intent_delta),
        ("clarity".to_string(), clarity),
        ("insight".to_string(), insight),
        ("aesthetics".to_string(), aesthetics),
        ("accuracy".to_string(), accuracy),
    ]);

    EvaluationResult {
        score: round2(raw.clamp(0.0, 10.0)),
        issues: BTreeSet::new(),
        detail: EvaluationDetail::Quality(QualityDetail {
            strengths,
            weaknesses,
            feedback: feedback.join(" "),
            criteria,
        }),
        method: EvaluationMethod::Fallback,
    }
}

// ─── Dimensions ─────────────────────────────────────────────────────────────

fn mentions(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

fn intent_match(mark: &str, intent: &str, feedback: &mut Vec<String>) -> f64 {
    let intent = intent.to_lowercase();

    if mentions(&intent, &["time", "trend", "month", "year"]) {
        return match mark {
            "line" => {
                feedback.push("Line chart appropriately shows temporal trends.".into());
                1.0
            }
            "area" => {
                feedback.push("Area chart shows temporal trends but a line might be clearer.".into());
                0.8
            }
            _ => {
                feedback.push(format!(
                    "Chart type '{mark}' may not be optimal for time-based data."
                ));
                -0.5
            }
        };
    }

    if mentions(&intent, &["compare", "region", "category"]) {
        return if matches!(mark, "bar" | "column") {
            feedback.push("Bar chart effectively compares categories.".into());
            1.0
        } else {
            feedback.push(format!(
                "Chart type '{mark}' may not be optimal for comparisons."
            ));
            0.0
        };
    }

    if mentions(&intent, &["distribution", "spread", "correlation"]) {
        return if matches!(mark, "point" | "circle") {
            feedback.push("Scatter plot effectively shows distribution and correlations.".into());
            1.0
        } else {
            feedback.push(format!(
                "Chart type '{mark}' may not show distribution effectively."
            ));
            0.0
        };
    }

    feedback.push(format!(
        "Chart type '{mark}' is generally suitable for the request."
    ));
    0.5
}

fn clarity(a: &Artifact, feedback: &mut Vec<String>) -> f64 {
    let mut score = 0.0;
    if a.title_text().is_some() {
        score += 0.5;
        feedback.push("Chart has a clear title.".into());
    } else {
        feedback.push("Chart lacks a descriptive title.".into());
    }

    match (a.channel_has_title("x"), a.channel_has_title("y")) {
        (true, true) => {
            score += 0.5;
            feedback.push("Both axes are properly labeled.".into());
        }
        (true, false) | (false, true) => {
            score += 0.25;
            feedback.push("One axis is labeled.".into());
        }
        (false, false) => feedback.push("Axis labels are missing.".into()),
    }
    score
}

fn insight(a: &Artifact, feedback: &mut Vec<String>) -> f64 {
    match a.row_count() {
        n if n >= 5 => {
            feedback.push("Sufficient data points for meaningful analysis.".into());
            0.5
        }
        n if n >= 3 => {
            feedback.push("Moderate data points available.".into());
            0.3
        }
        _ => {
            feedback.push("Limited data points for analysis.".into());
            0.0
        }
    }
}

fn aesthetics(a: &Artifact, feedback: &mut Vec<String>) -> f64 {
    let mut score = 0.0;
    if a.width().is_some() && a.height().is_some() {
        score += 0.5;
        feedback.push("Chart has appropriate dimensions.".into());
    } else {
        feedback.push("Chart dimensions could be improved.".into());
    }
    if a.title_text().is_some() {
        score += 0.3;
    }
    if a.has_channel("color") {
        score += 0.2;
        feedback.push("Chart uses color effectively.".into());
    }
    score
}

fn accuracy(a: &Artifact, feedback: &mut Vec<String>) -> f64 {
    let mut score = 0.0;
    match a.data_values() {
        Some(rows) if !rows.is_empty() => {
            score += 0.5;
            feedback.push("Chart has data to visualize.".into());
            if rows[0].as_object().is_some_and(|row| row.len() >= 2) {
                score += 0.3;
                feedback.push("Data structure is appropriate.".into());
            } else {
                feedback.push("Data structure could be improved.".into());
            }
        }
        _ => feedback.push("No data available for visualization.".into()),
    }

    if a.channel_field("x").is_some() && a.channel_field("y").is_some() {
        score += 0.2;
        feedback.push("Data fields are properly encoded.".into());
    } else {
        feedback.push("Data encoding could be improved.".into());
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::templates::template_for;
    use crate::provider::{ChatRequest, ChatResponse, ModelInfo, ModelProvider, StopReason, TokenUsage};
    use async_trait::async_trait;
    use serde_json::json;

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

    fn evaluator(reply: &'static str) -> QualityEvaluator {
        QualityEvaluator::new(
            LlmClient::new(Arc::new(Canned(reply)), "canned-1"),
            Arc::new(PromptTemplates::new()),
        )
    }

    // ─── Fallback rubric ────────────────────────────────────────

    #[test]
    fn test_time_series_template_maxes_out() {
        let r = fallback_evaluation(
            &template_for("revenue over time"),
            "Show me revenue by region over time",
        );
        assert_eq!(r.score, 10.0);
        assert_eq!(r.method, EvaluationMethod::Fallback);
        let detail = r.quality_detail().unwrap();
        assert_eq!(detail.strengths.len(), 5);
        assert!(detail.weaknesses.is_empty());
    }

    #[test]
    fn test_wrong_type_for_time_intent() {
        let a = Artifact::try_from(json!({
            "$schema": "s", "data": {"values": []}, "mark": "bar", "encoding": {}
        }))
        .unwrap();
        let r = fallback_evaluation(&a, "monthly trend");
        // 7.0 - 0.5 with nothing else earned
        assert_eq!(r.score, 6.5);
        let detail = r.quality_detail().unwrap();
        assert_eq!(detail.criteria["intent"], -0.5);
        assert!(detail
            .weaknesses
            .contains(&"Chart type may not be optimal for the request".to_string()));
    }

    #[test]
    fn test_generic_intent_bonus() {
        let a = Artifact::try_from(json!({"mark": "bar"})).unwrap();
        let r = fallback_evaluation(&a, "show me sales");
        assert_eq!(r.score, 7.5);
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let a = template_for("by category");
        assert_eq!(
            fallback_evaluation(&a, "compare categories"),
            fallback_evaluation(&a, "compare categories")
        );
    }

    // ─── Judge path ─────────────────────────────────────────────

    #[tokio::test]
    async fn test_judge_reply_used() {
        let r = evaluator(r#"Sure: {"score": 6.5, "feedback": "Needs a legend", "strengths": [], "weaknesses": ["legend"]}"#)
            .evaluate(&template_for("over time"), "revenue over time", 1)
            .await
            .unwrap();
        assert_eq!(r.method, EvaluationMethod::Llm);
        assert_eq!(r.score, 6.5);
        assert_eq!(r.feedback(), "Needs a legend");
        assert!(r.issues.is_empty());
    }

    #[tokio::test]
    async fn test_judge_weaknesses_become_issue_tags() {
        let r = evaluator(r#"{"score": 5.0, "feedback": "Hard to read", "strengths": [], "weaknesses": ["Axes are unlabeled", "No Title", "Odd colour choices"]}"#)
            .evaluate(&template_for("over time"), "revenue over time", 1)
            .await
            .unwrap();
        assert_eq!(r.method, EvaluationMethod::Llm);
        let expected: BTreeSet<String> = ["judge_axis", "judge_styling", "judge_title"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(r.issues, expected);
    }

    #[tokio::test]
    async fn test_bad_judge_reply_falls_back() {
        let r = evaluator(r#"{"score": 42}"#)
            .evaluate(&template_for("over time"), "revenue over time", 1)
            .await
            .unwrap();
        assert_eq!(r.method, EvaluationMethod::Fallback);
        assert_eq!(r.score, 10.0);
    }

    #[tokio::test]
    async fn test_offline_uses_fallback() {
        let q = QualityEvaluator::new(LlmClient::offline(), Arc::new(PromptTemplates::new()));
        let r = q.evaluate(&template_for("x"), "x", 1).await.unwrap();
        assert_eq!(r.method, EvaluationMethod::Fallback);
    }
}
