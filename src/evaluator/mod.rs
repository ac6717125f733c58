// src/evaluator/mod.rs — Chart evaluators (rule rubric and quality judge)

pub mod parser;
pub mod quality;
pub mod rules;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use quality::QualityEvaluator;
pub use rules::RuleEvaluator;

/// How a score was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMethod {
    Rules,
    Llm,
    Fallback,
}

impl EvaluationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rules => "rules",
            Self::Llm => "llm",
            Self::Fallback => "fallback",
        }
    }
}

/// One rubric line of the rule evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub name: String,
    pub weight: f64,
    /// Fraction of the weight earned, in [0, 1].
    pub credit: f64,
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityDetail {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub feedback: String,
    /// Per-dimension score deltas (fallback rubric only).
    pub criteria: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationDetail {
    Rules { criteria: Vec<CriterionScore> },
    Quality(QualityDetail),
}

/// Output of either evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// In [0, 10].
    pub score: f64,
    pub issues: BTreeSet<String>,
    pub detail: EvaluationDetail,
    pub method: EvaluationMethod,
}

impl EvaluationResult {
    /// Reviewer feedback text, empty for rule results.
    pub fn feedback(&self) -> &str {
        match &self.detail {
            EvaluationDetail::Quality(q) => &q.feedback,
            EvaluationDetail::Rules { .. } => "",
        }
    }

    pub fn quality_detail(&self) -> Option<&QualityDetail> {
        match &self.detail {
            EvaluationDetail::Quality(q) => Some(q),
            EvaluationDetail::Rules { .. } => None,
        }
    }
}
