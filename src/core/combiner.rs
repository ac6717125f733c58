// src/core/combiner.rs — Weighted blend of rule and quality scores

use serde::{Deserialize, Serialize};

use crate::infra::config::ScoringConfig;
use crate::infra::errors::ChartsmithError;
use crate::util::round2;

const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
pub struct ScoreCombiner {
    rule_weight: f64,
    quality_weight: f64,
}

impl Default for ScoreCombiner {
    fn default() -> Self {
        Self {
            rule_weight: 0.4,
            quality_weight: 0.6,
        }
    }
}

impl ScoreCombiner {
    pub fn new(rule_weight: f64, quality_weight: f64) -> Result<Self, ChartsmithError> {
        if rule_weight < 0.0 || quality_weight < 0.0 {
            return Err(ChartsmithError::Config(format!(
                "score weights must be non-negative (rule={rule_weight}, quality={quality_weight})"
            )));
        }
        if ((rule_weight + quality_weight) - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ChartsmithError::Config(format!(
                "score weights must sum to 1.0 (rule={rule_weight}, quality={quality_weight})"
            )));
        }
        Ok(Self {
            rule_weight,
            quality_weight,
        })
    }

    pub fn from_config(cfg: &ScoringConfig) -> Result<Self, ChartsmithError> {
        Self::new(cfg.rule_weight, cfg.quality_weight)
    }

    /// `round(rule*w_r + quality*w_q, 2)` with both inputs clamped to [0, 10].
    pub fn combine(&self, rule: f64, quality: f64) -> f64 {
        let r = rule.clamp(0.0, 10.0);
        let q = quality.clamp(0.0, 10.0);
        round2(r * self.rule_weight + q * self.quality_weight)
    }
}

/// Coarse label for a combined score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityBand {
    Optimal,
    Good,
    NeedsRefinement,
    Poor,
}

impl QualityBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 9.5 {
            Self::Optimal
        } else if score >= 7.0 {
            Self::Good
        } else if score >= 5.0 {
            Self::NeedsRefinement
        } else {
            Self::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Optimal => "Optimal",
            Self::Good => "Good",
            Self::NeedsRefinement => "Needs refinement",
            Self::Poor => "Poor",
        }
    }
}

impl std::fmt::Display for QualityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One-paragraph summary of a finished run.
pub fn summarize(score: f64, iterations: usize, rule: f64, quality: Option<f64>) -> String {
    let verdict = if score >= 9.0 {
        "Excellent chart: it answers the request clearly and needs no further work."
    } else if score >= 7.0 {
        "Good chart: it answers the request with minor room for polish."
    } else if score >= 5.0 {
        "Moderate chart: usable, but labeling or structure could be improved."
    } else {
        "Poor chart: it does not answer the request well; consider rephrasing it."
    };

    let quality_part = match quality {
        Some(q) => format!(", quality {q:.2}"),
        None => String::new(),
    };

    format!(
        "{verdict} Final score {score:.2}/10 (rules {rule:.2}{quality_part}) after {iterations} iteration{}.",
        if iterations == 1 { "" } else { "s" }
    )
}
