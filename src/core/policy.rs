// src/core/policy.rs — Termination policy for the optimization loop

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::infra::config::PolicyConfig;

/// Tag the rule evaluator emits when an artifact lacks the required shape.
pub const INVALID_TAG: &str = "invalid_chart_spec";

/// Outcome of one policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Continue,
    StopSuccess,
    StopMaxIter,
    StopCritical,
    EscalateClarify,
}

impl Termination {
    pub fn is_stop(&self) -> bool {
        matches!(
            self,
            Self::StopSuccess | Self::StopMaxIter | Self::StopCritical
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::StopSuccess => "stop_success",
            Self::StopMaxIter => "stop_max_iter",
            Self::StopCritical => "stop_critical",
            Self::EscalateClarify => "escalate_clarify",
        }
    }

    /// Human-readable reason shown in reports.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Continue => "Continuing optimization",
            Self::StopSuccess => "Score reached the success threshold",
            Self::StopMaxIter => "Reached the iteration limit",
            Self::StopCritical => "Score stayed critically low after several iterations",
            Self::EscalateClarify => "Chart was structurally invalid; clarification needed",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure decision function over (score, iteration, budget, issues).
#[derive(Debug, Clone)]
pub struct TerminationPolicy {
    success_threshold: f64,
    good_threshold: f64,
    critical_floor: f64,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self::from(&PolicyConfig::default())
    }
}

impl From<&PolicyConfig> for TerminationPolicy {
    fn from(cfg: &PolicyConfig) -> Self {
        Self {
            success_threshold: cfg.success_threshold,
            good_threshold: cfg.good_threshold,
            critical_floor: cfg.critical_floor,
        }
    }
}

impl TerminationPolicy {
    /// Checked in strict priority order; the first matching rule wins.
    pub fn decide(
        &self,
        combined: f64,
        iteration: usize,
        max_iterations: usize,
        issues: &BTreeSet<String>,
    ) -> Termination {
        if issues.contains(INVALID_TAG) {
            return Termination::EscalateClarify;
        }
        if iteration >= max_iterations {
            return Termination::StopMaxIter;
        }
        // A first-iteration score never stops the loop on its own.
        if combined >= self.success_threshold && iteration > 1 {
            return Termination::StopSuccess;
        }
        if combined >= self.good_threshold && iteration >= 2 {
            return Termination::StopSuccess;
        }
        if combined < self.critical_floor && iteration >= 2 {
            return Termination::StopCritical;
        }
        Termination::Continue
    }
}
