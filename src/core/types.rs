// src/core/types.rs — Core domain types

use serde::{Deserialize, Serialize};

use super::combiner::QualityBand;
use super::policy::Termination;
use crate::cache::CacheEntry;
use crate::chart::Artifact;
use crate::clarifier::ClarificationCategory;
use crate::evaluator::EvaluationResult;

/// Where a prompt, artifact or revision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Cache,
    Llm,
    Template,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Llm => "llm",
            Self::Template => "template",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to one optimization run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub query: String,
    pub max_iterations: usize,
}

impl RunRequest {
    pub fn new(query: impl Into<String>, max_iterations: usize) -> Self {
        Self {
            query: query.into(),
            max_iterations,
        }
    }
}

/// Read-only input handed to the generator for one iteration.
#[derive(Debug, Clone)]
pub struct IterationContext {
    pub index: usize,
    pub query: String,
    pub prompt: String,
    /// Verified cache entry; only ever set on iteration 1.
    pub cached: Option<CacheEntry>,
}

/// Everything that happened in one iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub index: usize,
    pub prompt: String,
    pub artifact: Artifact,
    pub source: Source,
    pub rules: EvaluationResult,
    /// Absent when the iteration escalated before quality scoring.
    pub quality: Option<EvaluationResult>,
    pub combined: f64,
    pub decision: Termination,
    pub revision_reason: Option<String>,
}

/// Append-only log of a run's iterations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunHistory {
    records: Vec<IterationRecord>,
}

impl RunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: IterationRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[IterationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&IterationRecord> {
        self.records.last()
    }

    /// Highest combined score; the earliest iteration wins ties.
    pub fn best(&self) -> Option<&IterationRecord> {
        self.records.iter().fold(None, |best, r| match best {
            Some(b) if b.combined >= r.combined => Some(b),
            _ => Some(r),
        })
    }

    /// Every distinct rule issue seen across the run.
    pub fn all_rule_issues(&self) -> std::collections::BTreeSet<String> {
        self.records
            .iter()
            .flat_map(|r| r.rules.issues.iter().cloned())
            .collect()
    }
}

/// A finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub query: String,
    pub model: String,
    pub best_artifact: Artifact,
    pub best_score: f64,
    pub best_iteration: usize,
    pub termination: Termination,
    pub band: QualityBand,
    pub summary: String,
    pub history: RunHistory,
    /// Set when the cache lookup or write failed; the run itself still completed.
    pub storage_error: Option<String>,
}

/// The loop needs the user to rephrase or narrow the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationRequest {
    pub query: String,
    pub category: ClarificationCategory,
    pub question: String,
    pub suggested_query: String,
    /// Iteration that escalated, or `None` when the preflight check stopped the run.
    pub iteration: Option<usize>,
    pub history: RunHistory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFailure {
    pub error: String,
    pub iteration: usize,
    pub history: RunHistory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(RunReport),
    Clarification(ClarificationRequest),
    Failed(RunFailure),
}

/// Lifecycle events for live progress display.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    RunStarted {
        query: String,
        max_iterations: usize,
        model: String,
        cache_hit: bool,
    },
    IterationStart {
        iteration: usize,
        max_iterations: usize,
    },
    IterationEnd {
        iteration: usize,
        rule_score: f64,
        quality_score: Option<f64>,
        combined: f64,
        decision: Termination,
    },
    Escalated {
        iteration: Option<usize>,
        category: ClarificationCategory,
    },
    Complete {
        best_score: f64,
        iterations: usize,
        termination: Termination,
    },
}
