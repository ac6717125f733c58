// src/evaluator/rules.rs — Deterministic weighted rubric over the chart structure
//
// Pure function of the artifact: no I/O, no provider, same input same score.

use std::collections::BTreeSet;

use serde_json::Value;

use super::{CriterionScore, EvaluationDetail, EvaluationMethod, EvaluationResult};
use crate::chart::Artifact;
use crate::core::policy::INVALID_TAG;
use crate::util::round2;

/// Mark types accepted by the chart-type criterion.
pub const VALID_MARKS: &[&str] = &[
    "bar", "line", "point", "area", "circle", "square", "tick", "rect", "rule", "arc", "text",
    "geoshape", "trail", "boxplot", "errorband", "errorbar",
];

struct Criterion {
    name: &'static str,
    weight: f64,
    required: bool,
    check: fn(&Artifact) -> (f64, Option<&'static str>),
}

const RUBRIC: &[Criterion] = &[
    Criterion {
        name: "has_title",
        weight: 0.10,
        required: true,
        check: check_title,
    },
    Criterion {
        name: "has_axis_labels",
        weight: 0.15,
        required: true,
        check: check_axis_labels,
    },
    Criterion {
        name: "appropriate_chart_type",
        weight: 0.20,
        required: true,
        check: check_chart_type,
    },
    Criterion {
        name: "has_data",
        weight: 0.15,
        required: true,
        check: check_data,
    },
    Criterion {
        name: "proper_encoding",
        weight: 0.20,
        required: true,
        check: check_encoding,
    },
    Criterion {
        name: "good_styling",
        weight: 0.10,
        required: false,
        check: check_styling,
    },
    Criterion {
        name: "responsive_design",
        weight: 0.10,
        required: false,
        check: check_responsive,
    },
];

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEvaluator;

impl RuleEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, artifact: &Artifact) -> EvaluationResult {
        if !artifact.has_required_shape() {
            return EvaluationResult {
                score: 0.0,
                issues: BTreeSet::from([INVALID_TAG.to_string()]),
                detail: EvaluationDetail::Rules {
                    criteria: Vec::new(),
                },
                method: EvaluationMethod::Rules,
            };
        }

        let mut issues = BTreeSet::new();
        let mut criteria = Vec::with_capacity(RUBRIC.len());
        let mut total = 0.0;

        for criterion in RUBRIC {
            let (credit, tag) = (criterion.check)(artifact);
            if let Some(tag) = tag {
                issues.insert(tag.to_string());
            }
            total += credit * criterion.weight;
            criteria.push(CriterionScore {
                name: criterion.name.to_string(),
                weight: criterion.weight,
                credit,
                required: criterion.required,
            });
        }

        EvaluationResult {
            score: round2((total * 10.0).min(10.0)),
            issues,
            detail: EvaluationDetail::Rules { criteria },
            method: EvaluationMethod::Rules,
        }
    }
}

// ─── Criteria ───────────────────────────────────────────────────────────────

fn check_title(a: &Artifact) -> (f64, Option<&'static str>) {
    match a.title_text() {
        Some(_) => (1.0, None),
        None => (0.0, Some("missing_title")),
    }
}

fn check_axis_labels(a: &Artifact) -> (f64, Option<&'static str>) {
    match (a.channel_has_title("x"), a.channel_has_title("y")) {
        (true, true) => (1.0, None),
        (true, false) | (false, true) => (0.5, Some("partial_axis_labels")),
        (false, false) => (0.0, Some("missing_axis_labels")),
    }
}

fn check_chart_type(a: &Artifact) -> (f64, Option<&'static str>) {
    if VALID_MARKS.contains(&a.mark_kind()) {
        (1.0, None)
    } else {
        (0.0, Some("invalid_chart_type"))
    }
}

fn check_data(a: &Artifact) -> (f64, Option<&'static str>) {
    if a.row_count() > 0 {
        (1.0, None)
    } else {
        (0.0, Some("missing_data"))
    }
}

fn check_encoding(a: &Artifact) -> (f64, Option<&'static str>) {
    match (a.has_channel("x"), a.has_channel("y")) {
        (true, true) => (1.0, None),
        (true, false) | (false, true) => (0.5, Some("partial_encoding")),
        (false, false) => (0.0, Some("missing_encoding")),
    }
}

fn check_styling(a: &Artifact) -> (f64, Option<&'static str>) {
    match (a.width().is_some(), a.height().is_some()) {
        (true, true) => (1.0, None),
        (true, false) | (false, true) => (0.5, Some("partial_styling")),
        (false, false) => (0.0, Some("missing_styling")),
    }
}

fn check_responsive(a: &Artifact) -> (f64, Option<&'static str>) {
    if a.autosize().is_some_and(truthy) {
        return (1.0, None);
    }
    let fixed = |v: Option<&Value>| v.is_some_and(Value::is_number);
    if !(fixed(a.width()) && fixed(a.height())) {
        return (1.0, None);
    }
    (0.0, Some("not_responsive"))
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
