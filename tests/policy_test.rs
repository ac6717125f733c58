// tests/policy_test.rs — Integration test: scoring and termination properties

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;

use chartsmith::chart::templates::template_for;
use chartsmith::core::combiner::ScoreCombiner;
use chartsmith::core::policy::{Termination, TerminationPolicy, INVALID_TAG};
use chartsmith::evaluator::quality::fallback_evaluation;
use chartsmith::evaluator::RuleEvaluator;

fn no_issues() -> BTreeSet<String> {
    BTreeSet::new()
}

#[test]
fn test_first_iteration_never_succeeds() {
    let policy = TerminationPolicy::default();
    for score in [8.0, 9.5, 9.99, 10.0] {
        assert_eq!(
            policy.decide(score, 1, 5, &no_issues()),
            Termination::Continue,
            "score {score}"
        );
    }
}

#[test]
fn test_decision_table() {
    let policy = TerminationPolicy::default();
    let cases = [
        (9.6, 2, 5, Termination::StopSuccess),
        (8.0, 2, 5, Termination::StopSuccess),
        (7.99, 2, 5, Termination::Continue),
        (2.99, 2, 5, Termination::StopCritical),
        (2.99, 1, 5, Termination::Continue),
        (3.0, 3, 5, Termination::Continue),
        (9.9, 5, 5, Termination::StopMaxIter),
        (1.0, 5, 5, Termination::StopMaxIter),
    ];
    for (score, iteration, max, expected) in cases {
        assert_eq!(
            policy.decide(score, iteration, max, &no_issues()),
            expected,
            "score={score} iteration={iteration}/{max}"
        );
    }
}

#[test]
fn test_invalid_tag_outranks_budget() {
    let issues: BTreeSet<String> = [INVALID_TAG.to_string()].into();
    assert_eq!(
        TerminationPolicy::default().decide(10.0, 5, 5, &issues),
        Termination::EscalateClarify
    );
}

#[test]
fn test_combined_score_is_bounded_and_deterministic() {
    let combiner = ScoreCombiner::default();
    let rules = RuleEvaluator::new();

    for query in [
        "revenue over time",
        "headcount by department",
        "correlation of spend and revenue",
        "a responsive chart of widgets",
    ] {
        let artifact = template_for(query);
        let r = rules.evaluate(&artifact);
        let q = fallback_evaluation(&artifact, query);
        let combined = combiner.combine(r.score, q.score);

        assert!((0.0..=10.0).contains(&combined), "{query}: {combined}");
        assert_eq!(combined, combiner.combine(r.score, q.score));
        assert_eq!(q, fallback_evaluation(&artifact, query));
    }
}

#[test]
fn test_combined_score_never_drops_when_an_input_rises() {
    let grid: Vec<f64> = (0..=20).map(|i| i as f64 * 0.5).collect();

    for weights in [(0.4, 0.6), (0.5, 0.5), (0.9, 0.1)] {
        let combiner = ScoreCombiner::new(weights.0, weights.1).unwrap();
        for &fixed in &grid {
            for pair in grid.windows(2) {
                let (lo, hi) = (pair[0], pair[1]);
                assert!(
                    combiner.combine(hi, fixed) >= combiner.combine(lo, fixed),
                    "rule {lo} -> {hi} with quality {fixed} under {weights:?}"
                );
                assert!(
                    combiner.combine(fixed, hi) >= combiner.combine(fixed, lo),
                    "quality {lo} -> {hi} with rule {fixed} under {weights:?}"
                );
            }
        }
    }
}

#[test]
fn test_weights_must_sum_to_one() {
    assert!(ScoreCombiner::new(0.5, 0.6).is_err());
    assert!(ScoreCombiner::new(-0.1, 1.1).is_err());
    assert_eq!(ScoreCombiner::new(0.5, 0.5).unwrap().combine(8.0, 6.0), 7.0);
}
