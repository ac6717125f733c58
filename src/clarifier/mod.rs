// src/clarifier/mod.rs — Keyword heuristics for vague or under-specified requests

use serde::{Deserialize, Serialize};

use crate::util::contains_word;

const VAGUE_TERMS: &[&str] = &["business", "performance", "metrics", "data", "results"];
const SPECIFIC_TERMS: &[&str] = &["revenue", "profit", "sales", "customers", "orders", "growth"];
const TIME_TERMS: &[&str] = &[
    "time", "trend", "over time", "period", "month", "year", "quarter", "week",
];
const DIMENSION_TERMS: &[&str] = &["by", "region", "product", "department", "category", "group"];
const BROAD_TERMS: &[&str] = &["everything", "all", "overview", "summary", "general"];
const AMBIGUOUS_TERMS: &[&str] = &["performance", "results", "numbers", "figures", "statistics"];
const AGGREGATE_TERMS: &[&str] = &["total", "average", "percentage", "count", "sum", "mean"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarificationCategory {
    VagueBusiness,
    MissingTimeframe,
    MissingDimensions,
    TooBroad,
    AmbiguousMetrics,
    Clear,
}

impl ClarificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VagueBusiness => "vague_business",
            Self::MissingTimeframe => "missing_timeframe",
            Self::MissingDimensions => "missing_dimensions",
            Self::TooBroad => "too_broad",
            Self::AmbiguousMetrics => "ambiguous_metrics",
            Self::Clear => "clear",
        }
    }

    /// Categories that stop a run before the first iteration.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::VagueBusiness | Self::TooBroad)
    }
}

impl std::fmt::Display for ClarificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clarification {
    pub category: ClarificationCategory,
    pub question: String,
    pub suggested_query: String,
}

impl Clarification {
    pub fn is_blocking(&self) -> bool {
        self.category.is_blocking()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Clarifier;

impl Clarifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a query; the first matching category wins.
    pub fn classify(&self, query: &str) -> ClarificationCategory {
        let q = query.to_lowercase();
        let any = |terms: &[&str]| terms.iter().any(|t| q.contains(t));

        if any(VAGUE_TERMS) && !any(SPECIFIC_TERMS) {
            ClarificationCategory::VagueBusiness
        } else if !any(TIME_TERMS) {
            ClarificationCategory::MissingTimeframe
        } else if !any(DIMENSION_TERMS) {
            ClarificationCategory::MissingDimensions
        } else if BROAD_TERMS.iter().any(|t| contains_word(&q, t)) {
            ClarificationCategory::TooBroad
        } else if any(AMBIGUOUS_TERMS) && !any(AGGREGATE_TERMS) {
            ClarificationCategory::AmbiguousMetrics
        } else {
            ClarificationCategory::Clear
        }
    }

    pub fn analyze(&self, query: &str) -> Clarification {
        let category = self.classify(query);
        let query = query.trim();

        let (question, suggested_query) = match category {
            ClarificationCategory::VagueBusiness => (
                "I see you want to analyze your business. What specific business metrics would \
                 you like to see? (e.g., revenue, profit, sales, customers)"
                    .to_string(),
                "Show me revenue trends over the last 12 months".to_string(),
            ),
            ClarificationCategory::MissingTimeframe => (
                format!(
                    "For your query about '{query}', what time period would you like to analyze? \
                     (e.g., last month, Q1 2024, past year)"
                ),
                format!("{query} over the last quarter"),
            ),
            ClarificationCategory::MissingDimensions => (
                format!(
                    "To better visualize '{query}', what dimensions would you like to compare? \
                     (e.g., by region, product, department)"
                ),
                format!("{query} by region"),
            ),
            ClarificationCategory::TooBroad => (
                "Your request is quite broad. Could you be more specific about what you'd like \
                 to visualize?"
                    .to_string(),
                "Show me monthly revenue by product category".to_string(),
            ),
            ClarificationCategory::AmbiguousMetrics => (
                format!(
                    "Regarding '{query}', which specific metrics are you interested in? \
                     (e.g., total, average, percentage change)"
                ),
                format!("Show me total {query} by month"),
            ),
            ClarificationCategory::Clear => (
                "Could you provide more details about the chart you'd like to see?".to_string(),
                query.to_string(),
            ),
        };

        Clarification {
            category,
            question,
            suggested_query,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(q: &str) -> ClarificationCategory {
        Clarifier::new().classify(q)
    }

    #[test]
    fn test_clear_query() {
        assert_eq!(
            classify("Show me revenue by region over time"),
            ClarificationCategory::Clear
        );
    }

    #[test]
    fn test_vague_business_first() {
        assert_eq!(classify("How is my business doing?"), ClarificationCategory::VagueBusiness);
        assert_eq!(classify("data"), ClarificationCategory::VagueBusiness);
        // A specific metric cancels the vague term
        assert_ne!(
            classify("business revenue by region over time"),
            ClarificationCategory::VagueBusiness
        );
    }

    #[test]
    fn test_missing_timeframe_then_dimensions() {
        assert_eq!(classify("revenue by region"), ClarificationCategory::MissingTimeframe);
        assert_eq!(classify("revenue per month"), ClarificationCategory::MissingDimensions);
    }

    #[test]
    fn test_too_broad_whole_word() {
        assert_eq!(
            classify("all revenue by region over time"),
            ClarificationCategory::TooBroad
        );
        // "small" contains "all" but is not the word
        assert_eq!(
            classify("small orders by region over time"),
            ClarificationCategory::Clear
        );
    }

    #[test]
    fn test_ambiguous_metrics() {
        assert_eq!(
            classify("sales numbers by region each month"),
            ClarificationCategory::AmbiguousMetrics
        );
        assert_eq!(
            classify("total sales numbers by region each month"),
            ClarificationCategory::Clear
        );
    }

    #[test]
    fn test_questions_and_suggestions() {
        let c = Clarifier::new().analyze("revenue by region");
        assert!(c.question.starts_with("For your query about 'revenue by region'"));
        assert_eq!(c.suggested_query, "revenue by region over the last quarter");

        let v = Clarifier::new().analyze("data");
        assert_eq!(v.suggested_query, "Show me revenue trends over the last 12 months");
        assert!(v.is_blocking());

        let m = Clarifier::new().analyze("revenue per month");
        assert_eq!(m.suggested_query, "revenue per month by region");
        assert!(!m.is_blocking());
    }

    #[test]
    fn test_clear_suggestion_is_query() {
        let c = Clarifier::new().analyze("  Show me revenue by region over time ");
        assert_eq!(c.category, ClarificationCategory::Clear);
        assert_eq!(c.suggested_query, "Show me revenue by region over time");
    }
}
