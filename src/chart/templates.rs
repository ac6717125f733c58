// src/chart/templates.rs — Deterministic keyword-selected fallback charts
//
// Used whenever the provider is unavailable or answers with something that
// is not a chart. Selection looks only at the prompt text.

use serde_json::{json, Map, Value};

use super::{Artifact, VEGA_LITE_SCHEMA};

const TIME_KEYWORDS: &[&str] = &["over time", "time", "trend", "month", "year"];
const DIMENSION_KEYWORDS: &[&str] = &["region", "department", "product", "category"];
const DISTRIBUTION_KEYWORDS: &[&str] = &["distribution", "correlation", "scatter"];

/// Which fallback chart a prompt maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateKind {
    TimeSeries,
    Dimension(&'static str),
    Distribution,
    Default,
}

impl TemplateKind {
    pub fn select(prompt: &str) -> Self {
        let lower = prompt.to_lowercase();
        if TIME_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return Self::TimeSeries;
        }
        if let Some(dim) = DIMENSION_KEYWORDS.iter().find(|k| lower.contains(*k)) {
            return Self::Dimension(dim);
        }
        if DISTRIBUTION_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return Self::Distribution;
        }
        Self::Default
    }
}

pub fn wants_responsive(prompt: &str) -> bool {
    prompt.to_lowercase().contains("responsive")
}

/// Build the fallback chart for a prompt.
pub fn template_for(prompt: &str) -> Artifact {
    let mut doc = match TemplateKind::select(prompt) {
        TemplateKind::TimeSeries => time_series(),
        TemplateKind::Dimension(dim) => dimension_bar(dim),
        TemplateKind::Distribution => scatter(),
        TemplateKind::Default => default_bar(),
    };

    if wants_responsive(prompt) {
        doc.insert(
            "autosize".into(),
            json!({"type": "fit", "contains": "padding"}),
        );
        doc.insert("width".into(), json!("container"));
    }

    Artifact::from_map(doc)
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn time_series() -> Map<String, Value> {
    const REGIONS: [&str; 4] = ["North", "South", "East", "West"];
    const MONTHS: [&str; 3] = ["Jan", "Feb", "Mar"];
    const REVENUE: [u32; 12] = [
        120000, 95000, 110000, 85000, 135000, 105000, 125000, 90000, 150000, 115000, 140000,
        100000,
    ];

    let values: Vec<Value> = MONTHS
        .iter()
        .flat_map(|m| REGIONS.iter().map(move |r| (*m, *r)))
        .zip(REVENUE)
        .map(|((month, region), revenue)| {
            json!({"region": region, "revenue": revenue, "month": month})
        })
        .collect();

    object(json!({
        "$schema": VEGA_LITE_SCHEMA,
        "description": "Revenue by region over time",
        "data": {"values": values},
        "mark": "line",
        "encoding": {
            "x": {"field": "month", "type": "ordinal", "title": "Month"},
            "y": {"field": "revenue", "type": "quantitative", "title": "Revenue ($)"},
            "color": {"field": "region", "type": "nominal", "title": "Region"}
        },
        "title": {"text": "Revenue by Region Over Time", "fontSize": 16},
        "width": 600,
        "height": 400
    }))
}

fn dimension_bar(dimension: &str) -> Map<String, Value> {
    let labels: [&str; 5] = match dimension {
        "region" => ["North", "South", "East", "West", "Central"],
        "department" => ["Sales", "Marketing", "Engineering", "Support", "Finance"],
        "product" => ["Basic", "Standard", "Plus", "Pro", "Enterprise"],
        _ => ["Hardware", "Software", "Services", "Training", "Licensing"],
    };
    const REVENUE: [u32; 5] = [145000, 118000, 132000, 97000, 86000];

    let values: Vec<Value> = labels
        .iter()
        .zip(REVENUE)
        .map(|(label, revenue)| json!({dimension: label, "revenue": revenue}))
        .collect();

    let axis_title = capitalize(dimension);
    object(json!({
        "$schema": VEGA_LITE_SCHEMA,
        "description": format!("Revenue by {dimension}"),
        "data": {"values": values},
        "mark": "bar",
        "encoding": {
            "x": {"field": dimension, "type": "nominal", "title": axis_title},
            "y": {"field": "revenue", "type": "quantitative", "title": "Revenue ($)"},
            "color": {"field": dimension, "type": "nominal", "title": axis_title}
        },
        "title": {"text": format!("Revenue by {axis_title}"), "fontSize": 16},
        "width": 600,
        "height": 400
    }))
}

fn scatter() -> Map<String, Value> {
    const POINTS: [(u32, u32); 8] = [
        (12000, 98000),
        (15000, 110000),
        (18000, 121000),
        (9000, 87000),
        (22000, 139000),
        (25000, 148000),
        (14000, 104000),
        (20000, 131000),
    ];

    let values: Vec<Value> = POINTS
        .iter()
        .map(|(spend, revenue)| json!({"marketing_spend": spend, "revenue": revenue}))
        .collect();

    object(json!({
        "$schema": VEGA_LITE_SCHEMA,
        "description": "Marketing spend against revenue",
        "data": {"values": values},
        "mark": "point",
        "encoding": {
            "x": {"field": "marketing_spend", "type": "quantitative", "title": "Marketing Spend ($)"},
            "y": {"field": "revenue", "type": "quantitative", "title": "Revenue ($)"}
        },
        "title": {"text": "Marketing Spend vs Revenue", "fontSize": 16},
        "width": 600,
        "height": 400
    }))
}

fn default_bar() -> Map<String, Value> {
    const ROWS: [(&str, u32); 5] = [("A", 28), ("B", 55), ("C", 43), ("D", 91), ("E", 81)];

    let values: Vec<Value> = ROWS
        .iter()
        .map(|(label, value)| json!({"label": label, "value": value}))
        .collect();

    object(json!({
        "$schema": VEGA_LITE_SCHEMA,
        "description": "Values by label",
        "data": {"values": values},
        "mark": "bar",
        "encoding": {
            "x": {"field": "label", "type": "nominal", "title": "Label"},
            "y": {"field": "value", "type": "quantitative", "title": "Value"}
        },
        "title": {"text": "Values by Label", "fontSize": 16},
        "width": 600,
        "height": 400
    }))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_time_first() {
        assert_eq!(
            TemplateKind::select("Show me revenue by region over time"),
            TemplateKind::TimeSeries
        );
        assert_eq!(TemplateKind::select("monthly sales"), TemplateKind::TimeSeries);
    }

    #[test]
    fn test_select_dimension() {
        assert_eq!(
            TemplateKind::select("Compare revenue by department"),
            TemplateKind::Dimension("department")
        );
    }

    #[test]
    fn test_select_distribution_and_default() {
        assert_eq!(
            TemplateKind::select("correlation of spend and revenue"),
            TemplateKind::Distribution
        );
        assert_eq!(TemplateKind::select("show me sales"), TemplateKind::Default);
    }

    #[test]
    fn test_time_series_shape() {
        let a = template_for("revenue over time");
        assert!(a.has_required_shape());
        assert_eq!(a.mark_kind(), "line");
        assert_eq!(a.row_count(), 12);
        assert_eq!(a.title_text(), Some("Revenue by Region Over Time"));
        let first = &a.data_values().unwrap()[0];
        assert_eq!(first["region"], "North");
        assert_eq!(first["month"], "Jan");
        assert_eq!(first["revenue"], 120000);
        let last = &a.data_values().unwrap()[11];
        assert_eq!(last["region"], "West");
        assert_eq!(last["month"], "Mar");
        assert_eq!(last["revenue"], 100000);
        assert_eq!(a.width(), Some(&json!(600)));
        assert!(a.autosize().is_none());
    }

    #[test]
    fn test_dimension_bar_uses_field() {
        let a = template_for("revenue by product");
        assert_eq!(a.mark_kind(), "bar");
        assert_eq!(a.channel_field("x"), Some("product"));
        assert_eq!(a.row_count(), 5);
    }

    #[test]
    fn test_responsive_layout() {
        let a = template_for("revenue over time. Make the layout responsive");
        assert_eq!(a.width(), Some(&json!("container")));
        assert_eq!(
            a.autosize(),
            Some(&json!({"type": "fit", "contains": "padding"}))
        );
    }

    #[test]
    fn test_every_template_is_complete() {
        for prompt in ["trend", "by category", "scatter", "anything"] {
            let a = template_for(prompt);
            assert!(a.has_required_shape(), "{prompt}");
            assert!(a.title_text().is_some(), "{prompt}");
        }
    }
}
