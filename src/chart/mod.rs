// src/chart/mod.rs — Chart artifact model (Vega-Lite document)

pub mod generator;
pub mod prompt;
pub mod templates;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields every artifact must carry to be considered structurally valid.
pub const REQUIRED_FIELDS: [&str; 4] = ["$schema", "data", "mark", "encoding"];

pub const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("chart document must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("chart document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Canonical mark: `"mark": "bar"` and `"mark": {"type": "bar", ...}` both
/// become `Mark { kind: "bar", props }`.
///
/// A mark that is neither form (a number, an object without `type`) keeps an
/// empty `kind`, which the rule evaluator reports as an invalid chart type.
#[derive(Debug, Clone, PartialEq)]
pub struct Mark {
    pub kind: String,
    pub props: Map<String, Value>,
}

impl Mark {
    fn from_value(value: Value) -> Self {
        match value {
            Value::String(kind) => Self {
                kind,
                props: Map::new(),
            },
            Value::Object(mut map) => {
                let kind = match map.remove("type") {
                    Some(Value::String(s)) => s,
                    _ => String::new(),
                };
                Self { kind, props: map }
            }
            _ => Self {
                kind: String::new(),
                props: Map::new(),
            },
        }
    }

    fn to_value(&self) -> Value {
        if self.props.is_empty() {
            return Value::String(self.kind.clone());
        }
        let mut map = Map::new();
        map.insert("type".into(), Value::String(self.kind.clone()));
        for (k, v) in &self.props {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }
}

/// A chart specification. Immutable once built; read through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Artifact {
    mark: Option<Mark>,
    // Everything except `mark`. Keys serialize sorted.
    fields: Map<String, Value>,
}

impl Artifact {
    /// Build from a JSON object. Infallible: missing fields are a rule
    /// evaluator concern, not a construction error.
    pub fn from_map(mut fields: Map<String, Value>) -> Self {
        let mark = fields.remove("mark").map(Mark::from_value);
        Self { mark, fields }
    }

    pub fn parse(text: &str) -> Result<Self, ArtifactError> {
        let value: Value = serde_json::from_str(text)?;
        Self::try_from(value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn has_field(&self, key: &str) -> bool {
        match key {
            "mark" => self.mark.is_some(),
            _ => self.fields.contains_key(key),
        }
    }

    /// All of `$schema`, `data`, `mark` and `encoding` are present.
    pub fn has_required_shape(&self) -> bool {
        REQUIRED_FIELDS.iter().all(|f| self.has_field(f))
    }

    pub fn mark(&self) -> Option<&Mark> {
        self.mark.as_ref()
    }

    /// Mark type, or "" when absent or unrecognizable.
    pub fn mark_kind(&self) -> &str {
        self.mark.as_ref().map(|m| m.kind.as_str()).unwrap_or("")
    }

    /// Title text from either `"title": "..."` or `"title": {"text": "..."}`.
    pub fn title_text(&self) -> Option<&str> {
        let text = match self.fields.get("title")? {
            Value::String(s) => s.as_str(),
            Value::Object(map) => map.get("text")?.as_str()?,
            _ => return None,
        };
        (!text.trim().is_empty()).then_some(text)
    }

    pub fn encoding(&self) -> Option<&Map<String, Value>> {
        self.fields.get("encoding")?.as_object()
    }

    pub fn channel(&self, name: &str) -> Option<&Map<String, Value>> {
        self.encoding()?.get(name)?.as_object()
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.encoding().is_some_and(|e| e.contains_key(name))
    }

    /// An axis counts as titled when its channel carries a non-null `title`.
    pub fn channel_has_title(&self, name: &str) -> bool {
        self.channel(name)
            .and_then(|c| c.get("title"))
            .is_some_and(|t| !t.is_null())
    }

    pub fn channel_field(&self, name: &str) -> Option<&str> {
        self.channel(name)?.get("field")?.as_str()
    }

    /// Inline `data.values` rows, if the data block carries them as an array.
    pub fn data_values(&self) -> Option<&Vec<Value>> {
        self.fields.get("data")?.get("values")?.as_array()
    }

    pub fn row_count(&self) -> usize {
        self.data_values().map(Vec::len).unwrap_or(0)
    }

    pub fn width(&self) -> Option<&Value> {
        self.fields.get("width")
    }

    pub fn height(&self) -> Option<&Value> {
        self.fields.get("height")
    }

    pub fn autosize(&self) -> Option<&Value> {
        self.fields.get("autosize")
    }

    pub fn to_value(&self) -> Value {
        Value::from(self.clone())
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.to_value()).unwrap_or_else(|_| "{}".into())
    }
}

impl TryFrom<Value> for Artifact {
    type Error = ArtifactError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            Value::Null => Err(ArtifactError::NotAnObject("null")),
            Value::Bool(_) => Err(ArtifactError::NotAnObject("a boolean")),
            Value::Number(_) => Err(ArtifactError::NotAnObject("a number")),
            Value::String(_) => Err(ArtifactError::NotAnObject("a string")),
            Value::Array(_) => Err(ArtifactError::NotAnObject("an array")),
        }
    }
}

impl From<Artifact> for Value {
    fn from(artifact: Artifact) -> Self {
        let mut map = artifact.fields;
        if let Some(m) = artifact.mark {
            map.insert("mark".into(), m.to_value());
        }
        Value::Object(map)
    }
}
