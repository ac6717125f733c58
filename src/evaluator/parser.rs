// src/evaluator/parser.rs — Parse quality-judge replies into structured scores

use serde::Deserialize;

use crate::util::extract_json_object;

/// The JSON object the judge is asked to answer with.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JudgeResponse {
    pub score: f64,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JudgeParseError {
    #[error("no JSON object in judge reply")]
    NoObject,
    #[error("judge reply is not the expected JSON: {0}")]
    Invalid(String),
    #[error("judge score {0} is outside [0, 10]")]
    OutOfRange(f64),
}

/// Parse a judge reply. The object may be wrapped in prose or code fences;
/// the score must be finite and within [0, 10].
pub fn parse_judge_response(reply: &str) -> Result<JudgeResponse, JudgeParseError> {
    let body = extract_json_object(reply).ok_or(JudgeParseError::NoObject)?;
    let parsed: JudgeResponse =
        serde_json::from_str(body).map_err(|e| JudgeParseError::Invalid(e.to_string()))?;

    if !parsed.score.is_finite() || !(0.0..=10.0).contains(&parsed.score) {
        return Err(JudgeParseError::OutOfRange(parsed.score));
    }
    Ok(parsed)
}
