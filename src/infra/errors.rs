// src/infra/errors.rs — Error types for chartsmith

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChartsmithError {
    // Provider errors (recovered locally by fallbacks)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Provider '{provider}' timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    #[error("No provider configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY, or run with --offline.")]
    NoProvider,

    // Caller errors
    #[error("Missing required input: {0}")]
    MissingInput(String),

    // Infra
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChartsmithError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ChartsmithError::Provider {
                retriable: true,
                ..
            } | ChartsmithError::RateLimited { .. }
                | ChartsmithError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_variants() {
        assert!(ChartsmithError::RateLimited {
            provider: "openai".into(),
            retry_after_ms: 1000,
        }
        .is_retriable());
        assert!(ChartsmithError::Timeout {
            provider: "openai".into(),
            seconds: 30,
        }
        .is_retriable());
        assert!(ChartsmithError::Provider {
            provider: "openai".into(),
            message: "HTTP 503".into(),
            retriable: true,
        }
        .is_retriable());
    }

    #[test]
    fn test_non_retriable_variants() {
        assert!(!ChartsmithError::NoProvider.is_retriable());
        assert!(!ChartsmithError::MissingInput("query".into()).is_retriable());
        assert!(!ChartsmithError::Provider {
            provider: "openai".into(),
            message: "HTTP 401".into(),
            retriable: false,
        }
        .is_retriable());
    }

    #[test]
    fn test_missing_input_message() {
        let e = ChartsmithError::MissingInput("query".into());
        assert_eq!(e.to_string(), "Missing required input: query");
    }
}
