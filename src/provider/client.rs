// src/provider/client.rs — Single-turn completion client used by the pipeline stages

use std::sync::Arc;
use std::time::Duration;

use super::{ChatRequest, Message, ModelProvider};
use crate::infra::errors::ChartsmithError;

/// `complete(system, user, temperature, max_tokens) -> text` over a model provider.
///
/// Every call is bounded by a timeout. An offline client has no provider and
/// fails every call with `NoProvider`, which sends each stage down its
/// deterministic fallback.
#[derive(Clone)]
pub struct LlmClient {
    provider: Option<Arc<dyn ModelProvider>>,
    model: String,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider: Some(provider),
            model: model.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn offline() -> Self {
        Self {
            provider: None,
            model: String::new(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_offline(&self) -> bool {
        self.provider.is_none()
    }

    /// "provider/model", or "offline".
    pub fn describe(&self) -> String {
        match &self.provider {
            Some(p) => format!("{}/{}", p.id(), self.model),
            None => "offline".into(),
        }
    }

    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ChartsmithError> {
        let provider = self.provider.as_ref().ok_or(ChartsmithError::NoProvider)?;

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::user(user)],
            max_tokens: Some(max_tokens),
            temperature: Some(temperature),
            system: Some(system.to_string()),
        };

        let response = tokio::time::timeout(self.timeout, provider.chat(request))
            .await
            .map_err(|_| ChartsmithError::Timeout {
                provider: provider.id().to_string(),
                seconds: self.timeout.as_secs(),
            })??;

        tracing::debug!(
            provider = provider.id(),
            tokens = response.usage.total(),
            "Completion received"
        );
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatResponse, ModelInfo, StopReason, TokenUsage};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoProvider {
        delay: Duration,
        seen: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl ModelProvider for EchoProvider {
        fn id(&self) -> &str {
            "echo"
        }
        fn name(&self) -> &str {
            "Echo"
        }
        fn models(&self) -> Vec<ModelInfo> {
            vec![]
        }
        async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ChartsmithError> {
            tokio::time::sleep(self.delay).await;
            let content = req.messages[0].content.to_uppercase();
            self.seen.lock().unwrap().push(req);
            Ok(ChatResponse {
                content,
                usage: TokenUsage::default(),
                stop_reason: StopReason::EndTurn,
            })
        }
    }

    fn echo(delay_ms: u64) -> Arc<EchoProvider> {
        Arc::new(EchoProvider {
            delay: Duration::from_millis(delay_ms),
            seen: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_offline_always_fails() {
        let client = LlmClient::offline();
        assert!(client.is_offline());
        assert_eq!(client.describe(), "offline");
        let result = tokio_test::block_on(client.complete("sys", "user", 0.2, 100));
        assert!(matches!(result, Err(ChartsmithError::NoProvider)));
    }

    #[tokio::test]
    async fn test_complete_passes_parameters() {
        let provider = echo(0);
        let client = LlmClient::new(provider.clone(), "echo-1");
        let out = client.complete("be terse", "bar chart", 0.3, 400).await.unwrap();
        assert_eq!(out, "BAR CHART");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].model, "echo-1");
        assert_eq!(seen[0].system.as_deref(), Some("be terse"));
        assert_eq!(seen[0].max_tokens, Some(400));
        assert_eq!(seen[0].temperature, Some(0.3));
        assert_eq!(client.describe(), "echo/echo-1");
    }

    #[tokio::test]
    async fn test_complete_times_out() {
        let client =
            LlmClient::new(echo(500), "echo-1").with_timeout(Duration::from_millis(20));
        let result = client.complete("s", "u", 0.2, 10).await;
        assert!(matches!(result, Err(ChartsmithError::Timeout { .. })));
    }
}
