// src/provider/resolver.rs — Provider discovery and model selection

use std::sync::Arc;

use super::anthropic::AnthropicProvider;
use super::openai::OpenAIProvider;
use super::retry::{RetryConfig, RetryProvider};
use super::{ModelProvider, ModelRef};
use crate::infra::config::Config;

/// Default model per provider when none is configured.
pub fn default_model(provider_id: &str) -> Option<&'static str> {
    match provider_id {
        "openai" => Some("gpt-4.1-mini"),
        "anthropic" => Some("claude-sonnet-4-20250514"),
        _ => None,
    }
}

/// Discover providers from the process environment.
pub fn discover_providers(config: &Config) -> Vec<Arc<dyn ModelProvider>> {
    discover_providers_from(config, |k| std::env::var(k).ok())
}

/// Discover providers through an arbitrary env lookup. Each provider is wrapped
/// in a `RetryProvider` configured from `[provider] max_retries`.
pub fn discover_providers_from(
    config: &Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<Arc<dyn ModelProvider>> {
    let mut providers: Vec<Arc<dyn ModelProvider>> = Vec::new();
    let retry = RetryConfig::with_max_retries(config.provider.max_retries);

    if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
        let inner: Arc<dyn ModelProvider> = match lookup("OPENAI_BASE_URL") {
            Some(base) => Arc::new(OpenAIProvider::with_base_url(key, base)),
            None => Arc::new(OpenAIProvider::new(key)),
        };
        providers.push(Arc::new(RetryProvider::with_config(inner, retry.clone())));
    }
    if let Some(key) = lookup("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty()) {
        let inner: Arc<dyn ModelProvider> = Arc::new(AnthropicProvider::new(key));
        providers.push(Arc::new(RetryProvider::with_config(inner, retry)));
    }

    tracing::debug!("Discovered {} provider(s)", providers.len());
    providers
}

pub fn find_provider<'a>(
    providers: &'a [Arc<dyn ModelProvider>],
    id: &str,
) -> Option<&'a Arc<dyn ModelProvider>> {
    providers.iter().find(|p| p.id() == id)
}

/// Pick the provider and model to use: explicit request > config > first discovered.
///
/// A bare model name (no "provider/") is matched against each provider's catalog.
pub fn select(
    providers: &[Arc<dyn ModelProvider>],
    requested: Option<&str>,
) -> Option<(Arc<dyn ModelProvider>, ModelRef)> {
    match requested {
        Some(name) => {
            if let Some(model_ref) = ModelRef::parse(name) {
                let provider = find_provider(providers, &model_ref.provider)?;
                return Some((provider.clone(), model_ref));
            }
            let provider = providers
                .iter()
                .find(|p| p.models().iter().any(|m| m.id == name))
                .or_else(|| providers.first())?;
            Some((provider.clone(), ModelRef::new(provider.id(), name)))
        }
        None => {
            let provider = providers.first()?;
            let model = default_model(provider.id())
                .map(str::to_string)
                .or_else(|| provider.models().first().map(|m| m.id.clone()))?;
            Some((provider.clone(), ModelRef::new(provider.id(), model)))
        }
    }
}
