// src/chart/prompt.rs — First-iteration prompt from the raw query

use minijinja::context;
use std::sync::Arc;

use crate::cache::CacheEntry;
use crate::core::prompts::{PromptTemplates, PROMPT_FALLBACK, PROMPT_SYSTEM, PROMPT_USER};
use crate::core::types::Source;
use crate::infra::errors::ChartsmithError;
use crate::provider::client::LlmClient;

const PROMPT_TEMPERATURE: f32 = 0.2;
const PROMPT_MAX_TOKENS: u32 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct PromptDraft {
    pub text: String,
    pub source: Source,
}

pub struct PromptGenerator {
    client: LlmClient,
    prompts: Arc<PromptTemplates>,
}

impl PromptGenerator {
    pub fn new(client: LlmClient, prompts: Arc<PromptTemplates>) -> Self {
        Self { client, prompts }
    }

    /// Cached best revision text, else an external draft, else the template.
    pub async fn draft(
        &self,
        query: &str,
        cached: Option<&CacheEntry>,
    ) -> Result<PromptDraft, ChartsmithError> {
        if let Some(entry) = cached {
            if !entry.revision_text.trim().is_empty() {
                return Ok(PromptDraft {
                    text: entry.revision_text.clone(),
                    source: Source::Cache,
                });
            }
        }

        if !self.client.is_offline() {
            let system = self.prompts.render(PROMPT_SYSTEM, context! {})?;
            let user = self.prompts.render(PROMPT_USER, context! { query => query })?;
            match self
                .client
                .complete(&system, &user, PROMPT_TEMPERATURE, PROMPT_MAX_TOKENS)
                .await
            {
                Ok(reply) if !reply.trim().is_empty() => {
                    return Ok(PromptDraft {
                        text: reply.trim().to_string(),
                        source: Source::Llm,
                    });
                }
                Ok(_) => tracing::warn!("Prompt draft was empty, using template"),
                Err(e) => tracing::warn!("Prompt draft unavailable, using template: {}", e),
            }
        }

        Ok(PromptDraft {
            text: self.prompts.render(PROMPT_FALLBACK, context! { query => query })?,
            source: Source::Template,
        })
    }
}
