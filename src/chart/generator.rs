// src/chart/generator.rs — Candidate generation with template fallback

use minijinja::context;
use std::sync::Arc;

use super::templates::template_for;
use super::Artifact;
use crate::core::prompts::{PromptTemplates, GENERATOR_SYSTEM, GENERATOR_USER};
use crate::core::types::{IterationContext, Source};
use crate::infra::errors::ChartsmithError;
use crate::provider::client::LlmClient;
use crate::util::{extract_json_object, truncate_str};

const GENERATOR_TEMPERATURE: f32 = 0.2;
const GENERATOR_MAX_TOKENS: u32 = 800;

/// Why the external generator did not produce a usable artifact.
#[derive(Debug, thiserror::Error)]
pub enum GenerationFailure {
    #[error("provider error: {0}")]
    Provider(ChartsmithError),

    #[error("malformed output: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone)]
pub struct Generated {
    pub artifact: Artifact,
    pub source: Source,
}

pub struct CandidateGenerator {
    client: LlmClient,
    prompts: Arc<PromptTemplates>,
    cache_first: bool,
}

impl CandidateGenerator {
    pub fn new(client: LlmClient, prompts: Arc<PromptTemplates>, cache_first: bool) -> Self {
        Self {
            client,
            prompts,
            cache_first,
        }
    }

    /// Produce the iteration's artifact. Never fails on provider trouble:
    /// every failure degrades to the keyword template.
    pub async fn generate(&self, ctx: &IterationContext) -> Result<Generated, ChartsmithError> {
        if self.cache_first && ctx.index == 1 {
            if let Some(entry) = &ctx.cached {
                tracing::debug!(fingerprint = %entry.fingerprint, "Serving cached artifact");
                return Ok(Generated {
                    artifact: entry.artifact.clone(),
                    source: Source::Cache,
                });
            }
        }

        if self.client.is_offline() {
            return Ok(Generated {
                artifact: template_for(&ctx.prompt),
                source: Source::Template,
            });
        }

        match self.request_artifact(&ctx.prompt).await? {
            Ok(artifact) => Ok(Generated {
                artifact,
                source: Source::Llm,
            }),
            Err(failure) => {
                tracing::warn!(iteration = ctx.index, "Generation fell back to template: {}", failure);
                Ok(Generated {
                    artifact: template_for(&ctx.prompt),
                    source: Source::Template,
                })
            }
        }
    }

    /// The outer `Result` carries local errors (template rendering); the inner
    /// one is the provider boundary.
    async fn request_artifact(
        &self,
        prompt: &str,
    ) -> Result<Result<Artifact, GenerationFailure>, ChartsmithError> {
        let system = self.prompts.render(GENERATOR_SYSTEM, context! {})?;
        let user = self.prompts.render(GENERATOR_USER, context! { prompt => prompt })?;

        let reply = match self
            .client
            .complete(&system, &user, GENERATOR_TEMPERATURE, GENERATOR_MAX_TOKENS)
            .await
        {
            Ok(reply) => reply,
            Err(e) => return Ok(Err(GenerationFailure::Provider(e))),
        };

        Ok(parse_reply(&reply))
    }
}

fn parse_reply(reply: &str) -> Result<Artifact, GenerationFailure> {
    let json = extract_json_object(reply).ok_or_else(|| {
        GenerationFailure::Malformed(format!("no JSON object in '{}'", truncate_str(reply, 60)))
    })?;
    Artifact::parse(json).map_err(|e| GenerationFailure::Malformed(e.to_string()))
}
