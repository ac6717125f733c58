// src/cli/run.rs — Default command: optimize a chart for one request

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use super::{EXIT_CLARIFY, EXIT_ERROR, EXIT_OK};
use crate::cache::ArtifactCache;
use crate::clarifier::Clarifier;
use crate::core::orchestrator::Orchestrator;
use crate::core::types::{RunOutcome, RunRequest};
use crate::infra::config::Config;
use crate::provider::client::LlmClient;
use crate::provider::resolver;

/// Options the default command takes from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub max_iterations: Option<usize>,
    pub model: Option<String>,
    pub offline: bool,
    pub no_cache: bool,
    pub json: bool,
    pub output: Option<String>,
    pub quiet: bool,
}

/// Build the client the pipeline stages share. Falls back to offline mode
/// when no provider is configured.
pub fn build_client(config: &Config, requested_model: Option<&str>) -> LlmClient {
    if config.provider.offline {
        return LlmClient::offline();
    }

    let providers = resolver::discover_providers(config);
    let requested = requested_model.or(config.models.generator.as_deref());
    match resolver::select(&providers, requested) {
        Some((provider, model_ref)) => LlmClient::new(provider, model_ref.model)
            .with_timeout(Duration::from_secs(config.provider.timeout_seconds)),
        None => {
            tracing::warn!("No provider configured (set OPENAI_API_KEY or ANTHROPIC_API_KEY); running offline");
            LlmClient::offline()
        }
    }
}

/// Open the learning cache unless disabled.
pub fn open_cache(config: &Config) -> anyhow::Result<Option<Arc<ArtifactCache>>> {
    if !config.cache.enabled {
        return Ok(None);
    }
    let path = config.cache.db_path();
    let cache = ArtifactCache::open(&path, config.cache.clone())
        .with_context(|| format!("could not open cache at {}", path.display()))?;
    Ok(Some(Arc::new(cache)))
}

/// Run the optimization loop for a query and print the result.
/// Returns the process exit code.
pub async fn run_query(query: &str, config: &Config, opts: RunOptions) -> anyhow::Result<i32> {
    let mut config = config.clone();
    if opts.offline {
        config.provider.offline = true;
    }
    if opts.no_cache {
        config.cache.enabled = false;
    }

    let client = build_client(&config, opts.model.as_deref());
    // An unopenable cache still yields a chart, but the run exits with an error
    let (cache, open_error) = match open_cache(&config) {
        Ok(cache) => (cache, None),
        Err(e) => {
            tracing::error!("{:#}", e);
            (None, Some(format!("{e:#}")))
        }
    };

    let mut orchestrator = Orchestrator::new(client, &config, cache)?;
    if !opts.quiet {
        orchestrator = orchestrator.with_progress(super::progress::terminal_progress());
    }

    let max_iterations = opts
        .max_iterations
        .unwrap_or(config.iteration.max_iterations);
    let outcome = orchestrator
        .run(RunRequest::new(query, max_iterations))
        .await?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    let code = match &outcome {
        RunOutcome::Completed(report) => {
            if let Some(ref path) = opts.output {
                std::fs::write(Path::new(path), report.best_artifact.to_pretty_json())?;
                if !opts.quiet {
                    eprintln!("  chart written to {}", path);
                }
            }
            if !opts.json {
                println!("{}", report.best_artifact.to_pretty_json());
            }
            if !opts.quiet {
                eprintln!(
                    "  {} ({}, iteration {} of {})",
                    report.summary,
                    report.band,
                    report.best_iteration,
                    report.history.len(),
                );
            }
            match open_error.as_ref().or(report.storage_error.as_ref()) {
                Some(e) => {
                    eprintln!("error: cache storage failed: {e}");
                    EXIT_ERROR
                }
                None => EXIT_OK,
            }
        }
        RunOutcome::Clarification(request) => {
            if !opts.json {
                eprintln!("{}", request.question);
                eprintln!("  try: chartsmith \"{}\"", request.suggested_query);
            }
            EXIT_CLARIFY
        }
        RunOutcome::Failed(failure) => {
            eprintln!(
                "error: run failed at iteration {}: {}",
                failure.iteration, failure.error
            );
            EXIT_ERROR
        }
    };

    Ok(code)
}

/// `chartsmith clarify <query>`: print the clarifier's verdict.
pub fn clarify(query: &str, json: bool) -> anyhow::Result<i32> {
    let clarification = Clarifier::new().analyze(query);

    if json {
        println!("{}", serde_json::to_string_pretty(&clarification)?);
    } else {
        println!("Category:  {}", clarification.category);
        println!("Question:  {}", clarification.question);
        println!("Suggested: {}", clarification.suggested_query);
    }

    Ok(if clarification.is_blocking() {
        EXIT_CLARIFY
    } else {
        EXIT_OK
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_config_builds_offline_client() {
        let mut config = Config::default();
        config.provider.offline = true;
        assert!(build_client(&config, Some("openai/gpt-4.1-mini")).is_offline());
    }

    #[test]
    fn test_disabled_cache_not_opened() {
        let mut config = Config::default();
        config.cache.enabled = false;
        assert!(open_cache(&config).unwrap().is_none());
    }

    #[test]
    fn test_open_cache_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.cache.path = Some(dir.path().join("nested").join("cache.db"));
        assert!(open_cache(&config).unwrap().is_some());
        assert!(dir.path().join("nested").join("cache.db").exists());
    }

    #[test]
    fn test_clarify_exit_codes() {
        assert_eq!(clarify("show me business data", false).unwrap(), EXIT_CLARIFY);
        assert_eq!(
            clarify("revenue by region over time", false).unwrap(),
            EXIT_OK
        );
    }

    #[tokio::test]
    async fn test_offline_run_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.cache.path = Some(dir.path().join("cache.db"));
        let opts = RunOptions {
            offline: true,
            quiet: true,
            output: Some(dir.path().join("chart.json").display().to_string()),
            ..Default::default()
        };

        let code = run_query("Show me revenue by region over time", &config, opts)
            .await
            .unwrap();
        assert_eq!(code, EXIT_OK);
        let written = std::fs::read_to_string(dir.path().join("chart.json")).unwrap();
        assert!(written.contains("\"autosize\""));
    }

    #[tokio::test]
    async fn test_unopenable_cache_exits_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "plain file").unwrap();

        let mut config = Config::default();
        config.cache.path = Some(blocker.join("cache.db"));
        assert!(open_cache(&config).is_err());

        let opts = RunOptions {
            offline: true,
            quiet: true,
            output: Some(dir.path().join("chart.json").display().to_string()),
            ..Default::default()
        };
        let code = run_query("Show me revenue by region over time", &config, opts)
            .await
            .unwrap();
        assert_eq!(code, EXIT_ERROR);
        // The chart is still produced
        assert!(dir.path().join("chart.json").exists());
    }
}
