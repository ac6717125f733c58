// src/main.rs — chartsmith entry point

use clap::Parser;

use chartsmith::cli::run::{self, RunOptions};
use chartsmith::cli::{Cli, Commands, EXIT_ERROR, EXIT_OK};
use chartsmith::infra::config::Config;
use chartsmith::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Respects RUST_LOG; -v / --quiet pick the default level
    logger::init_logging(logger::level_for(cli.verbose, cli.quiet));

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(EXIT_ERROR);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    // Falls back to defaults if no config.toml
    let mut config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };
    config.apply_env()?;
    config.validate()?;

    match &cli.command {
        Some(Commands::Cache { action }) => {
            chartsmith::cli::cache::run_cache_command(action.clone(), &config)?;
            return Ok(EXIT_OK);
        }
        Some(Commands::Clarify { query }) => {
            return run::clarify(&query.join(" "), cli.json);
        }
        None => {}
    }

    let query = cli.query_text();
    if query.is_empty() {
        anyhow::bail!("no chart request given. Usage: chartsmith \"sales by region over time\"");
    }

    let opts = RunOptions {
        max_iterations: cli.iterations,
        model: cli.model.clone(),
        offline: cli.offline,
        no_cache: cli.no_cache,
        json: cli.json,
        output: cli.output.clone(),
        quiet: cli.quiet,
    };
    run::run_query(&query, &config, opts).await
}
