// src/cli/mod.rs — CLI definition (clap derive)

pub mod cache;
pub mod progress;
pub mod run;

use clap::{Parser, Subcommand};

/// Process exit codes.
pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_CLARIFY: i32 = 2;

#[derive(Parser)]
#[command(
    name = "chartsmith",
    about = "Iteratively generate and refine Vega-Lite charts from plain-language requests",
    version
)]
pub struct Cli {
    /// Chart request (default command when no subcommand given)
    #[arg(trailing_var_arg = true)]
    pub query: Vec<String>,

    /// Max iterations (defaults to [iteration] max_iterations)
    #[arg(short, long)]
    pub iterations: Option<usize>,

    /// Model to use (provider/model format)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Never call a provider; every stage uses its deterministic fallback
    #[arg(long)]
    pub offline: bool,

    /// Skip the learning cache for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Print the full run outcome as JSON instead of the chart only
    #[arg(long)]
    pub json: bool,

    /// Write the best chart to a file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Suppress progress output (only emit final result)
    #[arg(long)]
    pub quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The trailing words joined back into one request.
    pub fn query_text(&self) -> String {
        self.query.join(" ").trim().to_string()
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect or maintain the learning cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Check whether a request is specific enough, without generating
    Clarify {
        #[arg(trailing_var_arg = true, required = true)]
        query: Vec<String>,
    },
}

#[derive(Subcommand, Clone)]
pub enum CacheAction {
    /// Show run counts, average score and the most frequent issues
    Stats,
    /// Delete every cached entry, run and fix
    Clear,
    /// Forget issue statistics and fixes but keep cached charts
    ResetFixes,
    /// Show the cached entry (and similar requests) for a query
    Show {
        #[arg(trailing_var_arg = true, required = true)]
        query: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_collects_query() {
        let cli = Cli::parse_from(["chartsmith", "-i", "3", "sales", "by", "region"]);
        assert_eq!(cli.query_text(), "sales by region");
        assert_eq!(cli.iterations, Some(3));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "chartsmith",
            "--offline",
            "--no-cache",
            "--json",
            "-m",
            "openai/gpt-4.1-mini",
            "revenue",
        ]);
        assert!(cli.offline && cli.no_cache && cli.json);
        assert_eq!(cli.model.as_deref(), Some("openai/gpt-4.1-mini"));
    }

    #[test]
    fn test_cache_subcommands() {
        let cli = Cli::parse_from(["chartsmith", "cache", "reset-fixes"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Cache {
                action: CacheAction::ResetFixes
            })
        ));

        let cli = Cli::parse_from(["chartsmith", "cache", "show", "sales", "trend"]);
        match cli.command {
            Some(Commands::Cache {
                action: CacheAction::Show { query },
            }) => assert_eq!(query, vec!["sales", "trend"]),
            _ => panic!("expected cache show"),
        }
    }

    #[test]
    fn test_clarify_subcommand() {
        let cli = Cli::parse_from(["chartsmith", "clarify", "show", "everything"]);
        assert!(matches!(cli.command, Some(Commands::Clarify { .. })));
    }
}
