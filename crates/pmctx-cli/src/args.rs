//! CLI argument definitions using clap
//!
//! - pmctx budget --window 200000 --history 3000      # Budgets for every agent
//! - pmctx budget --window 200000 --agent reporter    # One agent
//! - pmctx compress -i transcript.json --agent planner --model gpt-4o

use clap::{Parser, Subcommand, ValueEnum};
use pmctx_core::context::CompressionStrategy;
use std::path::PathBuf;

/// Default settings file name used across all CLI commands.
pub const DEFAULT_CONFIG_FILE: &str = "pmctx.toml";

#[derive(Parser)]
#[command(name = "pmctx")]
#[command(about = "Inspect token budgets and dry-run context compression")]
#[command(version)]
pub struct Cli {
    /// Settings file (TOML, YAML or JSON); defaults apply when it does not exist
    #[arg(long, global = true, env = "PMCTX_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show how each agent's token limit is derived
    Budget {
        /// Model context window in tokens
        #[arg(long)]
        window: usize,

        /// Tokens of history sent outside the compressed messages
        #[arg(long, default_value_t = 0)]
        history: usize,

        /// Only show this agent type
        #[arg(long)]
        agent: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Compress a JSON transcript and report the result
    Compress {
        /// Transcript file: a JSON array of messages
        #[arg(long, short)]
        input: PathBuf,

        /// Agent type whose budget applies
        #[arg(long)]
        agent: String,

        /// Model the transcript is sent to
        #[arg(long, default_value = "gpt-4o")]
        model: String,

        /// Context window; defaults to the model's known window
        #[arg(long)]
        window: Option<usize>,

        /// Tokens of history sent outside the compressed messages
        #[arg(long, default_value_t = 0)]
        history: usize,

        /// Override the configured strategy (simple, hierarchical, importance)
        #[arg(long)]
        strategy: Option<CompressionStrategy>,

        /// Write the compressed messages to this file
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        }
    }
}
