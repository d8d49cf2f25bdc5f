mod output;

use clap::{ArgAction, Parser, Subcommand};
pub use output::{ColorMode, OutputFormat};
use std::path::PathBuf;

/// Count log events matching search-query monitors
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(short = 'F', long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Also write the report to this file
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// When to use colors
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    pub color: ColorMode,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every configured monitor over newline-delimited JSON events and print the counts
    Count {
        /// Monitor configuration (TOML, or JSON5 for .json/.json5 files)
        #[arg(short, long, env = "CLOUDMON_CONFIG")]
        config: PathBuf,

        /// Event files, one JSON object per line
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Override the configured batch size
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Compile every configured monitor query and report problems
    Check {
        /// Monitor configuration (TOML, or JSON5 for .json/.json5 files)
        #[arg(short, long, env = "CLOUDMON_CONFIG")]
        config: PathBuf,
    },
    /// Print the events matching a single ad-hoc query
    Match {
        /// Query to evaluate, e.g. "service:(a OR b) -env:staging timeout"
        #[arg(short = 'Q', long)]
        query: String,

        /// Event files, one JSON object per line
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print only the number of matching events
        #[arg(long)]
        count: bool,
    },
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}
