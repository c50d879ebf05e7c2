use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// A tool to apply declarative mutations to streams of JSON log records
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Mutation config file (TOML)
    #[arg(short, long, env = "LOG_MUTATOR_CONFIG")]
    pub config: PathBuf,

    /// When to color diff and summary output
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors, silencing per-action warnings
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mutate newline-delimited JSON records from a file or stdin
    Apply {
        /// Input file with one JSON record per line; stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Event tag exposed to %{event_tag} references
        #[arg(short, long, default_value = "mutate")]
        tag: String,

        /// Event timestamp (epoch seconds) exposed to %{event_time};
        /// defaults to the current time
        #[arg(long)]
        time: Option<i64>,

        /// Write mutated records to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show a colored before/after diff per changed record instead
        /// of emitting the records
        #[arg(short, long)]
        diff: bool,

        /// Print a per-action summary table to stderr when done
        #[arg(long)]
        stats: bool,
    },
    /// Validate the config, print the compiled pipeline, and exit
    Check {
        /// Dump the normalized configuration as TOML instead of a table
        #[arg(long)]
        dump: bool,
    },
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}
