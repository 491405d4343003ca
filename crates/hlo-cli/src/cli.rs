//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Analysis of recorded block-building sessions.
///
/// Reads games, message logs and questionnaires from a local store and
/// reports how long players spent on each high-level object (HLO).
#[derive(Debug, Parser)]
#[command(name = "hlo", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import games, logs and answers as JSONL from stdin.
    Import,

    /// Show the analysis of a single game.
    Game {
        /// The game ID.
        id: i64,

        /// Output as JSON instead of markdown.
        #[arg(long)]
        json: bool,
    },

    /// Write markdown analyses into the output directory.
    Analyze(AnalyzeArgs),

    /// Print one CSV line per game.
    Csv {
        /// Field separator.
        #[arg(long, default_value = ",")]
        separator: String,
    },

    /// List blocks placed, destroyed and present before a point in time.
    Blocks {
        /// The game ID.
        id: i64,

        /// Cutoff time (RFC 3339, e.g. 2020-06-01T12:00:00Z).
        #[arg(long)]
        until: String,
    },
}

/// Filters for `hlo analyze`.
///
/// Without any filter, every per-game, per-scenario and per-architect report
/// is written.
#[derive(Debug, Default, Args)]
pub struct AnalyzeArgs {
    /// Only include games of this scenario.
    #[arg(long)]
    pub scenario: Option<String>,

    /// Only include games with this architect.
    #[arg(long)]
    pub architect: Option<String>,

    /// Only include successfully finished games.
    #[arg(long)]
    pub successful: bool,
}

impl AnalyzeArgs {
    pub const fn is_filtered(&self) -> bool {
        self.scenario.is_some() || self.architect.is_some() || self.successful
    }
}
