//! CLI module for Tolk.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Tolk - media transcription and analysis
///
/// Downloads a remote media source, transcribes it locally, and produces
/// a markdown analysis document. The name "Tolk" comes from the
/// Norwegian word for "interpreter."
#[derive(Parser, Debug)]
#[command(name = "tolk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download, transcribe, and analyze a media source
    Process {
        /// Media URL to process
        url: String,

        /// Path to the whisper model file (overrides config)
        #[arg(short, long)]
        model: Option<String>,

        /// Compute device: cpu or cuda (overrides config)
        #[arg(short, long)]
        device: Option<String>,

        /// Working directory for artifacts (overrides config)
        #[arg(short, long)]
        work_dir: Option<String>,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
