//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "callscribe", version, about = "Conversation capture and transcription")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record one conversation until sustained silence stops it
    Record(RecordArgs),
    /// List available capture devices
    Devices,
    /// Print the resolved configuration
    Config,
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    /// Capture device name (as listed by `callscribe devices`)
    #[arg(long)]
    pub device: Option<String>,

    /// Directory where chunk files and metadata are written
    #[arg(long, default_value = "recordings")]
    pub output: PathBuf,

    /// Silence window before auto-stop (e.g. "2s", "1500ms")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub silence: Option<Duration>,

    /// Maximum duration per chunk (e.g. "5m")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub max_chunk: Option<Duration>,

    /// Minimum recording length before the first auto-stop (e.g. "3s")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub min_recording: Option<Duration>,

    /// Hard cap on the recording length (stops even without silence)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub limit: Option<Duration>,

    /// Persist the finished recording to the configured platform
    #[arg(long, requires = "owner")]
    pub persist: bool,

    /// Owner (employee) identity for the persisted record
    #[arg(long)]
    pub owner: Option<String>,

    /// External participant identifier for the persisted record
    #[arg(long, default_value = "unknown")]
    pub participant: String,

    /// Show a live level meter on stderr
    #[arg(long, short)]
    pub verbose: bool,
}
