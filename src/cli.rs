//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use clap::{Args, Parser, Subcommand};

use crate::client::TimeRange;
use crate::controller::DEFAULT_MIN_MAGNITUDE;
use crate::output::Format;

/// Live earthquake dashboard with map, globe and time-lapse playback.
#[derive(Parser, Debug)]
#[command(name = "quakescope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Base URL of the FDSN event service
    #[arg(long, global = true)]
    pub api_url: Option<String>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web dashboard
    Ui(UiArgs),

    /// Fetch once and print statistics plus the latest events
    Snapshot(SnapshotArgs),

    /// Replay the loaded window as a terminal time-lapse
    Replay(ReplayArgs),
}

/// Feed filters shared by every command.
#[derive(Args, Debug, Clone, Copy)]
pub struct FilterArgs {
    /// Time range to load: day, week, month, all
    #[arg(long, short = 'r', default_value = "day", value_parser = parse_range)]
    pub range: TimeRange,

    /// Minimum magnitude to request
    #[arg(long, short = 'm', default_value_t = DEFAULT_MIN_MAGNITUDE)]
    pub min_magnitude: f64,
}

/// Arguments for the `ui` command.
#[derive(Parser, Debug)]
pub struct UiArgs {
    /// Port to listen on
    #[arg(long, short = 'p', default_value = "8080")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Seconds between incremental updates (minimum 30)
    #[arg(long, default_value = "300")]
    pub poll_interval: u64,

    /// Virtual minutes advanced per playback tick
    #[arg(long, default_value = "60")]
    pub step_minutes: i64,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

/// Arguments for the `snapshot` command.
#[derive(Parser, Debug)]
pub struct SnapshotArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Maximum number of events to list
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `replay` command.
#[derive(Parser, Debug)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Virtual minutes advanced per tick
    #[arg(long, default_value = "60")]
    pub step_minutes: i64,

    /// Wall-clock milliseconds between ticks
    #[arg(long, default_value = "50")]
    pub tick_ms: u64,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Parse a time range from string.
fn parse_range(s: &str) -> Result<TimeRange, String> {
    s.parse()
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}
