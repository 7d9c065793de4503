//! Terminal output for events and summaries.
//!
//! Supports human-readable (with colors), JSON, and NDJSON formats.

use std::io::{self, Write};

use chrono::{DateTime, Utc};

use crate::classify::Tier;
use crate::models::{AlertLevel, Feature, OutputEvent};
use crate::render::{format_time_ago, magnitude_label};
use crate::stats::Snapshot;

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

// Tier colors, matching the dashboard palette as closely as ANSI allows
const RED: &str = "\x1b[91m";
const ORANGE: &str = "\x1b[38;5;208m";
const YELLOW: &str = "\x1b[93m";
const GREEN: &str = "\x1b[92m";

// Alert level colors
const ALERT_GREEN: &str = "\x1b[42;30m";
const ALERT_YELLOW: &str = "\x1b[43;30m";
const ALERT_ORANGE: &str = "\x1b[48;5;208;30m";
const ALERT_RED: &str = "\x1b[41;97m";

const ICON_QUAKE: &str = "🌍";
const ICON_TSUNAMI: &str = "🌊";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// JSON array
    Json,
    /// Newline-delimited JSON (one object per line)
    Ndjson,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "ndjson" => Ok(Self::Ndjson),
            _ => Err(format!("unknown format: {s} (expected: human, json, ndjson)")),
        }
    }
}

const fn tier_color(tier: Tier) -> &'static str {
    match tier {
        Tier::Extreme => RED,
        Tier::High => ORANGE,
        Tier::Moderate => YELLOW,
        Tier::Low => GREEN,
    }
}

fn format_alert(alert: Option<AlertLevel>) -> String {
    match alert {
        Some(AlertLevel::Red) => format!(" {ALERT_RED} RED {RESET}"),
        Some(AlertLevel::Orange) => format!(" {ALERT_ORANGE} ORANGE {RESET}"),
        Some(AlertLevel::Yellow) => format!(" {ALERT_YELLOW} YELLOW {RESET}"),
        Some(AlertLevel::Green) => format!(" {ALERT_GREEN} GREEN {RESET}"),
        None => String::new(),
    }
}

/// Write events in human-readable format, one line each.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human<W: Write>(writer: &mut W, events: &[Feature], now: DateTime<Utc>) -> io::Result<()> {
    for event in events {
        let time = event
            .time()
            .map_or_else(|| "unknown".into(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
        let ago = event
            .time()
            .map_or_else(String::new, |t| format_time_ago(t, now));

        let tier = Tier::of(event.magnitude());
        let color = tier_color(tier);
        let mag = magnitude_label(event.magnitude());
        let label = tier.as_str().to_uppercase();
        let depth = event.depth_km();
        let place = event.place();
        let alert = format_alert(event.alert());
        let tsunami = if event.tsunami() {
            format!(" {ICON_TSUNAMI}")
        } else {
            String::new()
        };

        writeln!(
            writer,
            "{ICON_QUAKE} {color}{BOLD}M{mag}{RESET} │ \
             {color}{label:8}{RESET} │ \
             {DIM}{depth:>5.0}km{RESET} │ \
             {time} UTC {DIM}({ago}){RESET} │ \
             {place}{tsunami}{alert}"
        )?;
    }
    Ok(())
}

/// Write events as a JSON array.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(writer: &mut W, events: &[Feature]) -> io::Result<()> {
    let output: Vec<OutputEvent> = events.iter().map(OutputEvent::from).collect();
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write events as newline-delimited JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_ndjson<W: Write>(writer: &mut W, events: &[Feature]) -> io::Result<()> {
    for event in events {
        let output = OutputEvent::from(event);
        let json = serde_json::to_string(&output)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{json}")?;
    }
    Ok(())
}

/// Write events in the specified format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_events<W: Write>(
    writer: &mut W,
    events: &[Feature],
    format: Format,
    now: DateTime<Utc>,
) -> io::Result<()> {
    match format {
        Format::Human => write_human(writer, events, now),
        Format::Json => write_json(writer, events),
        Format::Ndjson => write_ndjson(writer, events),
    }
}

/// Write the aggregate summary: headline numbers, magnitude histogram and
/// top regions.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_summary<W: Write>(writer: &mut W, snapshot: &Snapshot) -> io::Result<()> {
    writeln!(
        writer,
        "{BOLD}Events:{RESET} {}   {BOLD}Max:{RESET} {:.1}   {BOLD}Avg depth:{RESET} {}",
        snapshot.count,
        snapshot.max_magnitude,
        snapshot.mean_depth_label()
    )?;

    for bucket in &snapshot.histogram {
        let tier = Tier::of(Some(bucket.min));
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let width = (bucket.height_pct / 5.0).round() as usize;
        writeln!(
            writer,
            "  {:>4.1}–{:<4.1} {}{}{RESET} {}",
            bucket.min,
            bucket.max,
            tier_color(tier),
            "█".repeat(width),
            bucket.count
        )?;
    }

    if snapshot.top_regions.is_empty() {
        writeln!(writer, "{DIM}No data{RESET}")?;
    } else {
        writeln!(writer, "{BOLD}Top regions{RESET}")?;
        for (i, region) in snapshot.top_regions.iter().enumerate() {
            writeln!(writer, "  {}. {} {DIM}({}){RESET}", i + 1, region.region, region.count)?;
        }
    }
    Ok(())
}
