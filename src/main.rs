//! quakescope - Live earthquake dashboard.
//!
//! Serves a map/globe dashboard over the USGS FDSN event service with
//! time-lapse playback, live updates and audio cues. The same engine also
//! backs two terminal commands: a one-shot snapshot and a replay.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use tracing::error;

mod audio;
mod classify;
mod cli;
mod client;
mod controller;
mod errors;
mod models;
mod output;
mod playback;
mod render;
mod server;
mod stats;
mod store;

use cli::{Cli, Command, FilterArgs};
use client::{FeedSource, UsgsClient};
use controller::{Dashboard, FetchOutcome, Filters, LoadState};
use output::Format;
use playback::{Playback, TickOutcome};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    let client = match cli.api_url.as_deref() {
        Some(url) => UsgsClient::with_base_url(url),
        None => UsgsClient::new(),
    }
    .context("failed to create USGS client")?;

    match cli.command {
        Command::Ui(args) => cmd_ui(args, client),
        Command::Snapshot(args) => cmd_snapshot(&args, &client),
        Command::Replay(args) => cmd_replay(&args, &client),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn filters_from(args: FilterArgs) -> Filters {
    Filters {
        range: args.range,
        min_magnitude: args.min_magnitude,
    }
}

/// Playback step from the `--step-minutes` flag.
fn step_from_minutes(minutes: i64) -> Result<chrono::Duration> {
    chrono::Duration::try_minutes(minutes)
        .filter(|step| *step > chrono::Duration::zero())
        .with_context(|| format!("invalid --step-minutes {minutes}: must be positive"))
}

/// Run one blocking full fetch into a fresh dashboard.
fn load_dashboard(client: &UsgsClient, filters: Filters, playback: Playback) -> Result<Dashboard> {
    let mut dashboard = Dashboard::new(filters, playback);
    let ticket = dashboard.begin_full_fetch(Utc::now());
    let result = client.query(&ticket.query);

    match dashboard.complete_full_fetch(ticket, result) {
        FetchOutcome::Loaded(count) => {
            tracing::debug!("loaded {} events", count);
            Ok(dashboard)
        }
        _ => match dashboard.load_state() {
            LoadState::Error(message) => bail!("failed to fetch earthquakes: {message}"),
            state => bail!("fetch did not complete (state: {state:?})"),
        },
    }
}

/// Execute the `ui` command - start web server.
fn cmd_ui(args: cli::UiArgs, client: UsgsClient) -> Result<()> {
    let poll_interval = args.poll_interval.max(server::MIN_POLL_INTERVAL_SECS);
    if poll_interval != args.poll_interval {
        tracing::warn!(
            "poll interval clamped to minimum of {} seconds",
            server::MIN_POLL_INTERVAL_SECS
        );
    }

    let config = server::ServerConfig {
        port: args.port,
        host: args.host.clone(),
        poll_interval,
        filters: filters_from(args.filters),
        playback_step: step_from_minutes(args.step_minutes)?,
    };

    // Print startup message
    let url = format!("http://{}:{}", args.host, args.port);
    println!("\x1b[1m🌍 quakescope\x1b[0m");
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("  Local:   \x1b[96m{url}\x1b[0m");
    println!(
        "  Range:   {} (M{:.1}+)",
        args.filters.range.as_str(),
        args.filters.min_magnitude
    );
    println!("  Poll:    {poll_interval}s");
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("\x1b[2mPress Ctrl+C to stop\x1b[0m\n");

    // Open browser if requested (using xdg-open/open command)
    if args.open {
        #[cfg(target_os = "linux")]
        let _ = std::process::Command::new("xdg-open").arg(&url).spawn();
        #[cfg(target_os = "macos")]
        let _ = std::process::Command::new("open").arg(&url).spawn();
        #[cfg(target_os = "windows")]
        let _ = std::process::Command::new("cmd").args(["/c", "start", &url]).spawn();
    }

    // Run the async server on tokio runtime
    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(server::run_server(config, Arc::new(client)))
}

/// Execute the `snapshot` command - one fetch, statistics and latest events.
fn cmd_snapshot(args: &cli::SnapshotArgs, client: &UsgsClient) -> Result<()> {
    let dashboard = load_dashboard(client, filters_from(args.filters), Playback::default())?;

    // Most recent first
    let mut events: Vec<_> = dashboard.store().events().to_vec();
    events.reverse();
    events.truncate(args.limit);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if args.format == Format::Human {
        output::write_summary(&mut handle, dashboard.snapshot())?;
        writeln!(handle)?;
    }
    output::write_events(&mut handle, &events, args.format, Utc::now())?;

    Ok(())
}

/// Execute the `replay` command - time-lapse of the loaded window.
///
/// Events are printed as the playback pointer passes them, oldest first.
fn cmd_replay(args: &cli::ReplayArgs, client: &UsgsClient) -> Result<()> {
    let playback = Playback::new(step_from_minutes(args.step_minutes)?);
    let mut dashboard = load_dashboard(client, filters_from(args.filters), playback)?;

    if dashboard.store().is_empty() || !dashboard.play() {
        bail!("nothing to replay");
    }

    let tick = std::time::Duration::from_millis(args.tick_ms);
    let stdout = io::stdout();
    let mut shown = dashboard.visible_events().len();

    tracing::info!(
        "replaying {} events, {} min per tick",
        dashboard.store().len(),
        args.step_minutes
    );

    loop {
        let outcome = dashboard.tick();
        let visible = dashboard.visible_events();

        if visible.len() > shown {
            let mut handle = stdout.lock();
            output::write_events(&mut handle, &visible[shown..], args.format, Utc::now())?;
            handle.flush()?;
            shown = visible.len();
        }

        match outcome {
            TickOutcome::Advanced => std::thread::sleep(tick),
            TickOutcome::Finished | TickOutcome::Idle => break,
        }
    }

    if args.format == Format::Human {
        let mut handle = stdout.lock();
        writeln!(handle)?;
        output::write_summary(&mut handle, dashboard.snapshot())?;
    }

    Ok(())
}
