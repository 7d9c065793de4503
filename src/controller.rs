//! Dashboard state and the fetch/update controller.
//!
//! [`Dashboard`] owns the event store, the time window, the aggregate
//! snapshot, the playback clock and the user's filters. It performs no I/O:
//! callers run the feed query and hand the result back, which keeps every
//! transition testable with a fixed clock.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audio::{Tone, ToneEmitter};
use crate::client::{FeedQuery, TimeRange};
use crate::errors::QuakeError;
use crate::models::{Feature, FeatureCollection};
use crate::playback::{Playback, PlaybackState, TickOutcome};
use crate::render::{self, View, ViewMode};
use crate::stats::Snapshot;
use crate::store::{EventStore, TimeWindow};

/// Default minimum magnitude requested from the feed.
pub const DEFAULT_MIN_MAGNITUDE: f64 = 2.5;

/// Magnitude at or above which a newly arrived event raises the alert.
pub const SIGNIFICANT_MAGNITUDE: f64 = 6.0;

/// How far back an incremental update looks.
pub const UPDATE_LOOKBACK: Duration = Duration::hours(1);

/// Message shown in place of the list when a full fetch fails.
pub const FETCH_ERROR_MESSAGE: &str = "Failed to load data. Please try again.";

const LOADING_MESSAGE: &str = "Loading data...";

/// Load state of the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Error(String),
}

/// User-selected feed filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Filters {
    pub range: TimeRange,
    pub min_magnitude: f64,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            range: TimeRange::Day,
            min_magnitude: DEFAULT_MIN_MAGNITUDE,
        }
    }
}

/// An issued full fetch. Only the most recent ticket may complete.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchTicket {
    pub generation: u64,
    pub query: FeedQuery,
    pub now: DateTime<Utc>,
}

/// Outcome of completing a full fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded(usize),
    Failed,
    /// A newer fetch was issued after this one
    Superseded,
}

/// Side effects produced by an incremental update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    /// Number of events merged into the store
    pub merged: usize,
    /// One tone per merged event, in feed order
    pub tones: Vec<Tone>,
    /// A merged event was at or above [`SIGNIFICANT_MAGNITUDE`]
    pub significant: bool,
    /// The update was not applied (playback running or request failed)
    pub skipped: bool,
}

/// Serializable summary for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub load: LoadState,
    pub filters: Filters,
    pub playback: PlaybackState,
    pub window: Option<TimeWindow>,
    pub position_percent: Option<f64>,
    pub view_mode: ViewMode,
    pub audio: ToneEmitter,
    pub event_count: usize,
}

/// Complete application state.
#[derive(Debug, Default)]
pub struct Dashboard {
    store: EventStore,
    window: Option<TimeWindow>,
    snapshot: Snapshot,
    playback: Playback,
    load: LoadState,
    filters: Filters,
    view_mode: ViewMode,
    audio: ToneEmitter,
    /// Render against the playback pointer instead of the whole store
    time_filtered: bool,
    generation: u64,
}

impl Dashboard {
    #[must_use]
    pub fn new(filters: Filters, playback: Playback) -> Self {
        Self {
            filters,
            playback,
            ..Self::default()
        }
    }

    // ------------------------------------------------------------------
    // Full fetch
    // ------------------------------------------------------------------

    /// Start a full fetch: pause playback, enter `Loading` and return the
    /// query to run.
    pub fn begin_full_fetch(&mut self, now: DateTime<Utc>) -> FetchTicket {
        if self.playback.is_playing() {
            debug!("pausing playback for full fetch");
            self.playback.pause();
        }

        self.generation += 1;
        self.load = LoadState::Loading;

        FetchTicket {
            generation: self.generation,
            query: FeedQuery {
                start: now - self.filters.range.horizon(),
                min_magnitude: self.filters.min_magnitude,
            },
            now,
        }
    }

    /// Apply the result of a full fetch.
    ///
    /// Failures keep the previous events and window so stale data stays
    /// visible behind the error message.
    pub fn complete_full_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<FeatureCollection, QuakeError>,
    ) -> FetchOutcome {
        if ticket.generation != self.generation {
            debug!(
                "discarding superseded fetch (generation {} < {})",
                ticket.generation, self.generation
            );
            return FetchOutcome::Superseded;
        }

        match result {
            Ok(feed) => {
                self.store.replace(feed.features);
                self.snapshot = Snapshot::compute(self.store.events());
                self.window = Some(TimeWindow::new(ticket.query.start, ticket.now));
                self.time_filtered = false;
                self.load = LoadState::Ready;
                info!("loaded {} events ({})", self.store.len(), self.filters.range.as_str());
                FetchOutcome::Loaded(self.store.len())
            }
            Err(e) => {
                warn!("full fetch failed: {}", e);
                self.load = LoadState::Error(e.to_string());
                FetchOutcome::Failed
            }
        }
    }

    // ------------------------------------------------------------------
    // Incremental update
    // ------------------------------------------------------------------

    /// Query for an incremental update, or `None` while playback runs.
    #[must_use]
    pub fn update_query(&self, now: DateTime<Utc>) -> Option<FeedQuery> {
        if self.playback.is_playing() {
            return None;
        }
        Some(FeedQuery {
            start: now - UPDATE_LOOKBACK,
            min_magnitude: self.filters.min_magnitude,
        })
    }

    /// Merge the result of an incremental update.
    ///
    /// Errors are logged and otherwise ignored: a failed poll never
    /// disturbs a working dashboard.
    pub fn apply_update(
        &mut self,
        result: Result<FeatureCollection, QuakeError>,
        now: DateTime<Utc>,
    ) -> UpdateOutcome {
        if self.playback.is_playing() {
            return UpdateOutcome {
                skipped: true,
                ..UpdateOutcome::default()
            };
        }

        let feed = match result {
            Ok(feed) => feed,
            Err(e) => {
                warn!("auto-refresh failed: {}", e);
                return UpdateOutcome {
                    skipped: true,
                    ..UpdateOutcome::default()
                };
            }
        };

        let merged = self.store.merge(feed.features);
        if merged.is_empty() {
            return UpdateOutcome::default();
        }

        if let Some(window) = self.window.as_mut() {
            window.extend_to(now);
            // Fresh events on top of a loaded window clear an earlier fetch error
            if matches!(self.load, LoadState::Error(_)) {
                self.load = LoadState::Ready;
            }
        }
        self.snapshot = Snapshot::compute(self.store.events());
        self.time_filtered = false;

        let mut outcome = UpdateOutcome {
            merged: merged.len(),
            ..UpdateOutcome::default()
        };
        for event in &merged {
            info!(
                "new earthquake: M{} {}",
                render::magnitude_label(event.magnitude()),
                event.place()
            );
            if let Some(tone) = self.audio.emit(event.magnitude()) {
                outcome.tones.push(tone);
            }
            if event.magnitude().is_some_and(|m| m >= SIGNIFICANT_MAGNITUDE) {
                outcome.significant = true;
            }
        }

        debug!("merged {} new events ({} total)", merged.len(), self.store.len());
        outcome
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Start playback. Returns `false` when nothing is loaded yet or a
    /// full fetch is in flight, since the window is about to be replaced.
    pub fn play(&mut self) -> bool {
        if self.load == LoadState::Loading {
            debug!("playback refused while loading");
            return false;
        }
        let Some(window) = self.window.as_mut() else {
            debug!("playback requested before any data loaded");
            return false;
        };
        self.playback.start(window);
        self.time_filtered = true;
        true
    }

    pub fn pause(&mut self) {
        if self.playback.state() != PlaybackState::Stopped {
            self.playback.pause();
        }
    }

    /// Play/pause. Returns whether playback is now running.
    pub fn toggle_playback(&mut self) -> bool {
        if !self.playback.is_playing() && self.load == LoadState::Loading {
            debug!("playback refused while loading");
            return false;
        }
        let Some(window) = self.window.as_mut() else {
            return false;
        };
        self.playback.toggle(window);
        if self.playback.is_playing() {
            self.time_filtered = true;
        }
        self.playback.is_playing()
    }

    /// Advance the playback clock one tick.
    pub fn tick(&mut self) -> TickOutcome {
        let Some(window) = self.window.as_mut() else {
            return TickOutcome::Idle;
        };
        let outcome = self.playback.tick(window);
        if outcome != TickOutcome::Idle {
            self.time_filtered = true;
        }
        outcome
    }

    /// Move the playback pointer to `percent` of the window.
    pub fn seek(&mut self, percent: f64) -> bool {
        let Some(window) = self.window.as_mut() else {
            return false;
        };
        self.playback.seek(window, percent);
        self.time_filtered = true;
        true
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub fn set_filters(&mut self, filters: Filters) {
        self.filters = filters;
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    pub fn set_audio(&mut self, audio: ToneEmitter) {
        self.audio = audio;
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Events currently on screen: all of them, or those at or before the
    /// playback pointer.
    #[must_use]
    pub fn visible_events(&self) -> &[Feature] {
        match (self.time_filtered, self.window) {
            (true, Some(window)) => self.store.until(window.current),
            _ => self.store.events(),
        }
    }

    /// Render the active view.
    ///
    /// While loading or after a failed fetch the status message replaces
    /// the list, but the map and globe keep drawing the loaded events.
    #[must_use]
    pub fn view(&self, now: DateTime<Utc>) -> View {
        let mut view = render::render(self.visible_events(), self.view_mode, self.time_filtered, now);
        let message = match &self.load {
            LoadState::Loading => Some(LOADING_MESSAGE),
            LoadState::Error(_) => Some(FETCH_ERROR_MESSAGE),
            LoadState::Idle | LoadState::Ready => None,
        };
        if let Some(message) = message {
            view.list.clear();
            view.message = Some(message.to_string());
        }
        view
    }

    #[must_use]
    pub fn status(&self) -> Status {
        Status {
            load: self.load.clone(),
            filters: self.filters,
            playback: self.playback.state(),
            window: self.window,
            position_percent: self.window.map(|w| w.position_percent()),
            view_mode: self.view_mode,
            audio: self.audio,
            event_count: self.store.len(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    #[must_use]
    pub fn store(&self) -> &EventStore {
        &self.store
    }

    #[must_use]
    pub fn window(&self) -> Option<TimeWindow> {
        self.window
    }

    #[must_use]
    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    #[must_use]
    pub fn filters(&self) -> Filters {
        self.filters
    }

    #[must_use]
    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }
}
