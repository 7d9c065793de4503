//! In-memory event store and the loaded time window.
//!
//! The store is the only mutable collection of events. It keeps events
//! unique by id and sorted ascending by time after every mutation.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::Feature;

/// Deduplicated, time-sorted list of loaded events.
#[derive(Debug, Default)]
pub struct EventStore {
    /// Events, oldest first
    events: Vec<Feature>,
    /// Ids present in `events`
    ids: HashSet<String>,
}

impl EventStore {
    /// Replace the whole store. Later duplicates of an id are dropped.
    pub fn replace(&mut self, events: Vec<Feature>) {
        self.events.clear();
        self.ids.clear();

        for event in events {
            if self.ids.insert(event.id.clone()) {
                self.events.push(event);
            }
        }
        self.sort();

        debug_assert_eq!(self.events.len(), self.ids.len());
    }

    /// Append every event whose id is not already present, then re-sort.
    ///
    /// Returns the newly merged events in the order they were offered.
    pub fn merge(&mut self, incoming: Vec<Feature>) -> Vec<Feature> {
        let mut merged = Vec::new();

        for event in incoming {
            if !self.ids.insert(event.id.clone()) {
                continue;
            }
            merged.push(event.clone());
            self.events.push(event);
        }

        if !merged.is_empty() {
            self.sort();
        }

        debug_assert_eq!(self.events.len(), self.ids.len());
        merged
    }

    fn sort(&mut self) {
        self.events.sort_by_key(Feature::time_ms);
    }

    /// All events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[Feature] {
        &self.events
    }

    /// Events that occurred at or before `cutoff`, oldest first.
    #[must_use]
    pub fn until(&self, cutoff: DateTime<Utc>) -> &[Feature] {
        let cutoff_ms = cutoff.timestamp_millis();
        let end = self.events.partition_point(|e| e.time_ms() <= cutoff_ms);
        &self.events[..end]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// The loaded real-time span plus the virtual playback pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub current: DateTime<Utc>,
}

impl TimeWindow {
    /// A window from `start` to `end` with the pointer at the end.
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            current: end,
        }
    }

    #[must_use]
    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    /// Move the end to `now` and reset the pointer to it.
    pub fn extend_to(&mut self, now: DateTime<Utc>) {
        self.end = now.max(self.start);
        self.current = self.end;
    }

    /// Instant at `percent` (clamped to 0..=100) of the way through the window.
    #[must_use]
    pub fn at_percent(&self, percent: f64) -> DateTime<Utc> {
        let percent = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
        let span_ms = self.span().num_milliseconds();
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let offset = (span_ms as f64 * percent / 100.0).round() as i64;
        (self.start + Duration::milliseconds(offset)).min(self.end)
    }

    /// Position of the pointer as a percentage of the window.
    #[must_use]
    pub fn position_percent(&self) -> f64 {
        let span_ms = self.span().num_milliseconds();
        if span_ms <= 0 {
            return 100.0;
        }
        let elapsed_ms = (self.current - self.start).num_milliseconds();
        #[allow(clippy::cast_precision_loss)]
        let pct = elapsed_ms as f64 / span_ms as f64 * 100.0;
        pct.clamp(0.0, 100.0)
    }
}
