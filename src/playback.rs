//! Time-lapse playback clock.
//!
//! Playback advances the window's virtual `current` pointer by a fixed
//! step on every tick. It never touches the event store; the renderer
//! filters events against the pointer instead.

use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::Serialize;

use crate::store::TimeWindow;

/// Wall-clock interval between playback ticks.
pub const TICK_INTERVAL: StdDuration = StdDuration::from_millis(50);

/// Default virtual time advanced per tick.
pub const DEFAULT_STEP: Duration = Duration::hours(1);

/// Playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Pointer advanced, still inside the window
    Advanced,
    /// Pointer reached the end of the window; playback paused
    Finished,
    /// Tick arrived while not playing
    Idle,
}

/// Discrete virtual clock over a [`TimeWindow`].
#[derive(Debug, Clone)]
pub struct Playback {
    state: PlaybackState,
    step: Duration,
}

impl Default for Playback {
    fn default() -> Self {
        Self::new(DEFAULT_STEP)
    }
}

impl Playback {
    /// Create a stopped clock advancing `step` per tick.
    #[must_use]
    pub fn new(step: Duration) -> Self {
        let step = if step <= Duration::zero() { DEFAULT_STEP } else { step };
        Self {
            state: PlaybackState::Stopped,
            step,
        }
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    #[must_use]
    /// Start playing. A pointer already at the end rewinds to the start.
    pub fn start(&mut self, window: &mut TimeWindow) {
        if window.current >= window.end {
            window.current = window.start;
        }
        self.state = PlaybackState::Playing;
    }

    /// Stop ticking and keep the pointer where it is.
    pub fn pause(&mut self) {
        self.state = PlaybackState::Paused;
    }

    /// Play/pause button semantics.
    pub fn toggle(&mut self, window: &mut TimeWindow) {
        if self.is_playing() {
            self.pause();
        } else {
            self.start(window);
        }
    }

    /// Advance the pointer one step, clamping at the end of the window.
    pub fn tick(&mut self, window: &mut TimeWindow) -> TickOutcome {
        if !self.is_playing() {
            return TickOutcome::Idle;
        }

        let next = window.current + self.step;
        if next >= window.end {
            window.current = window.end;
            self.pause();
            return TickOutcome::Finished;
        }

        window.current = next;
        TickOutcome::Advanced
    }

    /// Jump the pointer to `percent` of the window. State is unchanged.
    pub fn seek(&self, window: &mut TimeWindow, percent: f64) {
        window.current = window.at_percent(percent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day_window() -> TimeWindow {
        let start = Utc
            .with_ymd_and_hms(2024, 3, 1, 0, 0, 0)
            .single()
            .expect("valid date");
        TimeWindow::new(start, start + Duration::hours(24))
    }

    #[test]
    fn test_initial_state() {
        let playback = Playback::default();
        let window = day_window();
        assert_eq!(playback.state(), PlaybackState::Stopped);
        assert_eq!(window.current, window.end);
    }

    #[test]
    fn test_start_rewinds_from_end() {
        let mut playback = Playback::default();
        let mut window = day_window();
        playback.start(&mut window);
        assert!(playback.is_playing());
        assert_eq!(window.current, window.start);
    }

    #[test]
    fn test_start_resumes_mid_window() {
        let mut playback = Playback::default();
        let mut window = day_window();
        playback.seek(&mut window, 50.0);
        playback.start(&mut window);
        assert_eq!(window.current, window.start + Duration::hours(12));
    }

    #[test]
    fn test_full_day_finishes_at_end() {
        let mut playback = Playback::default();
        let mut window = day_window();
        playback.start(&mut window);

        let mut ticks = 0;
        loop {
            ticks += 1;
            let outcome = playback.tick(&mut window);
            assert!(window.current <= window.end);
            if outcome == TickOutcome::Finished {
                break;
            }
            assert_eq!(outcome, TickOutcome::Advanced);
            assert!(ticks < 24, "should finish within 24 ticks");
        }

        assert_eq!(ticks, 24);
        assert_eq!(window.current, window.end);
        assert_eq!(playback.state(), PlaybackState::Paused);
        assert_eq!(playback.tick(&mut window), TickOutcome::Idle);
    }

    #[test]
    fn test_pause_keeps_pointer() {
        let mut playback = Playback::default();
        let mut window = day_window();
        playback.start(&mut window);
        playback.tick(&mut window);
        playback.tick(&mut window);
        playback.pause();

        assert_eq!(playback.state(), PlaybackState::Paused);
        assert_eq!(window.current, window.start + Duration::hours(2));
        assert_eq!(playback.tick(&mut window), TickOutcome::Idle);
    }

    #[test]
    fn test_seek_does_not_change_state() {
        let mut playback = Playback::default();
        let mut window = day_window();
        playback.seek(&mut window, 0.0);
        assert_eq!(window.current, window.start);
        assert_eq!(playback.state(), PlaybackState::Stopped);

        playback.start(&mut window);
        playback.seek(&mut window, 100.0);
        assert_eq!(window.current, window.end);
        assert!(playback.is_playing());
    }

    #[test]
    fn test_toggle() {
        let mut playback = Playback::default();
        let mut window = day_window();
        playback.toggle(&mut window);
        assert!(playback.is_playing());
        playback.toggle(&mut window);
        assert_eq!(playback.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_non_positive_step_falls_back() {
        let mut playback = Playback::new(Duration::zero());
        let mut window = day_window();
        playback.start(&mut window);
        playback.tick(&mut window);
        assert_eq!(window.current, window.start + DEFAULT_STEP);
    }
}
