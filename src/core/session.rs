//! Session-level counters and extremes.

use crate::collector::types::{InputCategory, StatCategory};
use chrono::{DateTime, Duration, Utc};

/// Cumulative statistics for the current session.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    total_events: u64,
    keyboard_events: u64,
    mouse_events: u64,
    /// Highest displayed rate seen
    peak_rate: u32,
    /// Lowest positive rounded smoothed rate seen
    min_rate: Option<u32>,
    /// Set by the first event of the session
    session_start: Option<DateTime<Utc>>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one event of `category` at `now`.
    pub fn record(&mut self, category: InputCategory, now: DateTime<Utc>) {
        self.total_events += 1;
        match category.stat_category() {
            StatCategory::Keyboard => self.keyboard_events += 1,
            StatCategory::Mouse => self.mouse_events += 1,
        }
        if self.session_start.is_none() {
            tracing::debug!(start = %now, "session started");
            self.session_start = Some(now);
        }
    }

    /// Raise the peak to `displayed` if it is higher. Returns whether it changed.
    pub fn offer_peak(&mut self, displayed: u32) -> bool {
        if displayed > self.peak_rate {
            self.peak_rate = displayed;
            true
        } else {
            false
        }
    }

    /// Lower the minimum using a smoothed rate; non-positive rounded values are ignored.
    pub fn offer_min(&mut self, smoothed_rate: f64) {
        let rounded = smoothed_rate.round_ties_even();
        if rounded < 1.0 {
            return;
        }
        let rounded = rounded as u32;
        if self.min_rate.map_or(true, |min| rounded < min) {
            self.min_rate = Some(rounded);
        }
    }

    /// Events per minute over the whole session.
    ///
    /// Sessions shorter than `floor` report the event total instead, so the
    /// first seconds don't divide by a tiny duration.
    pub fn average_rate(&self, now: DateTime<Utc>, floor: std::time::Duration) -> f64 {
        let Some(start) = self.session_start else {
            return 0.0;
        };
        if self.total_events == 0 {
            return 0.0;
        }

        let elapsed_ms = (now - start).num_milliseconds();
        if (elapsed_ms as f64) < floor.as_millis() as f64 {
            return self.total_events as f64;
        }

        self.total_events as f64 / (elapsed_ms as f64 / 60_000.0)
    }

    /// Time since the first event, zero when no session is running.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.session_start
            .map_or_else(Duration::zero, |start| now - start)
    }

    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    pub fn keyboard_events(&self) -> u64 {
        self.keyboard_events
    }

    pub fn mouse_events(&self) -> u64 {
        self.mouse_events
    }

    pub fn peak_rate(&self) -> u32 {
        self.peak_rate
    }

    /// Minimum observed rate, 0 while unset.
    pub fn min_rate(&self) -> u32 {
        self.min_rate.unwrap_or(0)
    }

    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        self.session_start
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
