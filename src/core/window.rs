//! Rolling per-second event window.
//!
//! Events are counted into a ring of one-second buckets. The ring is advanced
//! lazily: whoever touches the window with a newer `now` rolls it forward by
//! the number of whole seconds that passed, clearing the buckets it reuses.

use chrono::{DateTime, Utc};

/// Fixed-size ring of per-second event counts with a running sum.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    /// One bucket per second of the window
    buckets: Vec<u64>,
    /// Sum of all buckets
    rolling_sum: u64,
    /// Whole seconds observed since start; never wraps
    elapsed_seconds: u64,
    /// Instant the window was last rolled forward
    last_rollover: DateTime<Utc>,
}

impl RollingWindow {
    /// Create an empty window of `size` seconds whose clock starts at `now`.
    pub fn new(size: usize, now: DateTime<Utc>) -> Self {
        Self {
            buckets: vec![0; size.max(1)],
            rolling_sum: 0,
            elapsed_seconds: 0,
            last_rollover: now,
        }
    }

    /// Roll the window forward to `now`.
    ///
    /// Returns the number of whole seconds advanced. A `now` that is not at
    /// least one second past the last rollover leaves the window untouched.
    pub fn advance(&mut self, now: DateTime<Utc>) -> u64 {
        let since = now - self.last_rollover;
        let millis = since.num_milliseconds();

        if millis < 0 {
            tracing::debug!(
                behind_ms = -millis,
                "clock is behind the last rollover, window not advanced"
            );
            return 0;
        }

        let seconds = (millis / 1000) as u64;
        if seconds == 0 {
            return 0;
        }

        let size = self.buckets.len() as u64;
        if seconds >= size {
            // Every bucket is reused at least once.
            self.buckets.iter_mut().for_each(|b| *b = 0);
            self.rolling_sum = 0;
            self.elapsed_seconds += seconds;
        } else {
            for _ in 0..seconds {
                self.elapsed_seconds += 1;
                let index = self.current_index();
                self.rolling_sum -= self.buckets[index];
                self.buckets[index] = 0;
            }
        }

        if seconds > 1 {
            tracing::trace!(seconds, "rolled window over several seconds");
        }

        self.last_rollover = now;
        seconds
    }

    /// Count one event at `now`.
    pub fn record(&mut self, now: DateTime<Utc>) {
        self.advance(now);
        let index = self.current_index();
        self.buckets[index] += 1;
        self.rolling_sum += 1;
    }

    /// Un-smoothed events-per-minute estimate.
    ///
    /// While the window has not been open for its full length the count is
    /// extrapolated over the seconds seen so far.
    pub fn raw_rate(&self) -> f64 {
        if self.elapsed_seconds == 0 {
            return 0.0;
        }

        let covered = self.elapsed_seconds.min(self.buckets.len() as u64);
        self.rolling_sum as f64 * (60.0 / covered as f64)
    }

    /// Clear every bucket and restart the window clock at `now`.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.buckets.iter_mut().for_each(|b| *b = 0);
        self.rolling_sum = 0;
        self.elapsed_seconds = 0;
        self.last_rollover = now;
    }

    pub fn rolling_sum(&self) -> u64 {
        self.rolling_sum
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn last_rollover(&self) -> DateTime<Utc> {
        self.last_rollover
    }

    /// Window length in seconds.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether the window currently holds no events.
    pub fn is_empty(&self) -> bool {
        self.rolling_sum == 0
    }

    fn current_index(&self) -> usize {
        (self.elapsed_seconds % self.buckets.len() as u64) as usize
    }
}
