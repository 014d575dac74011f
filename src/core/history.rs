//! Bounded history of smoothed-rate samples.

use crate::config::EngineConfig;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A single snapshot of the smoothed rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub timestamp: DateTime<Utc>,
    /// Smoothed rate in actions per minute
    pub rate: f64,
}

/// FIFO ring of periodic rate samples.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: VecDeque<HistorySample>,
    capacity: usize,
    interval_ms: i64,
}

impl HistoryBuffer {
    pub fn new(config: &EngineConfig) -> Self {
        let capacity = config.history_capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
            interval_ms: i64::try_from(config.history_interval.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Append a sample if the buffer is empty or the newest sample is at
    /// least one interval old. Returns whether a sample was taken.
    pub fn maybe_sample(&mut self, now: DateTime<Utc>, rate: f64) -> bool {
        let due = match self.samples.back() {
            None => true,
            Some(last) => (now - last.timestamp).num_milliseconds() >= self.interval_ms,
        };
        if !due {
            return false;
        }

        self.samples.push_back(HistorySample {
            timestamp: now,
            rate,
        });
        if self.samples.len() > self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                tracing::trace!(timestamp = %evicted.timestamp, "evicted oldest history sample");
            }
        }
        true
    }

    /// Mean rate of all samples taken within the last `seconds` of `now`.
    pub fn windowed_average(&self, now: DateTime<Utc>, seconds: u64) -> f64 {
        // A window reaching past the representable range covers everything.
        let cutoff = i64::try_from(seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|span| now.checked_sub_signed(span));
        let (sum, count) = self
            .samples
            .iter()
            .filter(|sample| cutoff.map_or(true, |cutoff| sample.timestamp >= cutoff))
            .fold((0.0, 0usize), |(sum, count), sample| (sum + sample.rate, count + 1));

        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Copy of the samples, oldest first.
    pub fn snapshot(&self) -> Vec<HistorySample> {
        self.samples.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<&HistorySample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    #[test]
    fn test_samples_respect_interval() {
        let mut history = HistoryBuffer::new(&EngineConfig::default());
        let start = epoch();

        assert!(history.maybe_sample(start, 10.0));
        assert!(!history.maybe_sample(start + Duration::milliseconds(4999), 20.0));
        assert!(history.maybe_sample(start + Duration::seconds(5), 30.0));
        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().map(|s| s.rate), Some(30.0));
    }

    #[test]
    fn test_bounded_and_fifo() {
        let mut history = HistoryBuffer::new(&EngineConfig::default());
        let start = epoch();

        // 20 minutes of 200 ms polling.
        for tick in 0..(20 * 60 * 5) {
            history.maybe_sample(start + Duration::milliseconds(tick * 200), tick as f64);
            assert!(history.len() <= 120);
        }

        let samples = history.snapshot();
        assert_eq!(samples.len(), 120);
        assert!(samples.windows(2).all(|pair| pair[0].timestamp < pair[1].timestamp));
        // Oldest retained sample is ten minutes before the newest.
        let span = samples[119].timestamp - samples[0].timestamp;
        assert_eq!(span, Duration::seconds(119 * 5));
    }

    #[test]
    fn test_clock_going_backwards_does_not_sample() {
        let mut history = HistoryBuffer::new(&EngineConfig::default());
        let start = epoch() + Duration::hours(1);

        history.maybe_sample(start, 1.0);
        assert!(!history.maybe_sample(start - Duration::minutes(5), 2.0));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_windowed_average() {
        let mut history = HistoryBuffer::new(&EngineConfig::default());
        let start = epoch();
        for i in 0..12 {
            history.maybe_sample(start + Duration::seconds(i * 5), (i * 10) as f64);
        }
        let now = start + Duration::seconds(55);

        // Samples at 40, 45, 50, 55 s -> rates 80, 90, 100, 110.
        assert!((history.windowed_average(now, 15) - 95.0).abs() < 1e-9);
        // Everything.
        assert!((history.windowed_average(now, 3600) - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_windowed_average_empty() {
        let history = HistoryBuffer::new(&EngineConfig::default());
        assert_eq!(history.windowed_average(epoch(), 60), 0.0);

        let mut history = HistoryBuffer::new(&EngineConfig::default());
        history.maybe_sample(epoch(), 42.0);
        assert_eq!(
            history.windowed_average(epoch() + Duration::minutes(10), 60),
            0.0
        );
    }
}
