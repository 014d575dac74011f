//! Exponential smoothing of the raw rate with inactivity decay.

use crate::config::EngineConfig;
use chrono::{DateTime, Utc};

/// Which branch the last [`SmoothingFilter::smooth`] call took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothingPhase {
    /// Filter was unseeded and took the raw rate as-is
    Seed,
    /// Regular EMA update while input is active
    Track,
    /// Short idle period, gentle decay
    MildDecay,
    /// Long idle period, strong decay
    StrongDecay,
}

/// EMA filter turning the raw rate into a stable target.
///
/// A smoothed rate of exactly zero counts as unseeded: the next call takes
/// the raw rate directly instead of blending towards it.
#[derive(Debug, Clone)]
pub struct SmoothingFilter {
    alpha: f64,
    mild_after_secs: f64,
    mild_factor: f64,
    strong_after_secs: f64,
    strong_factor: f64,
    smoothed_rate: f64,
    target_rate: f64,
    last_event: Option<DateTime<Utc>>,
    last_phase: Option<SmoothingPhase>,
}

impl SmoothingFilter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            alpha: config.ema_alpha,
            mild_after_secs: config.mild_decay_after.as_secs_f64(),
            mild_factor: config.mild_decay_factor,
            strong_after_secs: config.strong_decay_after.as_secs_f64(),
            strong_factor: config.strong_decay_factor,
            smoothed_rate: 0.0,
            target_rate: 0.0,
            last_event: None,
            last_phase: None,
        }
    }

    /// Note that an input event happened at `at`.
    pub fn mark_event(&mut self, at: DateTime<Utc>) {
        self.last_event = Some(at);
    }

    /// Fold `raw_rate` into the filter and return the new target rate.
    pub fn smooth(&mut self, raw_rate: f64, now: DateTime<Utc>) -> f64 {
        let raw_rate = raw_rate.max(0.0);

        let phase = if !self.is_seeded() {
            self.smoothed_rate = raw_rate;
            if raw_rate > 0.0 {
                tracing::debug!(raw_rate, "seeded smoothing filter");
            }
            SmoothingPhase::Seed
        } else {
            let idle = self.idle_secs(now);
            if idle > self.strong_after_secs {
                self.smoothed_rate = (self.smoothed_rate * self.strong_factor).max(0.0);
                SmoothingPhase::StrongDecay
            } else if idle > self.mild_after_secs {
                self.smoothed_rate = (self.smoothed_rate * self.mild_factor).max(0.0);
                SmoothingPhase::MildDecay
            } else {
                self.smoothed_rate =
                    self.alpha * raw_rate + (1.0 - self.alpha) * self.smoothed_rate;
                SmoothingPhase::Track
            }
        };

        self.target_rate = self.smoothed_rate;
        self.last_phase = Some(phase);
        self.target_rate
    }

    /// Seconds since the last event; infinite if none was ever seen.
    fn idle_secs(&self, now: DateTime<Utc>) -> f64 {
        match self.last_event {
            Some(at) => (now - at).num_milliseconds() as f64 / 1000.0,
            None => f64::INFINITY,
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.smoothed_rate != 0.0
    }

    pub fn smoothed_rate(&self) -> f64 {
        self.smoothed_rate
    }

    pub fn target_rate(&self) -> f64 {
        self.target_rate
    }

    pub fn last_event(&self) -> Option<DateTime<Utc>> {
        self.last_event
    }

    pub fn last_phase(&self) -> Option<SmoothingPhase> {
        self.last_phase
    }

    pub fn reset(&mut self) {
        self.smoothed_rate = 0.0;
        self.target_rate = 0.0;
        self.last_event = None;
        self.last_phase = None;
    }
}
