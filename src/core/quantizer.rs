//! Step-quantized, rate-limited display value.
//!
//! The displayed rate walks towards the smoothed target one step at a time.
//! Step size grows with the displayed value, and each step must wait out a
//! delay that is shorter for rises than for falls and shorter for large gaps
//! than for small ones.

use crate::config::EngineConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Step size used while the displayed value is below `below`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepBand {
    pub below: u32,
    pub step: u32,
}

/// Piecewise step size as a function of the displayed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTable {
    /// Bands in ascending `below` order; the first match wins
    pub bands: Vec<StepBand>,
    /// Step size above the last band
    pub fallback: u32,
}

impl Default for StepTable {
    fn default() -> Self {
        Self {
            bands: vec![
                StepBand { below: 50, step: 1 },
                StepBand { below: 100, step: 1 },
                StepBand { below: 200, step: 2 },
                StepBand { below: 300, step: 3 },
                StepBand { below: 400, step: 4 },
            ],
            fallback: 5,
        }
    }
}

impl StepTable {
    /// Step size for the given displayed value. Never zero.
    pub fn step_for(&self, displayed: u32) -> u32 {
        self.bands
            .iter()
            .find(|band| displayed < band.below)
            .map_or(self.fallback, |band| band.step)
            .max(1)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.fallback == 0 || self.bands.iter().any(|band| band.step == 0) {
            return Err("step sizes must be at least 1".to_string());
        }
        if self.bands.windows(2).any(|pair| pair[0].below >= pair[1].below) {
            return Err("step bands must be sorted by strictly increasing bound".to_string());
        }
        Ok(())
    }
}

/// Delays between consecutive display steps.
#[derive(Debug, Clone, Copy)]
struct StepDelays {
    rise_large: Duration,
    fall_large: Duration,
    rise_small: Duration,
    fall_small: Duration,
}

/// Turns a continuous target rate into a flicker-free integer.
#[derive(Debug, Clone)]
pub struct DisplayQuantizer {
    table: StepTable,
    large_jump_steps: u32,
    delays: StepDelays,
    displayed: u32,
    last_step: Option<DateTime<Utc>>,
}

impl DisplayQuantizer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            table: config.step_table.clone(),
            large_jump_steps: config.large_jump_steps,
            delays: StepDelays {
                rise_large: config.rise_delay_large,
                fall_large: config.fall_delay_large,
                rise_small: config.rise_delay_small,
                fall_small: config.fall_delay_small,
            },
            displayed: 0,
            last_step: None,
        }
    }

    /// Grid point nearest to `target` for the current step size.
    pub fn quantized_target(&self, target: f64) -> u32 {
        let step = self.table.step_for(self.displayed);
        let units = (target.max(0.0) / step as f64).round_ties_even();
        // Float-to-int casts saturate, so absurd targets pin at u32::MAX.
        (units as u32).saturating_mul(step)
    }

    /// Move the displayed value at most one step towards `target`.
    pub fn quantize(&mut self, target: f64, now: DateTime<Utc>) -> u32 {
        let step = self.table.step_for(self.displayed);
        let goal = self.quantized_target(target);

        if goal == self.displayed {
            self.last_step = None;
            return self.displayed;
        }

        let rising = goal > self.displayed;
        let gap = goal.abs_diff(self.displayed);
        let large = gap > step.saturating_mul(self.large_jump_steps);
        let delay = match (large, rising) {
            (true, true) => self.delays.rise_large,
            (true, false) => self.delays.fall_large,
            (false, true) => self.delays.rise_small,
            (false, false) => self.delays.fall_small,
        };

        let eligible = match self.last_step {
            None => true,
            Some(at) => (now - at).num_milliseconds() >= delay.as_millis() as i64,
        };
        if !eligible {
            return self.displayed;
        }

        self.displayed = if rising {
            self.displayed.saturating_add(step).min(goal)
        } else {
            self.displayed.saturating_sub(step).max(goal)
        };
        self.last_step = Some(now);
        self.displayed
    }

    pub fn displayed(&self) -> u32 {
        self.displayed
    }

    pub fn last_step(&self) -> Option<DateTime<Utc>> {
        self.last_step
    }

    pub fn step_table(&self) -> &StepTable {
        &self.table
    }

    pub fn reset(&mut self) {
        self.displayed = 0;
        self.last_step = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn quantizer() -> DisplayQuantizer {
        DisplayQuantizer::new(&EngineConfig::default())
    }

    /// Tick every `tick_ms` for `ticks` ticks, returning every displayed value.
    fn run(q: &mut DisplayQuantizer, target: f64, start: DateTime<Utc>, tick_ms: i64, ticks: i64) -> Vec<u32> {
        (0..ticks)
            .map(|i| q.quantize(target, start + ChronoDuration::milliseconds(i * tick_ms)))
            .collect()
    }

    #[test]
    fn test_step_table_bands() {
        let table = StepTable::default();
        assert_eq!(table.step_for(0), 1);
        assert_eq!(table.step_for(99), 1);
        assert_eq!(table.step_for(100), 2);
        assert_eq!(table.step_for(250), 3);
        assert_eq!(table.step_for(399), 4);
        assert_eq!(table.step_for(400), 5);
        assert_eq!(table.step_for(10_000), 5);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_unsorted_table_is_rejected() {
        let table = StepTable {
            bands: vec![StepBand { below: 100, step: 1 }, StepBand { below: 50, step: 2 }],
            fallback: 5,
        };
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_first_step_is_immediate() {
        let mut q = quantizer();
        assert_eq!(q.quantize(40.0, epoch()), 1);
        assert_eq!(q.last_step(), Some(epoch()));
    }

    #[test]
    fn test_steps_wait_for_delay() {
        let mut q = quantizer();
        let start = epoch();
        assert_eq!(q.quantize(40.0, start), 1);
        // Large rise: 50 ms delay.
        assert_eq!(q.quantize(40.0, start + ChronoDuration::milliseconds(49)), 1);
        assert_eq!(q.quantize(40.0, start + ChronoDuration::milliseconds(50)), 2);
    }

    #[test]
    fn test_small_rise_uses_longer_delay() {
        let mut q = quantizer();
        let start = epoch();
        assert_eq!(q.quantize(2.0, start), 1);
        // Gap of one step is small: 80 ms delay.
        assert_eq!(q.quantize(2.0, start + ChronoDuration::milliseconds(60)), 1);
        assert_eq!(q.quantize(2.0, start + ChronoDuration::milliseconds(80)), 2);
        // Converged: the step timer is cleared.
        assert_eq!(q.quantize(2.0, start + ChronoDuration::milliseconds(81)), 2);
        assert_eq!(q.last_step(), None);
    }

    #[test]
    fn test_converges_without_overshoot() {
        let mut q = quantizer();
        let values = run(&mut q, 120.0, epoch(), 50, 400);

        assert!(values.windows(2).all(|pair| pair[1] >= pair[0]));
        assert!(values.iter().all(|&v| v <= 120));
        assert_eq!(q.displayed(), 120);
    }

    #[test]
    fn test_converges_to_rounded_grid_point() {
        let mut q = quantizer();
        // Step size 3 above 200: 250.6 / 3 = 83.53 -> 84 * 3 = 252.
        let values = run(&mut q, 250.6, epoch(), 50, 1000);
        assert_eq!(q.displayed(), 252);
        assert!(values.iter().all(|&v| v <= 252));
    }

    #[test]
    fn test_at_most_one_step_per_call() {
        let mut q = quantizer();
        let values = run(&mut q, 500.0, epoch(), 1000, 200);
        let mut previous = 0;
        for v in values {
            assert!(v - previous <= q.step_table().step_for(previous));
            previous = v;
        }
    }

    #[test]
    fn test_falls_slower_than_rises() {
        let mut q = quantizer();
        let start = epoch();
        run(&mut q, 60.0, start, 50, 200);
        assert_eq!(q.displayed(), 60);

        let fall_start = start + ChronoDuration::seconds(60);
        assert_eq!(q.quantize(0.0, fall_start), 59);
        // Large fall: 100 ms delay.
        assert_eq!(q.quantize(0.0, fall_start + ChronoDuration::milliseconds(99)), 59);
        assert_eq!(q.quantize(0.0, fall_start + ChronoDuration::milliseconds(100)), 58);

        let values = run(&mut q, 0.0, fall_start + ChronoDuration::seconds(1), 100, 200);
        assert_eq!(values.last().copied(), Some(0));
    }

    #[test]
    fn test_fall_does_not_cross_target() {
        let mut q = quantizer();
        run(&mut q, 150.0, epoch(), 50, 400);
        assert_eq!(q.displayed(), 150);

        let values = run(&mut q, 130.0, epoch() + ChronoDuration::seconds(60), 200, 100);
        assert!(values.iter().all(|&v| v >= 130));
        assert_eq!(q.displayed(), 130);
    }

    #[test]
    fn test_reset() {
        let mut q = quantizer();
        q.quantize(10.0, epoch());
        q.reset();
        assert_eq!(q.displayed(), 0);
        assert_eq!(q.last_step(), None);
    }
}
