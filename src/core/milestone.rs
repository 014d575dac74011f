//! Rate milestones (100, 200, ... 500 APM) and upward-crossing detection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tier a displayed rate falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Milestone {
    None,
    Hundred,
    TwoHundred,
    ThreeHundred,
    FourHundred,
    FiveHundred,
}

impl Milestone {
    pub fn for_rate(rate: u32) -> Self {
        match rate {
            500.. => Milestone::FiveHundred,
            400..=499 => Milestone::FourHundred,
            300..=399 => Milestone::ThreeHundred,
            200..=299 => Milestone::TwoHundred,
            100..=199 => Milestone::Hundred,
            _ => Milestone::None,
        }
    }

    /// Lower bound of the tier in APM.
    pub fn threshold(self) -> u32 {
        match self {
            Milestone::None => 0,
            Milestone::Hundred => 100,
            Milestone::TwoHundred => 200,
            Milestone::ThreeHundred => 300,
            Milestone::FourHundred => 400,
            Milestone::FiveHundred => 500,
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} APM", self.threshold())
    }
}

/// Reports when the displayed rate climbs into a higher tier.
#[derive(Debug, Clone, Default)]
pub struct MilestoneTracker {
    last: Option<Milestone>,
}

impl MilestoneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the latest displayed rate.
    ///
    /// Returns the new tier when it is strictly above the previous one. The
    /// very first observation only establishes the baseline.
    pub fn observe(&mut self, rate: u32) -> Option<Milestone> {
        let current = Milestone::for_rate(rate);
        let crossed = match self.last {
            Some(previous) if current > previous => Some(current),
            _ => None,
        };
        self.last = Some(current);

        if let Some(milestone) = crossed {
            tracing::debug!(%milestone, rate, "milestone reached");
        }
        crossed
    }

    pub fn current(&self) -> Option<Milestone> {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers() {
        assert_eq!(Milestone::for_rate(0), Milestone::None);
        assert_eq!(Milestone::for_rate(99), Milestone::None);
        assert_eq!(Milestone::for_rate(100), Milestone::Hundred);
        assert_eq!(Milestone::for_rate(399), Milestone::ThreeHundred);
        assert_eq!(Milestone::for_rate(4000), Milestone::FiveHundred);
        assert_eq!(Milestone::FourHundred.to_string(), "400 APM");
    }

    #[test]
    fn test_first_observation_is_baseline() {
        let mut tracker = MilestoneTracker::new();
        assert_eq!(tracker.observe(250), None);
        assert_eq!(tracker.current(), Some(Milestone::TwoHundred));
    }

    #[test]
    fn test_only_upward_crossings_fire() {
        let mut tracker = MilestoneTracker::new();
        tracker.observe(0);

        assert_eq!(tracker.observe(100), Some(Milestone::Hundred));
        assert_eq!(tracker.observe(150), None);
        assert_eq!(tracker.observe(90), None);
        assert_eq!(tracker.observe(120), Some(Milestone::Hundred));
        assert_eq!(tracker.observe(520), Some(Milestone::FiveHundred));
    }

    #[test]
    fn test_reset_forgets_baseline() {
        let mut tracker = MilestoneTracker::new();
        tracker.observe(0);
        tracker.reset();
        assert_eq!(tracker.observe(300), None);
    }
}
