//! APM Meter - live actions-per-minute estimation for keyboard and mouse input.
//!
//! The crate turns a bursty stream of input events into a stable rate that is
//! pleasant to watch, plus session statistics for reporting.
//!
//! # Pipeline
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │  Collector  │──▶│   Rolling   │──▶│  Smoothing  │──▶│  Quantizer  │──▶ display
//! │  (channel)  │   │ window (60s)│   │ (EMA+decay) │   │   (steps)   │
//! └─────────────┘   └─────────────┘   └─────────────┘   └─────────────┘
//!                                            │
//!                                            ▼
//!                                  ┌───────────────────┐
//!                                  │ History / Session │──▶ export
//!                                  └───────────────────┘
//! ```
//!
//! Nothing runs in the background: each call to
//! [`RateEngine::current_display_rate`] rolls the window forward and runs the
//! whole pipeline once. Callers poll it on a fixed cadence (200 ms by default).
//!
//! # Example
//!
//! ```
//! use apm_meter::{EngineConfig, InputCategory, ManualClock, RateEngine};
//! use std::sync::Arc;
//!
//! let clock = Arc::new(ManualClock::at_epoch());
//! let engine = RateEngine::with_clock(EngineConfig::default(), Arc::clone(&clock));
//!
//! for _ in 0..10 {
//!     engine.record_event(InputCategory::Keyboard);
//! }
//! clock.advance_secs(1);
//!
//! let reading = engine.poll();
//! assert_eq!(reading.raw_rate, 600.0);
//! assert_eq!(engine.total_events(), 10);
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod export;

// Re-export key types at crate root for convenience
pub use collector::{CollectorError, InputCategory, InputCollector, InputSender, StatCategory};
pub use config::{Config, ConfigError, EngineConfig};
pub use core::{
    Clock, EngineSnapshot, HistorySample, ManualClock, Milestone, MilestoneTracker, RateEngine,
    RateReading, SystemClock,
};
pub use export::{ExportError, ExportFormat, SessionReport};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
