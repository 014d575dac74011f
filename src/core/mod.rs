//! Core functionality for the APM meter.
//!
//! This module contains:
//! - The rolling per-second window and raw rate estimate
//! - Smoothing, display quantization and rate history
//! - Session statistics and milestones
//! - [`RateEngine`], which ties them together under one lock

pub mod clock;
pub mod engine;
pub mod history;
pub mod milestone;
pub mod quantizer;
pub mod session;
pub mod smoothing;
pub mod window;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineSnapshot, RateEngine, RateReading};
pub use history::{HistoryBuffer, HistorySample};
pub use milestone::{Milestone, MilestoneTracker};
pub use quantizer::{DisplayQuantizer, StepBand, StepTable};
pub use session::SessionStats;
pub use smoothing::{SmoothingFilter, SmoothingPhase};
pub use window::RollingWindow;
