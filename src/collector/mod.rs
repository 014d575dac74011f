//! Input collection for the APM meter.
//!
//! The platform capture hooks live outside this crate. They deliver one
//! [`InputCategory`] per physical action through an [`InputSender`].

pub mod channel;
pub mod types;

// Re-export commonly used types
pub use channel::{CollectorError, InputCollector, InputSender};
pub use types::{InputCategory, InputEvent, StatCategory, UnknownCategory};
