//! The rate engine: one lock around the whole rate pipeline.
//!
//! Event delivery and polling both go through [`RateEngine`]. Every mutating
//! operation takes the same mutex over the combined state, so a poll always
//! sees the window, filter, quantizer, history and session counters in
//! agreement with each other.
//!
//! ```text
//! record_event ─▶ RollingWindow ──┐
//!                                 ▼
//! poll ─▶ rollover ─▶ raw rate ─▶ SmoothingFilter ─▶ DisplayQuantizer ─▶ displayed
//!                                     │
//!                                     └─▶ HistoryBuffer / SessionStats
//! ```

use crate::collector::types::InputCategory;
use crate::config::EngineConfig;
use crate::core::clock::{Clock, SystemClock};
use crate::core::history::{HistoryBuffer, HistorySample};
use crate::core::quantizer::DisplayQuantizer;
use crate::core::session::SessionStats;
use crate::core::smoothing::SmoothingFilter;
use crate::core::window::RollingWindow;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result of one pass through the rate pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateReading {
    pub at: DateTime<Utc>,
    /// Un-smoothed rate from the rolling window
    pub raw_rate: f64,
    /// EMA-smoothed rate (the quantizer's target)
    pub smoothed_rate: f64,
    /// Step-quantized value for display
    pub displayed: u32,
    /// Session peak after this reading
    pub peak: u32,
}

/// Consistent copy of every statistic, taken under a single lock.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub taken_at: DateTime<Utc>,
    pub session_start: Option<DateTime<Utc>>,
    pub session_duration: Duration,
    pub total_events: u64,
    pub keyboard_events: u64,
    pub mouse_events: u64,
    pub displayed_rate: u32,
    pub smoothed_rate: f64,
    pub peak_rate: u32,
    pub min_rate: u32,
    pub average_rate: f64,
    pub rate_1min: f64,
    pub rate_5min: f64,
    pub history: Vec<HistorySample>,
}

struct EngineState {
    window: RollingWindow,
    smoothing: SmoothingFilter,
    quantizer: DisplayQuantizer,
    history: HistoryBuffer,
    session: SessionStats,
}

impl EngineState {
    fn new(config: &EngineConfig, now: DateTime<Utc>) -> Self {
        Self {
            window: RollingWindow::new(config.window_secs, now),
            smoothing: SmoothingFilter::new(config),
            quantizer: DisplayQuantizer::new(config),
            history: HistoryBuffer::new(config),
            session: SessionStats::new(),
        }
    }
}

/// Thread-safe actions-per-minute estimator.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct RateEngine<C: Clock = SystemClock> {
    clock: C,
    config: EngineConfig,
    state: Mutex<EngineState>,
    /// Mirror of the session peak for the lock-free pre-check in [`RateEngine::offer_peak`].
    /// Only written while the state lock is held.
    peak_hint: AtomicU32,
}

impl RateEngine<SystemClock> {
    /// Create an engine reading wall-clock time.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for RateEngine<SystemClock> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<C: Clock> RateEngine<C> {
    /// Create an engine driven by `clock`.
    pub fn with_clock(config: EngineConfig, clock: C) -> Self {
        let state = EngineState::new(&config, clock.now());
        Self {
            clock,
            config,
            state: Mutex::new(state),
            peak_hint: AtomicU32::new(0),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // Every critical section leaves the state consistent, so a panic in one
    // holder does not make the data unusable.
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one input action.
    pub fn record_event(&self, category: InputCategory) {
        let mut state = self.lock();
        let now = self.clock.now();

        state.window.record(now);
        state.smoothing.mark_event(now);
        state.session.record(category, now);
    }

    /// Run the full pipeline and return every intermediate value.
    ///
    /// Rolls the window, derives the raw rate, smooths it, steps the display
    /// value, samples history and updates the session extremes.
    pub fn poll(&self) -> RateReading {
        let mut state = self.lock();
        let now = self.clock.now();

        state.window.advance(now);
        let raw_rate = state.window.raw_rate();
        let smoothed_rate = state.smoothing.smooth(raw_rate, now);

        state.history.maybe_sample(now, smoothed_rate);
        state.session.offer_min(smoothed_rate);

        let displayed = state.quantizer.quantize(smoothed_rate, now);
        if state.session.offer_peak(displayed) {
            self.peak_hint.store(displayed, Ordering::Release);
        }

        RateReading {
            at: now,
            raw_rate,
            smoothed_rate,
            displayed,
            peak: state.session.peak_rate(),
        }
    }

    /// Run the pipeline and return the value to display.
    pub fn current_display_rate(&self) -> u32 {
        self.poll().displayed
    }

    /// Offer an externally observed display value as a peak candidate.
    ///
    /// Values at or below the last published peak return without locking;
    /// anything else is re-checked under the lock before it is stored.
    pub fn offer_peak(&self, displayed: u32) {
        if displayed <= self.peak_hint.load(Ordering::Acquire) {
            return;
        }

        let mut state = self.lock();
        if state.session.offer_peak(displayed) {
            self.peak_hint.store(displayed, Ordering::Release);
        }
    }

    /// Wipe every component back to its freshly constructed state.
    pub fn reset(&self) {
        let mut state = self.lock();
        let now = self.clock.now();

        state.window.reset(now);
        state.smoothing.reset();
        state.quantizer.reset();
        state.history.clear();
        state.session.reset();
        self.peak_hint.store(0, Ordering::Release);

        tracing::debug!("rate engine reset");
    }

    pub fn peak_rate(&self) -> u32 {
        self.lock().session.peak_rate()
    }

    pub fn min_rate(&self) -> u32 {
        self.lock().session.min_rate()
    }

    pub fn total_events(&self) -> u64 {
        self.lock().session.total_events()
    }

    pub fn keyboard_events(&self) -> u64 {
        self.lock().session.keyboard_events()
    }

    pub fn mouse_events(&self) -> u64 {
        self.lock().session.mouse_events()
    }

    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        self.lock().session.session_start()
    }

    pub fn session_duration(&self) -> Duration {
        let state = self.lock();
        state.session.duration(self.clock.now())
    }

    /// Events per minute across the whole session.
    pub fn average_rate(&self) -> f64 {
        let state = self.lock();
        state
            .session
            .average_rate(self.clock.now(), self.config.average_floor)
    }

    /// Mean of the history samples from the last `seconds`.
    pub fn windowed_average(&self, seconds: u64) -> f64 {
        let state = self.lock();
        state.history.windowed_average(self.clock.now(), seconds)
    }

    pub fn rate_1min(&self) -> f64 {
        self.windowed_average(60)
    }

    pub fn rate_5min(&self) -> f64 {
        self.windowed_average(300)
    }

    /// Copy of the rate history, oldest first.
    pub fn history_snapshot(&self) -> Vec<HistorySample> {
        self.lock().history.snapshot()
    }

    /// Read every statistic at once without running the pipeline.
    pub fn snapshot(&self) -> EngineSnapshot {
        let state = self.lock();
        let now = self.clock.now();

        EngineSnapshot {
            taken_at: now,
            session_start: state.session.session_start(),
            session_duration: state.session.duration(now),
            total_events: state.session.total_events(),
            keyboard_events: state.session.keyboard_events(),
            mouse_events: state.session.mouse_events(),
            displayed_rate: state.quantizer.displayed(),
            smoothed_rate: state.smoothing.smoothed_rate(),
            peak_rate: state.session.peak_rate(),
            min_rate: state.session.min_rate(),
            average_rate: state
                .session
                .average_rate(now, self.config.average_floor),
            rate_1min: state.history.windowed_average(now, 60),
            rate_5min: state.history.windowed_average(now, 300),
            history: state.history.snapshot(),
        }
    }
}
