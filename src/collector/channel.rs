//! Channel between the capture layer and the rate engine.
//!
//! Capture hooks run on their own thread or callback and must never block,
//! so they push events into a bounded channel through an [`InputSender`].
//! The polling loop drains the channel into the engine.

use crate::collector::types::{InputCategory, InputEvent};
use crate::core::clock::Clock;
use crate::core::engine::RateEngine;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default number of events buffered before the capture side starts dropping.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Errors that can occur during event collection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectorError {
    #[error("Collector is already running")]
    AlreadyRunning,
    #[error("Collector is not running")]
    NotRunning,
    #[error("All input senders have been dropped")]
    Disconnected,
}

/// Cloneable handle given to the capture layer.
#[derive(Debug, Clone)]
pub struct InputSender {
    sender: Sender<InputEvent>,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl InputSender {
    /// Enqueue one event without blocking.
    ///
    /// Returns `false` if the collector is stopped, full, or gone.
    pub fn send(&self, category: InputCategory) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }

        match self.sender.try_send(InputEvent::new(category)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Collects input events from any number of capture sources.
pub struct InputCollector {
    sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl InputCollector {
    /// Create a stopped collector with the default buffer size.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        // Bounded so a stalled poller can't grow memory without limit
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start accepting events.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        tracing::debug!("input collector started");
        Ok(())
    }

    /// Stop accepting events. Already queued events stay drainable.
    pub fn stop(&mut self) -> Result<(), CollectorError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(CollectorError::NotRunning);
        }
        tracing::debug!("input collector stopped");
        Ok(())
    }

    /// Check if the collector is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Handle for a capture source.
    pub fn sender(&self) -> InputSender {
        InputSender {
            sender: self.sender.clone(),
            running: Arc::clone(&self.running),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Number of events rejected because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<InputEvent> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<InputEvent>, CollectorError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(CollectorError::Disconnected),
        }
    }

    /// Feed every queued event into `engine`, returning how many were moved.
    pub fn drain_into<C: Clock>(&self, engine: &RateEngine<C>) -> usize {
        let mut count = 0;
        while let Ok(event) = self.receiver.try_recv() {
            engine.record_event(event.category);
            count += 1;
        }
        count
    }
}

impl Default for InputCollector {
    fn default() -> Self {
        Self::new()
    }
}
