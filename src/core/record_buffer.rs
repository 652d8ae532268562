//! Bounded FIFO buffer between producer threads and the shipping worker
//!
//! Offers never block: when the buffer is full the record is dropped,
//! counted, and optionally reported through an overflow callback.

use super::diagnostics;
use super::log_entry::LogEntry;
use super::metrics::ShipperMetrics;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::Arc;

/// Callback type for overflow notifications
///
/// Called when records are dropped because the buffer is full.
/// The parameter is the total count of dropped records so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Emit an overflow alert on the first drop and every this many drops after
const ALERT_EVERY: u64 = 1000;

pub struct RecordBuffer {
    sender: Sender<LogEntry>,
    receiver: Receiver<LogEntry>,
    capacity: usize,
    metrics: Arc<ShipperMetrics>,
    on_overflow: Option<OverflowCallback>,
}

impl RecordBuffer {
    /// Create a buffer holding at most `capacity` records
    ///
    /// `capacity` must be non-zero; configuration validation enforces this.
    pub fn new(capacity: usize, metrics: Arc<ShipperMetrics>) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
            metrics,
            on_overflow: None,
        }
    }

    #[must_use]
    pub fn with_overflow_callback(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    /// Enqueue a record without blocking
    ///
    /// Returns `false` when the buffer is full and the record was dropped.
    pub fn offer(&self, entry: LogEntry) -> bool {
        match self.sender.try_send(entry) {
            Ok(()) => {
                self.metrics.record_accepted();
                true
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.handle_overflow();
                false
            }
        }
    }

    fn handle_overflow(&self) {
        let dropped = self.metrics.record_dropped() + 1;

        if dropped == 1 || dropped % ALERT_EVERY == 0 {
            diagnostics::debug(format!(
                "Record buffer full ({} records), {} records dropped so far",
                self.capacity, dropped
            ));

            if let Some(ref callback) = self.on_overflow {
                callback(dropped);
            }
        }
    }

    /// Remove up to `max` records in FIFO order without blocking
    pub fn drain(&self, max: usize) -> Vec<LogEntry> {
        let mut batch = Vec::with_capacity(max.min(self.receiver.len()));
        while batch.len() < max {
            match self.receiver.try_recv() {
                Ok(entry) => batch.push(entry),
                Err(_) => break,
            }
        }
        batch
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn metrics(&self) -> &ShipperMetrics {
        &self.metrics
    }
}
