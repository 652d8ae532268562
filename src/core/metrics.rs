//! Shipping metrics for observability
//!
//! Provides counters for monitoring the pipeline: records dropped at the
//! buffer, records lost to failed sends, token retries and remote
//! provisioning calls.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one appender's shipping pipeline
///
/// # Example
///
/// ```
/// use cloudwatch_appender::ShipperMetrics;
///
/// let metrics = ShipperMetrics::new();
///
/// metrics.record_accepted();
/// metrics.record_shipped(1);
///
/// assert_eq!(metrics.accepted_count(), 1);
/// assert_eq!(metrics.shipped_count(), 1);
/// ```
#[derive(Debug)]
pub struct ShipperMetrics {
    /// Records accepted into the buffer
    accepted: AtomicU64,

    /// Records rejected because the buffer was full
    dropped: AtomicU64,

    /// Records delivered to the remote service
    shipped: AtomicU64,

    /// Records discarded because their batch failed to send
    lost: AtomicU64,

    /// Successful put calls
    batches_sent: AtomicU64,

    /// Batches that failed after all recovery
    send_failures: AtomicU64,

    /// Sends retried after a sequence token mismatch
    token_retries: AtomicU64,

    groups_created: AtomicU64,
    streams_created: AtomicU64,
}

impl ShipperMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            accepted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            shipped: AtomicU64::new(0),
            lost: AtomicU64::new(0),
            batches_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            token_retries: AtomicU64::new(0),
            groups_created: AtomicU64::new(0),
            streams_created: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn accepted_count(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn shipped_count(&self) -> u64 {
        self.shipped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn lost_count(&self) -> u64 {
        self.lost.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn batches_sent(&self) -> u64 {
        self.batches_sent.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn token_retries(&self) -> u64 {
        self.token_retries.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn groups_created(&self) -> u64 {
        self.groups_created.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn streams_created(&self) -> u64 {
        self.streams_created.load(Ordering::Relaxed)
    }

    /// Record an accepted record, returning the previous count
    #[inline]
    pub fn record_accepted(&self) -> u64 {
        self.accepted.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a record dropped on overflow, returning the previous count
    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a successfully sent batch of `records` entries
    #[inline]
    pub fn record_shipped(&self, records: usize) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.shipped.fetch_add(records as u64, Ordering::Relaxed);
    }

    /// Record a failed batch of `records` entries
    #[inline]
    pub fn record_send_failure(&self, records: usize) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
        self.lost.fetch_add(records as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_token_retry(&self) -> u64 {
        self.token_retries.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_group_created(&self) -> u64 {
        self.groups_created.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_stream_created(&self) -> u64 {
        self.streams_created.fetch_add(1, Ordering::Relaxed)
    }

    /// Share of offered records rejected by the buffer, as a percentage
    ///
    /// Returns 0.0 if nothing has been offered.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped_count() as f64;
        let offered = self.accepted_count() as f64 + dropped;
        if offered == 0.0 {
            0.0
        } else {
            (dropped / offered) * 100.0
        }
    }

    /// Share of records that left the buffer but never reached the service
    pub fn loss_rate(&self) -> f64 {
        let lost = self.lost_count() as f64;
        let attempted = self.shipped_count() as f64 + lost;
        if attempted == 0.0 {
            0.0
        } else {
            (lost / attempted) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        for counter in [
            &self.accepted,
            &self.dropped,
            &self.shipped,
            &self.lost,
            &self.batches_sent,
            &self.send_failures,
            &self.token_retries,
            &self.groups_created,
            &self.streams_created,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for ShipperMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ShipperMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            accepted: AtomicU64::new(self.accepted_count()),
            dropped: AtomicU64::new(self.dropped_count()),
            shipped: AtomicU64::new(self.shipped_count()),
            lost: AtomicU64::new(self.lost_count()),
            batches_sent: AtomicU64::new(self.batches_sent()),
            send_failures: AtomicU64::new(self.send_failures()),
            token_retries: AtomicU64::new(self.token_retries()),
            groups_created: AtomicU64::new(self.groups_created()),
            streams_created: AtomicU64::new(self.streams_created()),
        }
    }
}
