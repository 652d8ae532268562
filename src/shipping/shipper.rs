//! Batch shipping with sequence-token recovery

use super::provision::{GroupEnsurer, StreamEnsurer};
use super::stream_namer::StreamNamer;
use crate::core::{diagnostics, Layout, LogEntry, RecordBuffer, ShipperMetrics};
use crate::service::{InputLogEvent, LogService, PutLogEventsRequest, ServiceError, ServiceResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// How many records one batch may take relative to the configured batch size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchBound {
    /// At most `max_batch` records per send
    #[default]
    Strict,
    /// Up to `max_batch + 1` records per send, as older releases of this
    /// appender did
    Inclusive,
}

impl BatchBound {
    pub fn limit(self, max_batch: usize) -> usize {
        match self {
            BatchBound::Strict => max_batch,
            BatchBound::Inclusive => max_batch.saturating_add(1),
        }
    }
}

#[derive(Debug, Default)]
struct ShipperState {
    sequence_token: Option<String>,
    /// Last stream name that was successfully ensured
    stream_name: Option<String>,
    group_ready: bool,
}

/// Drains the record buffer and sends batches to one log group
///
/// Draining and sending happen under a single lock, so batches leave in
/// buffer order no matter which thread ships them.
pub struct Shipper {
    group_name: String,
    namer: StreamNamer,
    service: Arc<dyn LogService>,
    layout: Arc<dyn Layout>,
    groups: GroupEnsurer,
    streams: StreamEnsurer,
    metrics: Arc<ShipperMetrics>,
    bound: BatchBound,
    state: Mutex<ShipperState>,
}

impl Shipper {
    pub fn new(
        group_name: impl Into<String>,
        namer: StreamNamer,
        service: Arc<dyn LogService>,
        layout: Arc<dyn Layout>,
        metrics: Arc<ShipperMetrics>,
    ) -> Self {
        Self {
            group_name: group_name.into(),
            namer,
            groups: GroupEnsurer::new(Arc::clone(&service), Arc::clone(&metrics)),
            streams: StreamEnsurer::new(Arc::clone(&service), Arc::clone(&metrics)),
            service,
            layout,
            metrics,
            bound: BatchBound::default(),
            state: Mutex::new(ShipperState::default()),
        }
    }

    #[must_use]
    pub fn with_batch_bound(mut self, bound: BatchBound) -> Self {
        self.bound = bound;
        self
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn batch_bound(&self) -> BatchBound {
        self.bound
    }

    /// Token that will accompany the next put
    pub fn sequence_token(&self) -> Option<String> {
        self.state.lock().sequence_token.clone()
    }

    /// Stream most recently verified to exist
    pub fn current_stream(&self) -> Option<String> {
        self.state.lock().stream_name.clone()
    }

    pub fn metrics(&self) -> &ShipperMetrics {
        &self.metrics
    }

    /// Ensure the group and the current stream up front
    ///
    /// Failures are left for the first batch to retry.
    pub fn prepare(&self) -> ServiceResult<String> {
        let mut state = self.state.lock();
        self.resolve_stream(&mut state)
    }

    /// Ship one batch; returns how many records were taken from the buffer
    ///
    /// Never fails: a batch that cannot be delivered is counted as lost and
    /// reported on the diagnostic channel.
    pub fn drain_and_send(&self, buffer: &RecordBuffer, max_batch: usize) -> usize {
        let mut state = self.state.lock();

        let batch = buffer.drain(self.bound.limit(max_batch));
        if batch.is_empty() {
            return 0;
        }

        let count = batch.len();
        let events = self.to_events(batch);
        match self.ship(&mut state, events) {
            Ok(()) => self.metrics.record_shipped(count),
            Err(e) => {
                self.metrics.record_send_failure(count);
                diagnostics::debug_error(
                    format!(
                        "Dropping batch of {} records for log group '{}':",
                        count, self.group_name
                    ),
                    &e,
                );
            }
        }
        count
    }

    /// Ship batches until the buffer reports empty
    pub fn drain_to_empty(&self, buffer: &RecordBuffer, max_batch: usize) -> usize {
        let mut total = 0;
        while !buffer.is_empty() {
            let taken = self.drain_and_send(buffer, max_batch);
            if taken == 0 {
                break;
            }
            total += taken;
        }
        total
    }

    /// Run a shipping step, surviving a panic in the service or layout
    ///
    /// Returns `false` if the step panicked. Records it had already drained
    /// are lost.
    pub fn contained(&self, step: impl FnOnce()) -> bool {
        let panic = match catch_unwind(AssertUnwindSafe(step)) {
            Ok(()) => return true,
            Err(panic) => panic,
        };
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        diagnostics::debug(format!(
            "Shipping for log group '{}' panicked, batch lost: {}",
            self.group_name, message
        ));
        false
    }

    fn to_events(&self, batch: Vec<LogEntry>) -> Vec<InputLogEvent> {
        batch
            .into_iter()
            .map(|entry| InputLogEvent {
                timestamp: entry.timestamp_millis(),
                message: String::from_utf8_lossy(&self.layout.render(&entry)).into_owned(),
            })
            .collect()
    }

    fn resolve_stream(&self, state: &mut ShipperState) -> ServiceResult<String> {
        if !state.group_ready {
            self.groups.ensure_exists(&self.group_name)?;
            state.group_ready = true;
        }

        let name = self.namer.current_name();
        if state.stream_name.as_deref() != Some(name.as_str()) {
            if self.streams.ensure_exists(&self.group_name, &name)? {
                // A stream we just created has no upload history
                state.sequence_token = None;
            }
            state.stream_name = Some(name.clone());
        }
        Ok(name)
    }

    fn ship(&self, state: &mut ShipperState, log_events: Vec<InputLogEvent>) -> ServiceResult<()> {
        let log_stream_name = self.resolve_stream(state)?;
        let mut request = PutLogEventsRequest {
            log_group_name: self.group_name.clone(),
            log_stream_name,
            log_events,
            sequence_token: state.sequence_token.clone(),
        };

        let response = match self.service.put_log_events(&request) {
            Ok(response) => response,
            Err(ServiceError::InvalidSequenceToken {
                expected_sequence_token,
            }) => {
                self.metrics.record_token_retry();
                diagnostics::debug(format!(
                    "Sequence token for '{}/{}' was stale, retrying with {}",
                    request.log_group_name,
                    request.log_stream_name,
                    expected_sequence_token.as_deref().unwrap_or("none")
                ));
                request.sequence_token = expected_sequence_token;
                self.service.put_log_events(&request)?
            }
            Err(e) => return Err(e),
        };

        state.sequence_token = response.next_sequence_token;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FixedClock, LogLevel, PatternLayout};
    use crate::service::{InMemoryLogService, ServiceCalls};
    use chrono::{Duration, TimeZone, Utc};

    struct Fixture {
        service: Arc<InMemoryLogService>,
        clock: Arc<FixedClock>,
        buffer: RecordBuffer,
        shipper: Shipper,
    }

    fn fixture(service: InMemoryLogService) -> Fixture {
        let service = Arc::new(service);
        let clock = Arc::new(FixedClock::at_utc(
            Utc.with_ymd_and_hms(2017, 9, 14, 10, 0, 0).unwrap(),
        ));
        let metrics = Arc::new(ShipperMetrics::new());
        let shipper = Shipper::new(
            "app",
            StreamNamer::new(Some("web".to_string()), clock.clone()),
            service.clone(),
            Arc::new(PatternLayout::default()),
            Arc::clone(&metrics),
        );
        Fixture {
            service,
            clock,
            buffer: RecordBuffer::new(1024, metrics),
            shipper,
        }
    }

    fn fill(buffer: &RecordBuffer, count: usize) {
        for i in 0..count {
            assert!(buffer.offer(LogEntry::new(LogLevel::Info, format!("record {}", i))));
        }
    }

    #[test]
    fn test_batch_bound_limit() {
        assert_eq!(BatchBound::Strict.limit(128), 128);
        assert_eq!(BatchBound::Inclusive.limit(128), 129);
        assert_eq!(BatchBound::Inclusive.limit(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_empty_buffer_makes_no_calls() {
        let f = fixture(InMemoryLogService::new());
        assert_eq!(f.shipper.drain_and_send(&f.buffer, 10), 0);
        assert_eq!(f.service.calls(), ServiceCalls::default());
    }

    #[test]
    fn test_first_batch_provisions_and_sends() {
        let f = fixture(InMemoryLogService::new());
        fill(&f.buffer, 3);

        assert_eq!(f.shipper.drain_and_send(&f.buffer, 10), 3);

        assert!(f.service.has_group("app"));
        let events = f.service.events("app", "web/2017/09");
        let messages: Vec<_> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["record 0\n", "record 1\n", "record 2\n"]);
        assert_eq!(
            f.shipper.sequence_token(),
            f.service.sequence_token("app", "web/2017/09")
        );
        assert_eq!(f.shipper.metrics().shipped_count(), 3);
        assert_eq!(f.shipper.metrics().batches_sent(), 1);
    }

    #[test]
    fn test_strict_and_inclusive_batches() {
        let f = fixture(InMemoryLogService::new());
        fill(&f.buffer, 10);
        assert_eq!(f.shipper.drain_and_send(&f.buffer, 4), 4);

        let inclusive = fixture(InMemoryLogService::new());
        let shipper = inclusive.shipper.with_batch_bound(BatchBound::Inclusive);
        fill(&inclusive.buffer, 10);
        assert_eq!(shipper.drain_and_send(&inclusive.buffer, 4), 5);
    }

    #[test]
    fn test_stream_checked_once_per_period() {
        let f = fixture(InMemoryLogService::new());
        fill(&f.buffer, 2);
        f.shipper.drain_and_send(&f.buffer, 1);
        f.shipper.drain_and_send(&f.buffer, 1);

        let calls = f.service.calls();
        assert_eq!(calls.describe_log_groups, 1);
        assert_eq!(calls.describe_log_streams, 1);
        assert_eq!(calls.put_log_events, 2);

        f.clock.advance(Duration::days(30));
        fill(&f.buffer, 1);
        f.shipper.drain_and_send(&f.buffer, 1);

        let calls = f.service.calls();
        assert_eq!(calls.describe_log_groups, 1);
        assert_eq!(calls.describe_log_streams, 2);
        assert_eq!(f.service.stream_names("app"), ["web/2017/09", "web/2017/10"]);
        assert_eq!(f.service.events("app", "web/2017/10").len(), 1);
        assert_eq!(f.shipper.current_stream().as_deref(), Some("web/2017/10"));
        assert_eq!(f.shipper.metrics().token_retries(), 0);
    }

    #[test]
    fn test_token_mismatch_retried_once() {
        let f = fixture(InMemoryLogService::new().with_stream("app", "web/2017/09"));
        fill(&f.buffer, 1);
        f.shipper.drain_and_send(&f.buffer, 10);

        // Another writer appends to the same stream
        let expected = f.service.rotate_sequence_token("app", "web/2017/09");
        fill(&f.buffer, 1);
        f.shipper.drain_and_send(&f.buffer, 10);

        let puts = f.service.put_requests();
        assert_eq!(puts.len(), 3);
        assert_eq!(puts[2].sequence_token, expected);
        assert_eq!(
            f.shipper.sequence_token(),
            f.service.sequence_token("app", "web/2017/09")
        );
        assert_eq!(f.shipper.metrics().token_retries(), 1);
        assert_eq!(f.shipper.metrics().shipped_count(), 2);
    }

    #[test]
    fn test_second_mismatch_loses_batch() {
        let f = fixture(InMemoryLogService::new());
        f.service
            .fail_next_put(ServiceError::invalid_sequence_token(Some("1")));
        f.service
            .fail_next_put(ServiceError::invalid_sequence_token(Some("2")));
        fill(&f.buffer, 2);

        assert_eq!(f.shipper.drain_and_send(&f.buffer, 10), 2);
        assert_eq!(f.service.put_requests().len(), 2);
        assert_eq!(f.shipper.metrics().lost_count(), 2);
        assert_eq!(f.shipper.metrics().send_failures(), 1);
        assert!(f.buffer.is_empty());
    }

    #[test]
    fn test_other_failure_is_not_retried() {
        let f = fixture(InMemoryLogService::new());
        f.service.fail_next_put(ServiceError::transport("timeout"));
        fill(&f.buffer, 1);

        f.shipper.drain_and_send(&f.buffer, 10);
        assert_eq!(f.service.put_requests().len(), 1);
        assert_eq!(f.shipper.metrics().lost_count(), 1);

        // The pipeline keeps going
        fill(&f.buffer, 1);
        f.shipper.drain_and_send(&f.buffer, 10);
        assert_eq!(f.shipper.metrics().shipped_count(), 1);
    }

    #[test]
    fn test_drain_to_empty() {
        let f = fixture(InMemoryLogService::new());
        fill(&f.buffer, 25);

        assert_eq!(f.shipper.drain_to_empty(&f.buffer, 10), 25);
        assert!(f.buffer.is_empty());
        assert_eq!(f.service.calls().put_log_events, 3);
    }

    #[test]
    fn test_prepare_ensures_up_front() {
        let f = fixture(InMemoryLogService::new());
        assert_eq!(f.shipper.prepare().unwrap(), "web/2017/09");
        assert_eq!(f.service.stream_names("app"), ["web/2017/09"]);

        fill(&f.buffer, 1);
        f.shipper.drain_and_send(&f.buffer, 10);
        assert_eq!(f.service.calls().describe_log_streams, 1);
    }
}
