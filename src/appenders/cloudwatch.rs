//! CloudWatch Logs appender
//!
//! Buffers records from any number of threads and ships them in batches to a
//! monthly stream (`<prefix>/YYYY/MM`) of one log group, from a background
//! pump thread.

use crate::config::AppenderConfig;
use crate::core::{
    diagnostics, Appender, AppenderError, Clock, Layout, LayoutConfig, LogEntry, OverflowCallback,
    RecordBuffer, Result, ShipperMetrics, SystemClock,
};
use crate::service::LogService;
use crate::shipping::{BackgroundPump, BatchBound, PumpState, Shipper, StreamNamer};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default shutdown timeout used when the appender is dropped (5 seconds)
///
/// Call [`CloudWatchAppender::stop`] to choose a different timeout.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const NEW: u8 = 0;
const STARTED: u8 = 1;
const STOPPED: u8 = 2;

/// Appender that ships records to a CloudWatch-Logs-style service
///
/// # Example
///
/// ```
/// use cloudwatch_appender::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let service = Arc::new(InMemoryLogService::new());
/// let appender = CloudWatchAppender::builder()
///     .log_group_name("orders")
///     .log_stream_name_prefix("api")
///     .service(service.clone())
///     .build()
///     .unwrap();
///
/// appender.start().unwrap();
/// appender.append(LogEntry::new(LogLevel::Info, "order accepted"));
/// assert!(appender.stop(Duration::from_secs(5)));
/// assert_eq!(appender.metrics().shipped_count(), 1);
/// ```
pub struct CloudWatchAppender {
    name: String,
    buffer: Arc<RecordBuffer>,
    shipper: Arc<Shipper>,
    metrics: Arc<ShipperMetrics>,
    batch_size: usize,
    poll_interval: Duration,
    pump: RwLock<Option<BackgroundPump>>,
    lifecycle: AtomicU8,
}

impl CloudWatchAppender {
    #[must_use]
    pub fn builder() -> CloudWatchAppenderBuilder {
        CloudWatchAppenderBuilder::new()
    }

    /// Build an appender from a parsed configuration
    pub fn from_config(config: AppenderConfig, service: Arc<dyn LogService>) -> Result<Self> {
        CloudWatchAppenderBuilder::from_config(config)
            .service(service)
            .build()
    }

    /// Provision the destination and start the pump thread
    ///
    /// Provisioning failures are not fatal: they are reported on the
    /// diagnostic channel and retried with the first batch.
    pub fn start(&self) -> Result<()> {
        if let Err(current) =
            self.lifecycle
                .compare_exchange(NEW, STARTED, Ordering::AcqRel, Ordering::Acquire)
        {
            return Err(if current == STARTED {
                AppenderError::AlreadyStarted(self.name.clone())
            } else {
                AppenderError::Stopped(self.name.clone())
            });
        }

        if let Err(e) = self.shipper.prepare() {
            diagnostics::debug_error(
                format!("Could not provision destination for '{}':", self.name),
                &e,
            );
        }

        match BackgroundPump::spawn(
            &self.name,
            Arc::clone(&self.shipper),
            Arc::clone(&self.buffer),
            self.batch_size,
            self.poll_interval,
        ) {
            Ok(pump) => {
                *self.pump.write() = Some(pump);
                Ok(())
            }
            Err(e) => {
                self.lifecycle.store(NEW, Ordering::Release);
                Err(e)
            }
        }
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle.load(Ordering::Acquire) == STARTED
    }

    /// Stop accepting records, drain the buffer and join the pump
    ///
    /// Returns `true` if everything buffered was handed to the service within
    /// `timeout`. Stopping twice is a no-op.
    pub fn stop(&self, timeout: Duration) -> bool {
        if self.lifecycle.swap(STOPPED, Ordering::AcqRel) == STOPPED {
            return true;
        }

        // Release the lock before joining; producers may still be reading it
        let pump = self.pump.write().take();
        let finished = match pump {
            Some(pump) => pump.stop(timeout),
            None => self.drain_contained(),
        };

        let dropped = self.metrics.dropped_count();
        if dropped > 0 {
            diagnostics::debug(format!(
                "Appender '{}' stopped with {} dropped records (drop rate: {:.2}%)",
                self.name,
                dropped,
                self.metrics.drop_rate()
            ));
        }
        finished
    }

    pub fn metrics(&self) -> &ShipperMetrics {
        &self.metrics
    }

    /// Records buffered and not yet shipped
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// State of the pump thread, `None` before `start`
    pub fn pump_state(&self) -> Option<PumpState> {
        match self.pump.read().as_ref() {
            Some(pump) => Some(pump.state()),
            None if self.lifecycle.load(Ordering::Acquire) == STOPPED => Some(PumpState::Stopped),
            None => None,
        }
    }

    pub fn log_group_name(&self) -> &str {
        self.shipper.group_name()
    }

    fn drain_contained(&self) -> bool {
        self.shipper.contained(|| {
            self.shipper.drain_to_empty(&self.buffer, self.batch_size);
        })
    }
}

impl Appender for CloudWatchAppender {
    fn append(&self, entry: LogEntry) -> bool {
        let state = self.lifecycle.load(Ordering::Acquire);
        if state != STARTED {
            diagnostics::debug(format!(
                "Appender '{}' is {}, record rejected",
                self.name,
                if state == NEW { "not started" } else { "stopped" }
            ));
            return false;
        }

        if !self.buffer.offer(entry) {
            return false;
        }

        // A full batch is waiting; no need to sit out the poll interval
        if self.buffer.len() >= self.batch_size {
            if let Some(pump) = self.pump.read().as_ref() {
                pump.wake();
            }
        }
        true
    }

    /// Ship everything buffered from the calling thread
    ///
    /// A panic in the service or layout is reported on the diagnostic
    /// channel and never reaches the caller.
    fn flush(&self) -> Result<()> {
        self.drain_contained();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for CloudWatchAppender {
    fn drop(&mut self) {
        if self.lifecycle.load(Ordering::Acquire) == STARTED
            && !self.stop(DEFAULT_SHUTDOWN_TIMEOUT)
        {
            diagnostics::debug(format!(
                "Appender '{}' did not drain within {:?}",
                self.name, DEFAULT_SHUTDOWN_TIMEOUT
            ));
        }
    }
}

/// Builder for [`CloudWatchAppender`]
///
/// Starts from the same defaults as [`AppenderConfig`]; a group name and a
/// service are required.
pub struct CloudWatchAppenderBuilder {
    config: AppenderConfig,
    service: Option<Arc<dyn LogService>>,
    clock: Option<Arc<dyn Clock>>,
    layout: Option<Arc<dyn Layout>>,
    on_overflow: Option<OverflowCallback>,
}

impl CloudWatchAppenderBuilder {
    pub fn new() -> Self {
        Self::from_config(AppenderConfig::new(""))
    }

    pub fn from_config(config: AppenderConfig) -> Self {
        Self {
            config,
            service: None,
            clock: None,
            layout: None,
            on_overflow: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn log_group_name(mut self, name: impl Into<String>) -> Self {
        self.config.log_group_name = name.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn log_stream_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.log_stream_name_prefix = Some(prefix.into());
        self
    }

    /// Buffer capacity; records offered beyond it are dropped
    #[must_use = "builder methods return a new value"]
    pub fn queue_length(mut self, length: usize) -> Self {
        self.config.queue_length = length;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn messages_batch_size(mut self, size: usize) -> Self {
        self.config.messages_batch_size = size;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_millis = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn batch_bound(mut self, bound: BatchBound) -> Self {
        self.config.batch_bound = bound;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn layout_config(mut self, layout: LayoutConfig) -> Self {
        self.config.layout = layout;
        self
    }

    /// Use a custom layout instead of the configured one
    #[must_use = "builder methods return a new value"]
    pub fn layout(mut self, layout: Arc<dyn Layout>) -> Self {
        self.layout = Some(layout);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn service(mut self, service: Arc<dyn LogService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Clock used to pick the monthly stream (UTC wall clock by default)
    #[must_use = "builder methods return a new value"]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Called on the first dropped record and every 1000th after it
    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    pub fn build(self) -> Result<CloudWatchAppender> {
        let config = self.config;
        config.validate()?;

        let service = self
            .service
            .ok_or_else(|| AppenderError::config("service", "a log service is required"))?;
        let layout = match self.layout {
            Some(layout) => layout,
            None => config.layout.build()?,
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock::utc()),
        };

        let metrics = Arc::new(ShipperMetrics::new());
        let mut buffer = RecordBuffer::new(config.queue_length, Arc::clone(&metrics));
        if let Some(callback) = self.on_overflow {
            buffer = buffer.with_overflow_callback(callback);
        }

        let namer = StreamNamer::new(config.log_stream_name_prefix.clone(), clock);
        let shipper = Shipper::new(
            config.log_group_name.clone(),
            namer,
            service,
            layout,
            Arc::clone(&metrics),
        )
        .with_batch_bound(config.batch_bound);

        Ok(CloudWatchAppender {
            poll_interval: config.poll_interval(),
            name: config.name,
            buffer: Arc::new(buffer),
            shipper: Arc::new(shipper),
            metrics,
            batch_size: config.messages_batch_size,
            pump: RwLock::new(None),
            lifecycle: AtomicU8::new(NEW),
        })
    }
}

impl Default for CloudWatchAppenderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
