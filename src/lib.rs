//! # CloudWatch Appender
//!
//! A log appender that ships records to a CloudWatch-Logs-style ingestion
//! service from a background thread.
//!
//! ## Features
//!
//! - **Non-blocking**: producers enqueue into a bounded buffer and never wait;
//!   overflow drops records and counts them
//! - **Batching**: a pump thread drains the buffer into batched put calls
//! - **Self-provisioning**: the log group and the monthly stream
//!   (`<prefix>/YYYY/MM`) are created when missing
//! - **Token recovery**: a stale sequence token is retried once with the
//!   token the service expects
//! - **Silent by default**: internal failures only reach stderr when
//!   `CLOUDWATCH_APPENDER_DEBUG` is set
//!
//! ## Example
//!
//! ```
//! use cloudwatch_appender::prelude::*;
//! use std::sync::Arc;
//!
//! let service = Arc::new(InMemoryLogService::new());
//! let appender = CloudWatchAppender::builder()
//!     .log_group_name("orders")
//!     .service(service.clone())
//!     .build()
//!     .unwrap();
//!
//! appender.start().unwrap();
//! appender.append(LogEntry::new(LogLevel::Info, "order 42 accepted"));
//! appender.flush().unwrap();
//! ```

pub mod appenders;
pub mod config;
pub mod core;
pub mod service;
pub mod shipping;

pub mod prelude {
    pub use crate::appenders::{CloudWatchAppender, CloudWatchAppenderBuilder};
    pub use crate::config::AppenderConfig;
    pub use crate::core::{
        Appender, AppenderError, Clock, FixedClock, JsonLayout, Layout, LayoutConfig, LogEntry,
        LogLevel, OverflowCallback, PatternLayout, Result, ShipperMetrics, SystemClock,
    };
    pub use crate::service::{InMemoryLogService, LogService, ServiceError};
    pub use crate::shipping::{BatchBound, PumpState};
    pub use crate::appenders::DEFAULT_SHUTDOWN_TIMEOUT;
}

pub use appenders::{CloudWatchAppender, CloudWatchAppenderBuilder, DEFAULT_SHUTDOWN_TIMEOUT};
pub use config::AppenderConfig;
pub use self::core::{
    Appender, AppenderError, Clock, FixedClock, JsonLayout, Layout, LayoutConfig, LogEntry,
    LogLevel, OverflowCallback, PatternLayout, Result, ShipperMetrics, SystemClock,
};
pub use service::{InMemoryLogService, LogService, ServiceError};
pub use shipping::{BatchBound, PumpState};
