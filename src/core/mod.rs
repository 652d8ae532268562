//! Core appender types and traits

pub mod appender;
pub mod clock;
pub mod diagnostics;
pub mod error;
pub mod layout;
pub mod log_entry;
pub mod log_level;
pub mod metrics;
pub mod record_buffer;

pub use appender::Appender;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{AppenderError, Result};
pub use layout::{JsonLayout, Layout, LayoutConfig, PatternLayout};
pub use log_entry::LogEntry;
pub use log_level::LogLevel;
pub use metrics::ShipperMetrics;
pub use record_buffer::{OverflowCallback, RecordBuffer};
