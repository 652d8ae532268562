//! Appender trait for log output destinations

use super::{error::Result, log_entry::LogEntry};

/// Extension point a host logging framework calls into
///
/// `append` must never block or fail the calling thread; it reports whether
/// the record was accepted for delivery.
pub trait Appender: Send + Sync {
    fn append(&self, entry: LogEntry) -> bool;
    fn flush(&self) -> Result<()>;
    fn name(&self) -> &str;
}
