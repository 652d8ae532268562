//! Appender implementations

pub mod cloudwatch;

pub use cloudwatch::{CloudWatchAppender, CloudWatchAppenderBuilder, DEFAULT_SHUTDOWN_TIMEOUT};

pub use crate::core::Appender;
