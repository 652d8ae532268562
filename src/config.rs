//! Appender configuration
//!
//! Keys follow the appender's plugin attribute names (`logGroupName`,
//! `queueLength`, ...). Everything except the group name has a default.
//!
//! ```
//! use cloudwatch_appender::config::AppenderConfig;
//!
//! let config = AppenderConfig::from_json_str(
//!     r#"{ "logGroupName": "orders", "logStreamNamePrefix": "api" }"#,
//! )
//! .unwrap();
//! assert_eq!(config.queue_length, 1024);
//! assert_eq!(config.messages_batch_size, 128);
//! ```

use crate::core::{AppenderError, LayoutConfig, Result};
use crate::shipping::BatchBound;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_NAME: &str = "CloudWatchAppender";
pub const DEFAULT_QUEUE_LENGTH: usize = 1024;
pub const DEFAULT_BATCH_SIZE: usize = 128;
pub const DEFAULT_POLL_INTERVAL_MILLIS: u64 = 20;

/// Most events the ingestion service accepts in one put call
pub const MAX_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppenderConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(alias = "groupName")]
    pub log_group_name: String,

    #[serde(default, alias = "streamNamePrefix")]
    pub log_stream_name_prefix: Option<String>,

    #[serde(default = "default_queue_length")]
    pub queue_length: usize,

    #[serde(default = "default_batch_size")]
    pub messages_batch_size: usize,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_millis: u64,

    #[serde(default)]
    pub batch_bound: BatchBound,

    #[serde(default)]
    pub layout: LayoutConfig,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_queue_length() -> usize {
    DEFAULT_QUEUE_LENGTH
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MILLIS
}

impl AppenderConfig {
    /// Configuration with defaults for everything but the group
    pub fn new(log_group_name: impl Into<String>) -> Self {
        Self {
            name: default_name(),
            log_group_name: log_group_name.into(),
            log_stream_name_prefix: None,
            queue_length: DEFAULT_QUEUE_LENGTH,
            messages_batch_size: DEFAULT_BATCH_SIZE,
            poll_interval_millis: DEFAULT_POLL_INTERVAL_MILLIS,
            batch_bound: BatchBound::default(),
            layout: LayoutConfig::default(),
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AppenderError::config_io(path.display().to_string(), e))?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.log_group_name.trim().is_empty() {
            return Err(AppenderError::config("logGroupName", "is required"));
        }
        if self.queue_length == 0 {
            return Err(AppenderError::config(
                "queueLength",
                "must be greater than zero",
            ));
        }
        // An inclusive bound puts one record more than the batch size
        let max_size = MAX_BATCH_SIZE - self.batch_bound.limit(0);
        if self.messages_batch_size == 0 || self.messages_batch_size > max_size {
            return Err(AppenderError::config(
                "messagesBatchSize",
                format!(
                    "must be between 1 and {} with the {:?} batch bound",
                    max_size, self.batch_bound
                ),
            ));
        }
        if self.poll_interval_millis == 0 {
            return Err(AppenderError::config(
                "pollIntervalMillis",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }
}
