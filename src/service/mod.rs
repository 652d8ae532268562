//! Remote log ingestion service
//!
//! The pipeline talks to the ingestion API only through [`LogService`]. An
//! in-memory implementation is provided for tests and local runs; real
//! clients implement the trait directly, or implement [`AsyncLogService`]
//! and are wrapped in [`BlockingLogService`] (feature `async-service`).

pub mod memory;
pub mod model;

#[cfg(feature = "async-service")]
pub mod async_adapter;

pub use memory::{InMemoryLogService, ServiceCalls};
pub use model::{InputLogEvent, LogGroup, LogStream, PutLogEventsRequest, PutLogEventsResponse};

#[cfg(feature = "async-service")]
pub use async_adapter::{AsyncLogService, BlockingLogService};

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The sequence token supplied with a put was not the stream's current one
    #[error("Invalid sequence token, expected {}", .expected_sequence_token.as_deref().unwrap_or("none"))]
    InvalidSequenceToken {
        expected_sequence_token: Option<String>,
    },

    #[error("{kind} '{name}' does not exist")]
    ResourceNotFound { kind: &'static str, name: String },

    #[error("{kind} '{name}' already exists")]
    ResourceAlreadyExists { kind: &'static str, name: String },

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Service error: {0}")]
    Other(String),
}

impl ServiceError {
    pub fn invalid_sequence_token(expected: Option<impl Into<String>>) -> Self {
        ServiceError::InvalidSequenceToken {
            expected_sequence_token: expected.map(Into::into),
        }
    }

    pub fn group_not_found(name: impl Into<String>) -> Self {
        ServiceError::ResourceNotFound {
            kind: "Log group",
            name: name.into(),
        }
    }

    pub fn stream_not_found(name: impl Into<String>) -> Self {
        ServiceError::ResourceNotFound {
            kind: "Log stream",
            name: name.into(),
        }
    }

    pub fn group_exists(name: impl Into<String>) -> Self {
        ServiceError::ResourceAlreadyExists {
            kind: "Log group",
            name: name.into(),
        }
    }

    pub fn stream_exists(name: impl Into<String>) -> Self {
        ServiceError::ResourceAlreadyExists {
            kind: "Log stream",
            name: name.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        ServiceError::Transport(message.into())
    }
}

/// Client for a CloudWatch-Logs-style ingestion API
///
/// Describe calls return `Ok(None)` when the service answered without a result
/// set; callers treat that as "nothing to do" rather than "absent".
pub trait LogService: Send + Sync {
    fn describe_log_groups(&self, name_prefix: &str) -> ServiceResult<Option<Vec<LogGroup>>>;

    fn create_log_group(&self, name: &str) -> ServiceResult<()>;

    fn describe_log_streams(
        &self,
        group_name: &str,
        name_prefix: &str,
    ) -> ServiceResult<Option<Vec<LogStream>>>;

    fn create_log_stream(&self, group_name: &str, name: &str) -> ServiceResult<()>;

    /// Append events; fails with `InvalidSequenceToken` when the token is stale
    fn put_log_events(&self, request: &PutLogEventsRequest) -> ServiceResult<PutLogEventsResponse>;
}

impl<S: LogService + ?Sized> LogService for std::sync::Arc<S> {
    fn describe_log_groups(&self, name_prefix: &str) -> ServiceResult<Option<Vec<LogGroup>>> {
        (**self).describe_log_groups(name_prefix)
    }

    fn create_log_group(&self, name: &str) -> ServiceResult<()> {
        (**self).create_log_group(name)
    }

    fn describe_log_streams(
        &self,
        group_name: &str,
        name_prefix: &str,
    ) -> ServiceResult<Option<Vec<LogStream>>> {
        (**self).describe_log_streams(group_name, name_prefix)
    }

    fn create_log_stream(&self, group_name: &str, name: &str) -> ServiceResult<()> {
        (**self).create_log_stream(group_name, name)
    }

    fn put_log_events(&self, request: &PutLogEventsRequest) -> ServiceResult<PutLogEventsResponse> {
        (**self).put_log_events(request)
    }
}
