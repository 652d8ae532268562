//! Bridge from async ingestion clients to the synchronous pipeline
//!
//! Most SDK clients are async. The shipping worker is a plain thread, so
//! [`BlockingLogService`] owns a current-thread tokio runtime and drives each
//! call to completion with `block_on`.

use super::model::{LogGroup, LogStream, PutLogEventsRequest, PutLogEventsResponse};
use super::{LogService, ServiceError, ServiceResult};
use async_trait::async_trait;
use tokio::runtime::{Builder, Runtime};

/// Async counterpart of [`LogService`]
#[async_trait]
pub trait AsyncLogService: Send + Sync {
    async fn describe_log_groups(&self, name_prefix: &str) -> ServiceResult<Option<Vec<LogGroup>>>;

    async fn create_log_group(&self, name: &str) -> ServiceResult<()>;

    async fn describe_log_streams(
        &self,
        group_name: &str,
        name_prefix: &str,
    ) -> ServiceResult<Option<Vec<LogStream>>>;

    async fn create_log_stream(&self, group_name: &str, name: &str) -> ServiceResult<()>;

    async fn put_log_events(
        &self,
        request: &PutLogEventsRequest,
    ) -> ServiceResult<PutLogEventsResponse>;
}

/// Runs an [`AsyncLogService`] on a private runtime
///
/// Must not be called from inside another tokio runtime: `block_on` panics
/// there. The appender only calls it from its worker thread and from
/// `flush`, so call `flush` from synchronous code.
pub struct BlockingLogService<S> {
    inner: S,
    runtime: Runtime,
}

impl<S: AsyncLogService> BlockingLogService<S> {
    pub fn new(inner: S) -> ServiceResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ServiceError::Other(format!("failed to build runtime: {}", e)))?;
        Ok(Self { inner, runtime })
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: AsyncLogService> LogService for BlockingLogService<S> {
    fn describe_log_groups(&self, name_prefix: &str) -> ServiceResult<Option<Vec<LogGroup>>> {
        self.runtime.block_on(self.inner.describe_log_groups(name_prefix))
    }

    fn create_log_group(&self, name: &str) -> ServiceResult<()> {
        self.runtime.block_on(self.inner.create_log_group(name))
    }

    fn describe_log_streams(
        &self,
        group_name: &str,
        name_prefix: &str,
    ) -> ServiceResult<Option<Vec<LogStream>>> {
        self.runtime
            .block_on(self.inner.describe_log_streams(group_name, name_prefix))
    }

    fn create_log_stream(&self, group_name: &str, name: &str) -> ServiceResult<()> {
        self.runtime.block_on(self.inner.create_log_stream(group_name, name))
    }

    fn put_log_events(&self, request: &PutLogEventsRequest) -> ServiceResult<PutLogEventsResponse> {
        self.runtime.block_on(self.inner.put_log_events(request))
    }
}
