//! Idempotent "create if absent" for log groups and streams
//!
//! Both ensurers look the resource up by name prefix, match the result
//! case-insensitively, and only create when nothing matched. Losing a
//! lookup/create race to another writer counts as success.

use crate::core::{diagnostics, ShipperMetrics};
use crate::service::{LogService, ServiceError, ServiceResult};
use std::sync::Arc;

fn created_or_existing(result: ServiceResult<()>) -> ServiceResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(ServiceError::ResourceAlreadyExists { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

pub struct GroupEnsurer {
    service: Arc<dyn LogService>,
    metrics: Arc<ShipperMetrics>,
}

impl GroupEnsurer {
    pub fn new(service: Arc<dyn LogService>, metrics: Arc<ShipperMetrics>) -> Self {
        Self { service, metrics }
    }

    /// Make sure the group exists; returns whether it was created
    ///
    /// A lookup that comes back without a result set is taken as "nothing to
    /// do". Lookup errors propagate and no create is attempted.
    pub fn ensure_exists(&self, name: &str) -> ServiceResult<bool> {
        let groups = match self.service.describe_log_groups(name)? {
            Some(groups) => groups,
            None => return Ok(false),
        };
        if groups
            .iter()
            .any(|group| group.log_group_name.eq_ignore_ascii_case(name))
        {
            return Ok(false);
        }

        let created = created_or_existing(self.service.create_log_group(name))?;
        if created {
            self.metrics.record_group_created();
            diagnostics::debug(format!("Created log group '{}'", name));
        }
        Ok(created)
    }
}

pub struct StreamEnsurer {
    service: Arc<dyn LogService>,
    metrics: Arc<ShipperMetrics>,
}

impl StreamEnsurer {
    pub fn new(service: Arc<dyn LogService>, metrics: Arc<ShipperMetrics>) -> Self {
        Self { service, metrics }
    }

    /// Make sure the stream exists in `group_name`; returns whether it was created
    pub fn ensure_exists(&self, group_name: &str, name: &str) -> ServiceResult<bool> {
        let streams = match self.service.describe_log_streams(group_name, name)? {
            Some(streams) => streams,
            None => return Ok(false),
        };
        if streams
            .iter()
            .any(|stream| stream.log_stream_name.eq_ignore_ascii_case(name))
        {
            return Ok(false);
        }

        let created = created_or_existing(self.service.create_log_stream(group_name, name))?;
        if created {
            self.metrics.record_stream_created();
            diagnostics::debug(format!(
                "Created log stream '{}' in group '{}'",
                name, group_name
            ));
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{InMemoryLogService, LogGroup, LogStream};

    /// Answers every lookup with no result set and refuses creates
    struct NoResultSet;

    impl LogService for NoResultSet {
        fn describe_log_groups(&self, _: &str) -> ServiceResult<Option<Vec<LogGroup>>> {
            Ok(None)
        }

        fn create_log_group(&self, _: &str) -> ServiceResult<()> {
            panic!("create must not be called");
        }

        fn describe_log_streams(&self, _: &str, _: &str) -> ServiceResult<Option<Vec<LogStream>>> {
            Ok(None)
        }

        fn create_log_stream(&self, _: &str, _: &str) -> ServiceResult<()> {
            panic!("create must not be called");
        }

        fn put_log_events(
            &self,
            _: &crate::service::PutLogEventsRequest,
        ) -> ServiceResult<crate::service::PutLogEventsResponse> {
            Ok(Default::default())
        }
    }

    /// Lookup never sees the group, create reports it already exists
    struct LostRace;

    impl LogService for LostRace {
        fn describe_log_groups(&self, _: &str) -> ServiceResult<Option<Vec<LogGroup>>> {
            Ok(Some(Vec::new()))
        }

        fn create_log_group(&self, name: &str) -> ServiceResult<()> {
            Err(ServiceError::group_exists(name))
        }

        fn describe_log_streams(&self, _: &str, _: &str) -> ServiceResult<Option<Vec<LogStream>>> {
            Err(ServiceError::transport("connection reset"))
        }

        fn create_log_stream(&self, _: &str, _: &str) -> ServiceResult<()> {
            panic!("create must not be called after a failed lookup");
        }

        fn put_log_events(
            &self,
            _: &crate::service::PutLogEventsRequest,
        ) -> ServiceResult<crate::service::PutLogEventsResponse> {
            Ok(Default::default())
        }
    }

    fn metrics() -> Arc<ShipperMetrics> {
        Arc::new(ShipperMetrics::new())
    }

    #[test]
    fn test_group_created_once() {
        let service = Arc::new(InMemoryLogService::new());
        let metrics = metrics();
        let ensurer = GroupEnsurer::new(service.clone(), metrics.clone());

        assert!(ensurer.ensure_exists("app").unwrap());
        assert!(!ensurer.ensure_exists("app").unwrap());
        assert_eq!(service.calls().create_log_group, 1);
        assert_eq!(metrics.groups_created(), 1);
    }

    /// Lists upper-cased names regardless of the prefix asked for
    struct UpperCaseListing;

    impl LogService for UpperCaseListing {
        fn describe_log_groups(&self, _: &str) -> ServiceResult<Option<Vec<LogGroup>>> {
            Ok(Some(vec![LogGroup::new("APP")]))
        }

        fn create_log_group(&self, _: &str) -> ServiceResult<()> {
            panic!("create must not be called");
        }

        fn describe_log_streams(&self, _: &str, _: &str) -> ServiceResult<Option<Vec<LogStream>>> {
            Ok(Some(vec![LogStream::new("WEB/2017/09")]))
        }

        fn create_log_stream(&self, _: &str, _: &str) -> ServiceResult<()> {
            panic!("create must not be called");
        }

        fn put_log_events(
            &self,
            _: &crate::service::PutLogEventsRequest,
        ) -> ServiceResult<crate::service::PutLogEventsResponse> {
            Ok(Default::default())
        }
    }

    #[test]
    fn test_match_ignores_case() {
        let service: Arc<dyn LogService> = Arc::new(UpperCaseListing);
        assert!(!GroupEnsurer::new(service.clone(), metrics())
            .ensure_exists("app")
            .unwrap());
        assert!(!StreamEnsurer::new(service, metrics())
            .ensure_exists("app", "web/2017/09")
            .unwrap());
    }

    #[test]
    fn test_prefix_sibling_does_not_count() {
        let service = Arc::new(InMemoryLogService::new().with_stream("app", "web/2017/09-old"));
        let ensurer = StreamEnsurer::new(service.clone(), metrics());

        assert!(ensurer.ensure_exists("app", "web/2017/09").unwrap());
        assert_eq!(
            service.stream_names("app"),
            ["web/2017/09", "web/2017/09-old"]
        );
    }

    #[test]
    fn test_no_result_set_means_no_create() {
        let service: Arc<dyn LogService> = Arc::new(NoResultSet);
        assert!(!GroupEnsurer::new(service.clone(), metrics())
            .ensure_exists("app")
            .unwrap());
        assert!(!StreamEnsurer::new(service, metrics())
            .ensure_exists("app", "2017/09")
            .unwrap());
    }

    #[test]
    fn test_already_exists_is_success() {
        let metrics = metrics();
        let ensurer = GroupEnsurer::new(Arc::new(LostRace), metrics.clone());
        assert!(!ensurer.ensure_exists("app").unwrap());
        assert_eq!(metrics.groups_created(), 0);
    }

    #[test]
    fn test_lookup_error_propagates() {
        let ensurer = StreamEnsurer::new(Arc::new(LostRace), metrics());
        assert_eq!(
            ensurer.ensure_exists("app", "2017/09"),
            Err(ServiceError::transport("connection reset"))
        );
    }

    #[test]
    fn test_stream_in_missing_group_fails() {
        let service = Arc::new(InMemoryLogService::new());
        let ensurer = StreamEnsurer::new(service, metrics());
        assert_eq!(
            ensurer.ensure_exists("app", "2017/09"),
            Err(ServiceError::group_not_found("app"))
        );
    }
}
