//! In-process ingestion service
//!
//! Keeps groups, streams and events in memory and enforces the same
//! sequence-token rules as the remote API, which makes it usable both as a
//! local sink and as a test double. Every call is counted, and put failures
//! can be injected one at a time.

use super::model::{InputLogEvent, LogGroup, LogStream, PutLogEventsRequest, PutLogEventsResponse};
use super::{LogService, ServiceError, ServiceResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};

/// Number of calls made to each operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceCalls {
    pub describe_log_groups: usize,
    pub create_log_group: usize,
    pub describe_log_streams: usize,
    pub create_log_stream: usize,
    pub put_log_events: usize,
}

#[derive(Debug, Default)]
struct StreamState {
    sequence_token: Option<String>,
    events: Vec<InputLogEvent>,
}

#[derive(Debug, Default)]
struct State {
    groups: BTreeMap<String, BTreeMap<String, StreamState>>,
    injected_put_failures: VecDeque<ServiceError>,
    put_requests: Vec<PutLogEventsRequest>,
    calls: ServiceCalls,
    next_token: u64,
}

impl State {
    fn issue_token(&mut self) -> String {
        self.next_token += 1;
        format!("{:016}", self.next_token)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLogService {
    state: Mutex<State>,
}

impl InMemoryLogService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create a group
    #[must_use]
    pub fn with_group(self, name: &str) -> Self {
        self.state.lock().groups.entry(name.to_string()).or_default();
        self
    }

    /// Pre-create a stream, and its group if needed
    #[must_use]
    pub fn with_stream(self, group_name: &str, name: &str) -> Self {
        self.state
            .lock()
            .groups
            .entry(group_name.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default();
        self
    }

    /// Make the next put call fail with `error` (queued, one per call)
    pub fn fail_next_put(&self, error: ServiceError) {
        self.state.lock().injected_put_failures.push_back(error);
    }

    /// Advance a stream's token as if another writer had appended to it
    pub fn rotate_sequence_token(&self, group_name: &str, name: &str) -> Option<String> {
        let mut state = self.state.lock();
        let token = state.issue_token();
        let stream = state.groups.get_mut(group_name)?.get_mut(name)?;
        stream.sequence_token = Some(token.clone());
        Some(token)
    }

    pub fn sequence_token(&self, group_name: &str, name: &str) -> Option<String> {
        self.state
            .lock()
            .groups
            .get(group_name)?
            .get(name)?
            .sequence_token
            .clone()
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.state.lock().groups.contains_key(name)
    }

    pub fn stream_names(&self, group_name: &str) -> Vec<String> {
        self.state
            .lock()
            .groups
            .get(group_name)
            .map(|streams| streams.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Events stored in a stream, in arrival order
    pub fn events(&self, group_name: &str, name: &str) -> Vec<InputLogEvent> {
        self.state
            .lock()
            .groups
            .get(group_name)
            .and_then(|streams| streams.get(name))
            .map(|stream| stream.events.clone())
            .unwrap_or_default()
    }

    /// Every put request received, including rejected ones
    pub fn put_requests(&self) -> Vec<PutLogEventsRequest> {
        self.state.lock().put_requests.clone()
    }

    pub fn calls(&self) -> ServiceCalls {
        self.state.lock().calls
    }
}

impl LogService for InMemoryLogService {
    fn describe_log_groups(&self, name_prefix: &str) -> ServiceResult<Option<Vec<LogGroup>>> {
        let mut state = self.state.lock();
        state.calls.describe_log_groups += 1;

        let groups = state
            .groups
            .keys()
            .filter(|name| name.starts_with(name_prefix))
            .map(LogGroup::new)
            .collect();
        Ok(Some(groups))
    }

    fn create_log_group(&self, name: &str) -> ServiceResult<()> {
        let mut state = self.state.lock();
        state.calls.create_log_group += 1;

        if state.groups.contains_key(name) {
            return Err(ServiceError::group_exists(name));
        }
        state.groups.insert(name.to_string(), BTreeMap::new());
        Ok(())
    }

    fn describe_log_streams(
        &self,
        group_name: &str,
        name_prefix: &str,
    ) -> ServiceResult<Option<Vec<LogStream>>> {
        let mut state = self.state.lock();
        state.calls.describe_log_streams += 1;

        let streams = state
            .groups
            .get(group_name)
            .ok_or_else(|| ServiceError::group_not_found(group_name))?;

        let found = streams
            .iter()
            .filter(|(name, _)| name.starts_with(name_prefix))
            .map(|(name, stream)| LogStream {
                log_stream_name: name.clone(),
                upload_sequence_token: stream.sequence_token.clone(),
            })
            .collect();
        Ok(Some(found))
    }

    fn create_log_stream(&self, group_name: &str, name: &str) -> ServiceResult<()> {
        let mut state = self.state.lock();
        state.calls.create_log_stream += 1;

        let streams = state
            .groups
            .get_mut(group_name)
            .ok_or_else(|| ServiceError::group_not_found(group_name))?;
        if streams.contains_key(name) {
            return Err(ServiceError::stream_exists(name));
        }
        streams.insert(name.to_string(), StreamState::default());
        Ok(())
    }

    fn put_log_events(&self, request: &PutLogEventsRequest) -> ServiceResult<PutLogEventsResponse> {
        let mut state = self.state.lock();
        state.calls.put_log_events += 1;
        state.put_requests.push(request.clone());

        if let Some(error) = state.injected_put_failures.pop_front() {
            return Err(error);
        }

        let token = state.issue_token();
        let stream = state
            .groups
            .get_mut(&request.log_group_name)
            .ok_or_else(|| ServiceError::group_not_found(&request.log_group_name))?
            .get_mut(&request.log_stream_name)
            .ok_or_else(|| ServiceError::stream_not_found(&request.log_stream_name))?;

        if stream.sequence_token != request.sequence_token {
            return Err(ServiceError::InvalidSequenceToken {
                expected_sequence_token: stream.sequence_token.clone(),
            });
        }

        stream.events.extend(request.log_events.iter().cloned());
        stream.sequence_token = Some(token.clone());
        Ok(PutLogEventsResponse {
            next_sequence_token: Some(token),
        })
    }
}
