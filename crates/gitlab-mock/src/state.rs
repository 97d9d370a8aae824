//! Shared state store
//!
//! The project, the merge request counter and the request log live behind a
//! single mutex so that concurrent requests never observe a half-applied update.

use crate::error::{MockError, Result};
use crate::models::{MergeRequest, MergeRequestDraft, Project, ProjectUpdate, RecordedRequest};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct Inner {
    project: Project,
    merge_request_counter: u64,
    requests: Vec<RecordedRequest>,
}

/// State shared by every request handled by one server
#[derive(Debug)]
pub struct MockState {
    inner: Mutex<Inner>,
}

impl Default for MockState {
    fn default() -> Self {
        Self::new(Project::default())
    }
}

impl MockState {
    pub fn new(project: Project) -> Self {
        Self {
            inner: Mutex::new(Inner {
                project,
                merge_request_counter: 0,
                requests: Vec::new(),
            }),
        }
    }

    // Every mutation is a single assignment, so a poisoned lock still guards
    // consistent data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a request to the log and return its position
    pub fn record(&self, request: RecordedRequest) -> usize {
        let mut inner = self.lock();
        inner.requests.push(request);
        inner.requests.len() - 1
    }

    /// Attach a body read after the request was recorded at `slot`
    pub fn fill_body(&self, slot: usize, body: String) {
        if let Some(request) = self.lock().requests.get_mut(slot) {
            request.body = body;
        }
    }

    /// Snapshot of the current project
    pub fn project(&self) -> Project {
        self.lock().project.clone()
    }

    /// Apply a partial update and return the resulting project
    pub fn update_project(&self, update: ProjectUpdate) -> Project {
        let mut inner = self.lock();
        if let Some(branch) = update.default_branch {
            inner.project.default_branch = branch;
        }
        inner.project.clone()
    }

    /// Assign the next merge request id and build the merge request
    pub fn create_merge_request(&self, draft: MergeRequestDraft) -> MergeRequest {
        let mut inner = self.lock();
        inner.merge_request_counter += 1;
        let id = inner.merge_request_counter;
        draft.into_merge_request(id, &inner.project)
    }

    /// Ordered copy of every request recorded so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Write the request log as pretty JSON
    pub fn write_requests(&self, path: &Path) -> Result<()> {
        let json = {
            let inner = self.lock();
            serde_json::to_string_pretty(&inner.requests)?
        };
        std::fs::write(path, json).map_err(|e| MockError::Write(path.to_path_buf(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::thread;

    fn request(method: &str, path: &str) -> RecordedRequest {
        RecordedRequest::new(method, path, BTreeMap::new(), "")
    }

    #[test]
    fn test_update_only_touches_default_branch() {
        let state = MockState::default();
        let updated = state.update_project(ProjectUpdate {
            default_branch: Some("develop".into()),
        });
        assert_eq!(updated.default_branch, "develop");
        assert_eq!(updated.id, 12345);
        assert_eq!(updated.path_with_namespace, "group/test-project");
        assert_eq!(state.project(), updated);
    }

    #[test]
    fn test_empty_update_is_a_no_op() {
        let state = MockState::default();
        let before = state.project();
        assert_eq!(state.update_project(ProjectUpdate::default()), before);
    }

    #[test]
    fn test_merge_request_ids_are_sequential() {
        let state = MockState::default();
        let ids: Vec<u64> = (0..3)
            .map(|_| state.create_merge_request(MergeRequestDraft::default()).id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_concurrent_merge_requests_get_distinct_ids() {
        let state = Arc::new(MockState::default());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let state = Arc::clone(&state);
                thread::spawn(move || state.create_merge_request(MergeRequestDraft::default()).id)
            })
            .collect();

        let mut ids: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=16).collect::<Vec<_>>());
    }

    #[test]
    fn test_write_requests_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let state = MockState::default();
        state.record(request("GET", "/api/v4/projects/12345"));
        state.record(request("PUT", "/api/v4/projects/12345"));
        state.record(request("POST", "/api/v4/projects/12345/merge_requests"));

        let path = dir.path().join("requests.json");
        state.write_requests(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let logged: Vec<RecordedRequest> = serde_json::from_str(&content).unwrap();
        let methods: Vec<&str> = logged.iter().map(|r| r.method.as_str()).collect();
        assert_eq!(methods, vec!["GET", "PUT", "POST"]);
        assert_eq!(logged, state.requests());
    }

    #[test]
    fn test_fill_body_keeps_recording_order() {
        let state = MockState::default();
        let first = state.record(request("POST", "/api/v4/projects/12345/merge_requests"));
        let second = state.record(request("GET", "/api/v4/projects/12345"));
        assert_eq!((first, second), (0, 1));

        state.fill_body(first, r#"{"title": "late"}"#.to_string());
        state.fill_body(7, "ignored".to_string());

        let logged = state.requests();
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0].body, r#"{"title": "late"}"#);
        assert_eq!(logged[1].method, "GET");
        assert_eq!(logged[1].body, "");
    }

    #[test]
    fn test_write_requests_reports_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let state = MockState::default();
        let path = dir.path().join("missing").join("requests.json");
        assert!(matches!(
            state.write_requests(&path),
            Err(MockError::Write(p, _)) if p == path
        ));
    }
}
