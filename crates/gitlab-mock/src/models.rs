use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The single simulated GitLab project
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub path_with_namespace: String,
    /// Whatever JSON value the last update supplied
    pub default_branch: Value,
    pub web_url: String,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            id: 12345,
            name: "test-project".to_string(),
            path_with_namespace: "group/test-project".to_string(),
            default_branch: Value::from("main"),
            web_url: "https://gitlab.example.com/group/test-project".to_string(),
        }
    }
}

impl Project {
    /// True if `identifier` is this project's numeric id or its namespaced path
    pub fn matches(&self, identifier: &str) -> bool {
        self.id.to_string() == identifier || self.path_with_namespace == identifier
    }
}

/// Fields a `PUT /projects/:id` body may change. Values are taken as sent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpdate {
    #[serde(default)]
    pub default_branch: Option<Value>,
}

/// GitLab merge request as returned on creation
///
/// Client-supplied fields are echoed back with the JSON type they were sent with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MergeRequest {
    pub id: u64,
    pub iid: u64,
    pub title: Value,
    pub description: Value,
    pub source_branch: Value,
    pub target_branch: Value,
    pub state: String,
    pub web_url: String,
    pub remove_source_branch: Value,
}

/// Body of `POST .../merge_requests`; every field is optional and untyped
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeRequestDraft {
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub source_branch: Option<Value>,
    #[serde(default)]
    pub target_branch: Option<Value>,
    #[serde(default)]
    pub remove_source_branch: Option<Value>,
}

impl MergeRequestDraft {
    /// Build the merge request assigned `id`, filling in GitLab's defaults
    pub fn into_merge_request(self, id: u64, project: &Project) -> MergeRequest {
        MergeRequest {
            id,
            iid: id,
            title: self
                .title
                .unwrap_or_else(|| Value::from(format!("MR !{}", id))),
            description: self.description.unwrap_or_else(|| Value::from("")),
            source_branch: self.source_branch.unwrap_or_else(|| Value::from("")),
            target_branch: self.target_branch.unwrap_or_else(|| Value::from("main")),
            state: "opened".to_string(),
            web_url: format!("{}/-/merge_requests/{}", project.web_url, id),
            remove_source_branch: self.remove_source_branch.unwrap_or(Value::Bool(false)),
        }
    }
}

/// One request as it arrived on the wire
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecordedRequest {
    /// When the request was recorded
    pub received_at: DateTime<Utc>,

    /// HTTP method as sent
    pub method: String,

    /// Raw request target, query string included
    pub path: String,

    /// Header names as sent; repeated headers are joined with ", "
    pub headers: BTreeMap<String, String>,

    /// Raw body text (empty for methods without a payload)
    pub body: String,
}

impl RecordedRequest {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        headers: BTreeMap<String, String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            received_at: Utc::now(),
            method: method.into(),
            path: path.into(),
            headers,
            body: body.into(),
        }
    }

    /// Look up a header by name, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
