//! The three simulated GitLab endpoints

use crate::error::ApiError;
use crate::models::{MergeRequestDraft, ProjectUpdate};
use crate::router::ApiResponse;
use crate::scenario::{Scenario, Triggers};
use crate::state::MockState;
use serde::de::DeserializeOwned;

/// `GET /projects/:id_or_path`
pub(crate) fn get_project(
    state: &MockState,
    triggers: &Triggers<'_>,
    path: &str,
) -> Result<ApiResponse, ApiError> {
    if triggers.fires(Scenario::FailNotFound) {
        return Err(ApiError::ProjectLookupFailed);
    }

    let identifier = project_identifier(path);
    let project = state.project();
    if project.matches(&identifier) {
        ApiResponse::json(200, &project)
    } else {
        Err(ApiError::ProjectNotFound(identifier))
    }
}

/// `PUT /projects/:id_or_path`
pub(crate) fn update_project(state: &MockState, body: &str) -> Result<ApiResponse, ApiError> {
    let update: ProjectUpdate = parse_body(body)?;
    let project = state.update_project(update);
    ApiResponse::json(200, &project)
}

/// `POST /projects/:id_or_path/merge_requests`
pub(crate) fn create_merge_request(
    state: &MockState,
    body: &str,
) -> Result<ApiResponse, ApiError> {
    let draft: MergeRequestDraft = parse_body(body)?;
    let merge_request = state.create_merge_request(draft);
    tracing::debug!(id = merge_request.id, "created merge request");
    ApiResponse::json(201, &merge_request)
}

/// Percent-decoded segment following `/projects/`
fn project_identifier(path: &str) -> String {
    let raw = path.split('/').nth(2).unwrap_or_default();
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}

/// An empty body counts as `{}`; anything else must be a JSON object. Known
/// fields are not type-checked.
fn parse_body<T: DeserializeOwned + Default>(body: &str) -> Result<T, ApiError> {
    if body.is_empty() {
        return Ok(T::default());
    }

    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        tracing::debug!("rejecting request body: {}", e);
        ApiError::InvalidJson
    })?;
    if !value.is_object() {
        tracing::debug!("rejecting request body: not a JSON object");
        return Err(ApiError::InvalidJson);
    }

    serde_json::from_value(value).map_err(|e| {
        tracing::debug!("rejecting request body: {}", e);
        ApiError::InvalidJson
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioGate;

    #[test]
    fn test_project_identifier_decodes_path() {
        assert_eq!(project_identifier("/projects/12345"), "12345");
        assert_eq!(
            project_identifier("/projects/group%2Ftest-project"),
            "group/test-project"
        );
        assert_eq!(project_identifier("/projects/12345/merge_requests"), "12345");
        assert_eq!(project_identifier("/projects/"), "");
    }

    #[test]
    fn test_parse_body_rules() {
        let empty: ProjectUpdate = parse_body("").unwrap();
        assert!(empty.default_branch.is_none());

        let update: ProjectUpdate = parse_body(r#"{"default_branch": "develop", "x": 1}"#).unwrap();
        assert_eq!(update.default_branch, Some(serde_json::json!("develop")));

        assert_eq!(
            parse_body::<ProjectUpdate>("{not json").unwrap_err(),
            ApiError::InvalidJson
        );
        assert_eq!(
            parse_body::<ProjectUpdate>(r#"["develop"]"#).unwrap_err(),
            ApiError::InvalidJson
        );

        let loose: ProjectUpdate = parse_body(r#"{"default_branch": 7}"#).unwrap();
        assert_eq!(loose.default_branch, Some(serde_json::json!(7)));
    }

    #[test]
    fn test_get_project_not_found_echoes_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let gate = ScenarioGate::new(dir.path());
        let triggers = Triggers::new(&gate, Default::default());
        let state = MockState::default();

        let err = get_project(&state, &triggers, "/projects/other%2Frepo").unwrap_err();
        assert_eq!(err, ApiError::ProjectNotFound("other/repo".to_string()));
    }

    #[test]
    fn test_invalid_merge_request_body_does_not_consume_an_id() {
        let state = MockState::default();
        assert!(create_merge_request(&state, "{").is_err());

        let response = create_merge_request(&state, "").unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.body["id"], 1);
    }
}
