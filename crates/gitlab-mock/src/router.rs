//! Request dispatch
//!
//! Every request is recorded before anything else happens. Authentication and
//! the global `fail_server` scenario run next, then the path is matched against
//! the three supported routes.

use crate::error::ApiError;
use crate::handlers;
use crate::models::RecordedRequest;
use crate::scenario::{Scenario, ScenarioGate, ScenarioSet, Triggers, SCENARIO_HEADER};
use crate::state::MockState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Routing settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouterConfig {
    /// Prefix stripped from the path before matching
    pub api_prefix: String,

    /// Header that must carry a non-empty credential
    pub token_header: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/api/v4".to_string(),
            token_header: "PRIVATE-TOKEN".to_string(),
        }
    }
}

/// JSON response produced by the router
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn json<T: Serialize>(status: u16, value: &T) -> Result<Self, ApiError> {
        let body = serde_json::to_value(value).map_err(|e| {
            tracing::error!("failed to serialize response: {}", e);
            ApiError::Internal
        })?;
        Ok(Self { status, body })
    }
}

impl From<ApiError> for ApiResponse {
    fn from(err: ApiError) -> Self {
        Self {
            status: err.status(),
            body: err.body(),
        }
    }
}

/// Methods whose body is read and recorded
pub fn carries_body(method: &str) -> bool {
    matches!(method, "POST" | "PUT" | "PATCH")
}

#[derive(Debug, PartialEq, Eq)]
enum Route {
    GetProject,
    UpdateProject,
    CreateMergeRequest,
}

impl Route {
    fn resolve(method: &str, path: &str) -> Option<Self> {
        match method {
            "GET" if path.starts_with("/projects/") => Some(Route::GetProject),
            "PUT" if path.starts_with("/projects/") => Some(Route::UpdateProject),
            "POST" if path.contains("/merge_requests") => Some(Route::CreateMergeRequest),
            _ => None,
        }
    }
}

/// Routes requests against one shared state and scenario gate
#[derive(Debug, Clone)]
pub struct Router {
    state: Arc<MockState>,
    gate: Arc<ScenarioGate>,
    config: RouterConfig,
}

impl Router {
    pub fn new(state: Arc<MockState>, gate: Arc<ScenarioGate>, config: RouterConfig) -> Self {
        Self {
            state,
            gate,
            config,
        }
    }

    pub fn state(&self) -> &Arc<MockState> {
        &self.state
    }

    pub fn gate(&self) -> &Arc<ScenarioGate> {
        &self.gate
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Record `request` and answer it
    pub fn dispatch(&self, request: RecordedRequest) -> ApiResponse {
        self.state.record(request.clone());
        self.respond(&request)
    }

    /// Answer an already recorded request. Never fails: every error becomes a response.
    pub fn respond(&self, request: &RecordedRequest) -> ApiResponse {
        let response = self.route(request).unwrap_or_else(ApiResponse::from);
        tracing::debug!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            "handled request"
        );
        response
    }

    fn route(&self, request: &RecordedRequest) -> Result<ApiResponse, ApiError> {
        let token = request.header(&self.config.token_header).unwrap_or_default();
        if token.is_empty() {
            return Err(ApiError::Unauthorized);
        }

        let header = request
            .header(SCENARIO_HEADER)
            .map(ScenarioSet::from_header)
            .unwrap_or_default();
        let triggers = Triggers::new(&self.gate, header);

        if triggers.fires(Scenario::FailAuth) {
            return Err(ApiError::TokenExpired);
        }
        if triggers.fires(Scenario::FailServer) {
            return Err(ApiError::Internal);
        }

        let path = self.route_path(&request.path);
        match Route::resolve(&request.method, path) {
            Some(Route::GetProject) => handlers::get_project(&self.state, &triggers, path),
            Some(Route::UpdateProject) => handlers::update_project(&self.state, &request.body),
            Some(Route::CreateMergeRequest) => {
                handlers::create_merge_request(&self.state, &request.body)
            }
            None => Err(ApiError::RouteNotFound {
                method: request.method.clone(),
                path: request.path.clone(),
            }),
        }
    }

    /// Path without query string and API prefix
    fn route_path<'p>(&self, raw: &'p str) -> &'p str {
        let path = raw.split_once('?').map_or(raw, |(path, _)| path);
        path.strip_prefix(self.config.api_prefix.as_str())
            .unwrap_or(path)
    }
}
