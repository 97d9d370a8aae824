use std::path::PathBuf;
use thiserror::Error;

/// Errors answered to the client. Each maps to a status code and a GitLab-style
/// `{"message": ...}` body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("401 Unauthorized")]
    Unauthorized,

    #[error("401 Unauthorized - token expired")]
    TokenExpired,

    #[error("404 Project Not Found")]
    ProjectLookupFailed,

    #[error("404 Project Not Found: {0}")]
    ProjectNotFound(String),

    #[error("404 Not Found: {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("400 Bad Request: invalid JSON")]
    InvalidJson,

    #[error("500 Internal Server Error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Unauthorized | ApiError::TokenExpired => 401,
            ApiError::ProjectLookupFailed
            | ApiError::ProjectNotFound(_)
            | ApiError::RouteNotFound { .. } => 404,
            ApiError::InvalidJson => 400,
            ApiError::Internal => 500,
        }
    }

    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({ "message": self.to_string() })
    }
}

/// Errors that stop the server from starting or from flushing its state
#[derive(Error, Debug)]
pub enum MockError {
    #[error("Failed to create state directory {0}: {1}")]
    StateDir(PathBuf, std::io::Error),

    #[error("Failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("Failed to write {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to start server thread: {0}")]
    Spawn(std::io::Error),

    #[error("Server thread panicked")]
    Panicked,
}

pub type Result<T> = std::result::Result<T, MockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_status_and_message() {
        assert_eq!(ApiError::Unauthorized.status(), 401);
        assert_eq!(
            ApiError::TokenExpired.body()["message"],
            "401 Unauthorized - token expired"
        );
        assert_eq!(ApiError::ProjectNotFound("nope".into()).status(), 404);
        assert_eq!(
            ApiError::ProjectNotFound("nope".into()).to_string(),
            "404 Project Not Found: nope"
        );
        let err = ApiError::RouteNotFound {
            method: "DELETE".into(),
            path: "/api/v4/projects/1".into(),
        };
        assert_eq!(err.to_string(), "404 Not Found: DELETE /api/v4/projects/1");
        assert_eq!(ApiError::InvalidJson.status(), 400);
        assert_eq!(ApiError::Internal.status(), 500);
    }
}
