//! Stateful mock of a slice of the GitLab REST API
//!
//! The server answers three endpoints well enough to drive a release script
//! through its success and failure paths, and records every request it receives
//! so the test harness can assert on what the script actually sent:
//!
//! | Method | Path                                  | Success |
//! |--------|---------------------------------------|---------|
//! | GET    | `/api/v4/projects/:id_or_path`        | 200     |
//! | PUT    | `/api/v4/projects/:id_or_path`        | 200     |
//! | POST   | `/api/v4/projects/:id/merge_requests` | 201     |
//!
//! # Fault injection
//!
//! Creating `fail_auth`, `fail_not_found` or `fail_server` in the state
//! directory makes exactly one later request fail with 401, 404 or 500. The
//! same names in an `X-Mock-Scenario` header fail only that request.
//!
//! # In-process use
//!
//! ```no_run
//! use gitlab_mock::{MockServer, Scenario, ServerConfig};
//!
//! let running = MockServer::bind(&ServerConfig::with_state_dir("/tmp/mock"))?.spawn()?;
//! running.arm(Scenario::FailServer)?;
//! // ... point the client under test at running.api_url() ...
//! let requests = running.stop()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
mod handlers;
pub mod models;
pub mod router;
pub mod scenario;
pub mod server;
pub mod state;
pub mod state_dir;


pub use error::{ApiError, MockError, Result};
pub use models::{MergeRequest, Project, RecordedRequest};
pub use router::{ApiResponse, Router, RouterConfig};
pub use scenario::{Scenario, ScenarioGate, ScenarioSet, SCENARIO_HEADER};
pub use server::{MockServer, RunningServer, ServerConfig};
pub use state::MockState;
pub use state_dir::StateDir;
