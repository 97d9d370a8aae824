//! HTTP front end and process lifecycle
//!
//! Requests are pulled off the listener in arrival order and recorded on the
//! accept thread as soon as their headers are in, which fixes their position in
//! the log. The body is read and the request answered on a thread of its own.
//! When the shutdown flag is raised the loop stops accepting, gives in-flight
//! requests [`SHUTDOWN_GRACE`] to finish and writes `requests.json`.

use crate::error::{MockError, Result};
use crate::models::{Project, RecordedRequest};
use crate::router::{self, ApiResponse, Router, RouterConfig};
use crate::scenario::{Scenario, ScenarioGate};
use crate::state::MockState;
use crate::state_dir::StateDir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long shutdown waits for in-flight requests before writing the log anyway
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Everything needed to start a server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to listen on
    pub host: String,

    /// Port to listen on (0 lets the OS pick)
    pub port: u16,

    /// Directory for discovery files, scenario flags and the request log
    pub state_dir: PathBuf,

    /// Prefix stripped before route matching
    pub api_prefix: String,

    /// Header carrying the access token
    pub token_header: String,

    /// Initial project fixture
    pub project: Project,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let router = RouterConfig::default();
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            state_dir: std::env::temp_dir().join("mock_gitlab"),
            api_prefix: router.api_prefix,
            token_header: router.token_header,
            project: Project::default(),
        }
    }
}

impl ServerConfig {
    /// Default configuration rooted at `state_dir`
    pub fn with_state_dir(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            ..Self::default()
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            api_prefix: self.api_prefix.clone(),
            token_header: self.token_header.clone(),
        }
    }
}

/// A bound, not yet serving, mock server
pub struct MockServer {
    http: tiny_http::Server,
    addr: SocketAddr,
    router: Router,
    state_dir: StateDir,
}

impl MockServer {
    /// Create the state directory, bind the listener and publish `port` and `pid`
    pub fn bind(config: &ServerConfig) -> Result<Self> {
        let state_dir = StateDir::create(&config.state_dir)?;

        let bind_addr = format!("{}:{}", config.host, config.port);
        let http = tiny_http::Server::http(&bind_addr).map_err(|e| MockError::Bind {
            addr: bind_addr.clone(),
            message: e.to_string(),
        })?;
        let addr = http.server_addr().to_ip().ok_or_else(|| MockError::Bind {
            addr: bind_addr.clone(),
            message: "listener has no IP address".to_string(),
        })?;

        state_dir.write_port(addr.port())?;
        state_dir.write_pid(std::process::id())?;

        let router = Router::new(
            Arc::new(MockState::new(config.project.clone())),
            Arc::new(ScenarioGate::new(state_dir.path())),
            config.router_config(),
        );

        tracing::info!(%addr, state_dir = %state_dir.path().display(), "mock server bound");

        Ok(Self {
            http,
            addr,
            router,
            state_dir,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn state_dir(&self) -> &StateDir {
        &self.state_dir
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Serve until `shutdown` is set, then flush the request log
    pub fn run(self, shutdown: &AtomicBool) -> Result<()> {
        let mut workers: Vec<JoinHandle<()>> = Vec::new();

        while !shutdown.load(Ordering::Relaxed) {
            let mut request = match self.http.recv_timeout(POLL_INTERVAL) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!("accept error: {}", e);
                    continue;
                }
            };

            let mut recorded = read_head(&request);
            let slot = self.router.state().record(recorded.clone());

            workers.retain(|worker| !worker.is_finished());
            let router = self.router.clone();
            let spawned = thread::Builder::new()
                .name("mock-gitlab-request".to_string())
                .spawn(move || {
                    if router::carries_body(&recorded.method) {
                        recorded.body = read_body(&mut request);
                        router.state().fill_body(slot, recorded.body.clone());
                    }
                    let response = router.respond(&recorded);
                    write_response(request, response);
                });
            match spawned {
                Ok(worker) => workers.push(worker),
                Err(e) => tracing::error!("failed to spawn request thread: {}", e),
            }
        }

        tracing::info!(in_flight = workers.len(), "shutting down");
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while workers.iter().any(|worker| !worker.is_finished()) && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL);
        }
        let (finished, stalled): (Vec<_>, Vec<_>) =
            workers.into_iter().partition(|worker| worker.is_finished());
        for worker in finished {
            if worker.join().is_err() {
                tracing::warn!("request thread panicked");
            }
        }
        if !stalled.is_empty() {
            tracing::warn!(count = stalled.len(), "abandoning requests still in flight");
        }

        let path = self.state_dir.requests_file();
        self.router.state().write_requests(&path)?;
        tracing::info!(path = %path.display(), "request log written");
        Ok(())
    }

    /// Serve on a background thread
    pub fn spawn(self) -> Result<RunningServer> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let addr = self.addr;
        let api_prefix = self.router.config().api_prefix.clone();
        let state_dir = self.state_dir.clone();
        let state = Arc::clone(self.router.state());
        let gate = Arc::clone(self.router.gate());

        let flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("mock-gitlab-accept".to_string())
            .spawn(move || self.run(&flag))
            .map_err(MockError::Spawn)?;

        Ok(RunningServer {
            addr,
            api_prefix,
            state_dir,
            state,
            gate,
            shutdown,
            handle: Some(handle),
        })
    }
}

/// Handle to a server serving on a background thread. Dropping it stops the server.
pub struct RunningServer {
    addr: SocketAddr,
    api_prefix: String,
    state_dir: StateDir,
    state: Arc<MockState>,
    gate: Arc<ScenarioGate>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Base URL including the configured API prefix
    pub fn api_url(&self) -> String {
        format!("http://{}{}", self.addr, self.api_prefix)
    }

    pub fn state_dir(&self) -> &StateDir {
        &self.state_dir
    }

    pub fn state(&self) -> &MockState {
        &self.state
    }

    /// Arm a one-shot scenario flag
    pub fn arm(&self, scenario: Scenario) -> std::io::Result<()> {
        self.gate.arm(scenario)
    }

    /// Stop serving, write `requests.json` and return the request log
    pub fn stop(mut self) -> Result<Vec<RecordedRequest>> {
        self.shutdown_and_join()?;
        Ok(self.state.requests())
    }

    fn shutdown_and_join(&mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::Relaxed);
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| MockError::Panicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_and_join() {
            tracing::warn!("mock server did not shut down cleanly: {}", e);
        }
    }
}

/// Method, target and headers; the body is left on the socket
fn read_head(request: &tiny_http::Request) -> RecordedRequest {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for header in request.headers() {
        let name = header.field.as_str().as_str().to_string();
        let value = header.value.as_str();
        headers
            .entry(name)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    RecordedRequest::new(request.method().as_str(), request.url(), headers, "")
}

fn read_body(request: &mut tiny_http::Request) -> String {
    let mut bytes = Vec::new();
    if let Err(e) = request.as_reader().read_to_end(&mut bytes) {
        tracing::warn!("failed to read request body: {}", e);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn write_response(request: tiny_http::Request, response: ApiResponse) {
    let body = response.body.to_string().into_bytes();
    let mut http = tiny_http::Response::from_data(body).with_status_code(response.status);
    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => http.add_header(header),
        Err(()) => tracing::error!("invalid Content-Type header"),
    }
    if let Err(e) = request.respond(http) {
        tracing::warn!("failed to write response: {}", e);
    }
}
