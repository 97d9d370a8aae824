//! Discovery files shared with the test harness
//!
//! ```text
//! <state-dir>/
//! ├── port            # listening port, written once after bind
//! ├── pid             # server process id
//! ├── requests.json   # request log, written once at shutdown
//! └── fail_*          # scenario flags, created by the harness
//! ```

use crate::error::{MockError, Result};
use std::path::{Path, PathBuf};

pub const PORT_FILE: &str = "port";
pub const PID_FILE: &str = "pid";
pub const REQUESTS_FILE: &str = "requests.json";

#[derive(Debug, Clone)]
pub struct StateDir {
    path: PathBuf,
}

impl StateDir {
    /// Use `path` as the state directory, creating it if needed
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path).map_err(|e| MockError::StateDir(path.clone(), e))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn port_file(&self) -> PathBuf {
        self.path.join(PORT_FILE)
    }

    pub fn pid_file(&self) -> PathBuf {
        self.path.join(PID_FILE)
    }

    pub fn requests_file(&self) -> PathBuf {
        self.path.join(REQUESTS_FILE)
    }

    pub fn write_port(&self, port: u16) -> Result<()> {
        write(&self.port_file(), &port.to_string())
    }

    pub fn write_pid(&self, pid: u32) -> Result<()> {
        write(&self.pid_file(), &pid.to_string())
    }
}

fn write(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| MockError::Write(path.to_path_buf(), e))
}
