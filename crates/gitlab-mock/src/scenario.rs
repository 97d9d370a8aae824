//! One-shot fault injection
//!
//! A scenario is armed either by creating a flag file named after it in the
//! state directory (fires once, for whichever request reaches the check first)
//! or by naming it in the `X-Mock-Scenario` header (fires for that request only).

use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

/// Request header that arms scenarios for a single request
pub const SCENARIO_HEADER: &str = "X-Mock-Scenario";

/// A named fault the mock can inject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// Reject the next authenticated request as having an expired token
    FailAuth,
    /// Reject the next project lookup as missing
    FailNotFound,
    /// Reject the next authenticated request with a 500
    FailServer,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::FailAuth,
        Scenario::FailNotFound,
        Scenario::FailServer,
    ];

    /// Flag file name, also the name accepted in the scenario header
    pub fn name(self) -> &'static str {
        match self {
            Scenario::FailAuth => "fail_auth",
            Scenario::FailNotFound => "fail_not_found",
            Scenario::FailServer => "fail_server",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownScenario(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown scenario: {0}")]
pub struct UnknownScenario(pub String);

/// Scenarios armed for a single request via [`SCENARIO_HEADER`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioSet(Vec<Scenario>);

impl ScenarioSet {
    /// Parse a comma separated header value. Unknown names are skipped.
    pub fn from_header(value: &str) -> Self {
        let mut set = Vec::new();
        for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.parse::<Scenario>() {
                Ok(scenario) if !set.contains(&scenario) => set.push(scenario),
                Ok(_) => {}
                Err(e) => tracing::debug!("ignoring {}: {}", SCENARIO_HEADER, e),
            }
        }
        Self(set)
    }

    pub fn contains(&self, scenario: Scenario) -> bool {
        self.0.contains(&scenario)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Flag files in the state directory, consumed at most once each
#[derive(Debug)]
pub struct ScenarioGate {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl ScenarioGate {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn flag_path(&self, scenario: Scenario) -> PathBuf {
        self.dir.join(scenario.name())
    }

    /// Disarm `scenario` and report whether it was armed.
    ///
    /// The check and the removal are one `remove_file` call, serialized with
    /// every other consume, so two racing requests can never both see the flag.
    pub fn consume(&self, scenario: Scenario) -> bool {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let path = self.flag_path(scenario);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(scenario = %scenario, "scenario fired");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!("failed to consume {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Arm `scenario` by creating its flag file
    pub fn arm(&self, scenario: Scenario) -> std::io::Result<()> {
        std::fs::write(self.flag_path(scenario), b"")
    }

    pub fn is_armed(&self, scenario: Scenario) -> bool {
        self.flag_path(scenario).exists()
    }
}

/// Scenario sources seen by one request: its header first, then the flag files
#[derive(Debug)]
pub struct Triggers<'a> {
    gate: &'a ScenarioGate,
    header: ScenarioSet,
}

impl<'a> Triggers<'a> {
    pub fn new(gate: &'a ScenarioGate, header: ScenarioSet) -> Self {
        Self { gate, header }
    }

    /// A scenario named in the header fires without consuming its flag file
    pub fn fires(&self, scenario: Scenario) -> bool {
        if self.header.contains(scenario) {
            tracing::info!(scenario = %scenario, "scenario fired from {}", SCENARIO_HEADER);
            return true;
        }
        self.gate.consume(scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_scenario_names_round_trip() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.name().parse::<Scenario>().unwrap(), scenario);
        }
        assert!("fail_everything".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_header_parsing() {
        let set = ScenarioSet::from_header(" fail_server , bogus,FAIL_AUTH,,fail_server");
        assert!(set.contains(Scenario::FailServer));
        assert!(set.contains(Scenario::FailAuth));
        assert!(!set.contains(Scenario::FailNotFound));
        assert!(ScenarioSet::from_header("").is_empty());
    }

    #[test]
    fn test_consume_missing_flag_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let gate = ScenarioGate::new(dir.path());
        assert!(!gate.consume(Scenario::FailAuth));
    }

    #[test]
    fn test_consume_fires_once() {
        let dir = tempfile::tempdir().unwrap();
        let gate = ScenarioGate::new(dir.path());

        std::fs::write(dir.path().join("fail_auth"), "").unwrap();
        assert!(gate.consume(Scenario::FailAuth));
        assert!(!gate.consume(Scenario::FailAuth));
        assert!(!dir.path().join("fail_auth").exists());

        gate.arm(Scenario::FailAuth).unwrap();
        assert!(gate.is_armed(Scenario::FailAuth));
        assert!(gate.consume(Scenario::FailAuth));
    }

    #[test]
    fn test_flags_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let gate = ScenarioGate::new(dir.path());
        gate.arm(Scenario::FailServer).unwrap();

        assert!(!gate.consume(Scenario::FailAuth));
        assert!(!gate.consume(Scenario::FailNotFound));
        assert!(gate.is_armed(Scenario::FailServer));
        assert!(gate.consume(Scenario::FailServer));
    }

    #[test]
    fn test_header_trigger_leaves_flag_armed() {
        let dir = tempfile::tempdir().unwrap();
        let gate = ScenarioGate::new(dir.path());
        gate.arm(Scenario::FailServer).unwrap();

        let triggers = Triggers::new(&gate, ScenarioSet::from_header("fail_server"));
        assert!(triggers.fires(Scenario::FailServer));
        assert!(gate.is_armed(Scenario::FailServer));

        let triggers = Triggers::new(&gate, ScenarioSet::default());
        assert!(triggers.fires(Scenario::FailServer));
        assert!(!triggers.fires(Scenario::FailServer));
    }

    #[test]
    fn test_racing_consumers_fire_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(ScenarioGate::new(dir.path()));
        gate.arm(Scenario::FailServer).unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let fired = Arc::clone(&fired);
                thread::spawn(move || {
                    if gate.consume(Scenario::FailServer) {
                        fired.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
