//! Incident reporting for the recording session.
//!
//! Non-fatal conditions (ignored pause/resume, flush timeouts) are reported
//! rather than returned as errors; fatal conditions additionally drive a
//! state transition.

use std::fmt;
use std::sync::Mutex;

/// A reportable condition inside the session.
#[derive(Debug, Clone)]
pub enum Incident {
    /// The session continues; the caller sees a no-op.
    Recoverable(String),
    /// The session is being torn down.
    Fatal(String),
}

impl fmt::Display for Incident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Incident::Recoverable(msg) => write!(f, "Recoverable: {}", msg),
            Incident::Fatal(msg) => write!(f, "Fatal: {}", msg),
        }
    }
}

/// Trait for reporting session incidents.
pub trait IncidentReporter: Send + Sync {
    fn report(&self, source: &str, incident: &Incident);
}

/// Reporter that logs to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrReporter;

impl IncidentReporter for StderrReporter {
    fn report(&self, source: &str, incident: &Incident) {
        eprintln!("callscribe: [{}] {}", source, incident);
    }
}

/// Reporter that collects incidents for inspection in tests.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    incidents: Mutex<Vec<(String, String)>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incidents(&self) -> Vec<(String, String)> {
        self.incidents
            .lock()
            .map(|i| i.clone())
            .unwrap_or_default()
    }
}

impl IncidentReporter for CollectingReporter {
    fn report(&self, source: &str, incident: &Incident) {
        if let Ok(mut incidents) = self.incidents.lock() {
            incidents.push((source.to_string(), incident.to_string()));
        }
    }
}
