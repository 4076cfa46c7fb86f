//! Recording session orchestration.

pub mod machine;
pub mod reporter;
pub mod state;
pub mod timer;

pub use machine::{Recorder, RecorderConfig, RecorderDeps, RecordingBundle};
pub use reporter::{CollectingReporter, Incident, IncidentReporter, StderrReporter};
pub use state::RecordingState;
pub use timer::{Clock, MockClock, SessionTimer, SystemClock};
