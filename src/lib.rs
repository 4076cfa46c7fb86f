//! callscribe - conversation capture and real-time transcription pipeline.
//!
//! Records employee-customer conversations: microphone capture with voice
//! activity detection, auto-chunking, live transcript assembly, and a
//! persist step that tolerates downstream-analysis failure.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod persist;
pub mod session;
pub mod transcribe;

// Core seams (device → session → persist)
pub use audio::device::AudioDevice;
pub use audio::encoder::ChunkEncoder;
pub use persist::analyzer::ConversationAnalyzer;
pub use persist::store::{MetadataStore, ObjectStore};
pub use transcribe::recognizer::SpeechRecognizer;

// Orchestration
pub use session::machine::{Recorder, RecorderConfig, RecorderDeps, RecordingBundle};
pub use session::state::RecordingState;

// Persistence
pub use persist::persister::ConversationPersister;
pub use persist::record::{ConversationRecord, RecordId, RecordStatus};

// Error handling
pub use error::{CallscribeError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }
}
