//! Recording session states.

use std::fmt;

/// State of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// No session in progress; the device is released.
    Idle,
    /// Capturing audio and feeding the recognizer.
    Recording,
    /// Capture suspended; no frames are delivered, the recognizer is closed.
    Paused,
    /// Finalized: device released, transcript flushed, bundle available.
    Stopped,
    /// Persisting the finalized bundle.
    Uploading,
    /// Persistence failed; the bundle is retained for retry.
    Failed,
}

impl RecordingState {
    /// Whether a session (and the device handle) is live in this state.
    pub fn is_active(&self) -> bool {
        matches!(self, RecordingState::Recording | RecordingState::Paused)
    }

    /// Whether a finalized bundle may be present.
    pub fn has_bundle(&self) -> bool {
        matches!(
            self,
            RecordingState::Stopped | RecordingState::Uploading | RecordingState::Failed
        )
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordingState::Idle => "Idle",
            RecordingState::Recording => "Recording",
            RecordingState::Paused => "Paused",
            RecordingState::Stopped => "Stopped",
            RecordingState::Uploading => "Uploading",
            RecordingState::Failed => "Failed",
        };
        write!(f, "{name}")
    }
}
