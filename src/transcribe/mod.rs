//! Streaming transcription adapter and session registry.

pub mod recognizer;
pub mod registry;
pub mod segment;

pub use recognizer::{
    MockRecognizer, MockScript, RecognizerSession, SpeechRecognizer, TranscriptEvent,
};
pub use registry::RecognizerRegistry;
pub use segment::TranscriptSegment;
