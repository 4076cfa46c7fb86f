//! Audio capture, level monitoring, voice activity detection and chunking.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod chunk;
pub mod device;
pub mod encoder;
pub mod level;
pub mod session;
pub mod vad;

pub use chunk::{AudioChunk, ChunkScheduler, ClosedChunk};
pub use device::{AudioDevice, AudioFrame, MockAudioDevice};
pub use encoder::{ChunkEncoder, WavChunkEncoder};
pub use level::LevelMonitor;
pub use session::{AudioCaptureSession, CaptureEvent};
pub use vad::{VadConfig, VadFrameResult, VoiceActivityDetector};
