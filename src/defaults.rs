//! Default configuration constants for callscribe.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// FFT window size (in samples) used by the level monitor.
///
/// Each captured frame is analyzed over a fixed 512-sample window so the
/// normalized level is independent of the frame length the device delivers.
pub const LEVEL_FFT_SIZE: usize = 512;

/// Mean spectral magnitude that maps to a full-scale level of 1.0.
///
/// Average bin magnitude of the half spectrum, after amplitude normalization,
/// divided by this ceiling and clamped gives the `[0,1]` level. 0.01 puts
/// a near-full-scale tone at ~0.4 and typical speech in the 0.1-0.5 range.
pub const LEVEL_CEILING: f32 = 0.01;

/// Normalized level above which a frame counts as speech.
///
/// Crossing this resets the silence clock of the voice activity detector.
pub const SPEAKING_THRESHOLD: f32 = 0.25;

/// Normalized level below which the silence clock accumulates.
///
/// Levels between this and [`SPEAKING_THRESHOLD`] hold the clock steady,
/// neither accumulating nor resetting.
pub const SILENCE_THRESHOLD: f32 = 0.10;

/// Sustained silence (milliseconds) that triggers an automatic stop.
///
/// 2000ms allows for natural pauses in conversation without prematurely
/// ending the recording.
pub const SILENCE_DURATION_MS: u32 = 2000;

/// Minimum total recording duration (milliseconds) before the first
/// auto-stop may fire.
///
/// Guards against a very short utterance followed by silence stopping the
/// session almost instantly. Deliberately conservative; configurable.
pub const MIN_RECORDING_MS: u32 = 3000;

/// Maximum duration of a single audio chunk (milliseconds).
///
/// A recording longer than this is split into sequential chunks at exact
/// sample boundaries; capture itself never stops at a boundary.
pub const MAX_CHUNK_MS: u32 = 300_000;

/// Bits per sample of the encoded chunk payload.
pub const WAV_BITS_PER_SAMPLE: u16 = 16;

/// Capture poll interval in milliseconds (~60Hz).
pub const CAPTURE_POLL_MS: u64 = 16;

/// How long to wait for the recognizer to flush its final result on stop.
pub const STOP_FLUSH_TIMEOUT_MS: u64 = 5000;
