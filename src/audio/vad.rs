//! Voice activity detection over the loudness stream.
//!
//! The detector maintains a rolling silence clock driven by frame durations,
//! never wall clock. Pausing a recording stops frame delivery, so the clock
//! cannot advance across a pause and cannot report a false long-silence
//! interval immediately after resume.

use crate::defaults;
use std::time::Duration;

/// Configuration for voice activity detection.
#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// Level above which the silence clock resets (0.0 to 1.0).
    pub speaking_threshold: f32,
    /// Level below which the silence clock accumulates (0.0 to 1.0).
    /// Levels between the two thresholds hold the clock steady.
    pub silence_threshold: f32,
    /// Sustained silence that raises the auto-stop signal (milliseconds).
    pub silence_duration_ms: u32,
    /// Minimum total recording duration before the first auto-stop may fire
    /// (milliseconds). Prevents an utterance shorter than the silence window
    /// from stopping the session almost instantly.
    pub min_recording_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            speaking_threshold: defaults::SPEAKING_THRESHOLD,
            silence_threshold: defaults::SILENCE_THRESHOLD,
            silence_duration_ms: defaults::SILENCE_DURATION_MS,
            min_recording_ms: defaults::MIN_RECORDING_MS,
        }
    }
}

/// Per-frame classification result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadFrameResult {
    /// Whether this frame's level crossed the speaking threshold.
    pub speaking: bool,
    /// Accumulated silence after this frame (milliseconds).
    pub silence_ms: u32,
    /// Set on the single frame where sustained silence triggers auto-stop.
    pub auto_stop: bool,
}

/// Voice activity detector.
///
/// Pure function of the delivered loudness samples and their durations;
/// holds no reference to the recording state. The orchestrator is
/// responsible for ignoring the auto-stop signal outside `Recording`.
pub struct VoiceActivityDetector {
    config: VadConfig,
    silence: Duration,
    total: Duration,
    fired: bool,
}

impl VoiceActivityDetector {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            silence: Duration::ZERO,
            total: Duration::ZERO,
            fired: false,
        }
    }

    /// Feed one frame's normalized level and duration.
    pub fn observe(&mut self, level: f32, frame: Duration) -> VadFrameResult {
        self.total += frame;

        let speaking = level >= self.config.speaking_threshold;
        if speaking {
            self.silence = Duration::ZERO;
        } else if level < self.config.silence_threshold {
            self.silence += frame;
        }
        // Between the thresholds the clock holds its value.

        let silence_reached =
            self.silence >= Duration::from_millis(self.config.silence_duration_ms as u64);
        let guard_passed =
            self.total >= Duration::from_millis(self.config.min_recording_ms as u64);

        let auto_stop = !self.fired && silence_reached && guard_passed;
        if auto_stop {
            self.fired = true;
        }

        VadFrameResult {
            speaking,
            silence_ms: self.silence.as_millis() as u32,
            auto_stop,
        }
    }

    /// Accumulated silence so far.
    pub fn silence(&self) -> Duration {
        self.silence
    }

    /// Total duration of all delivered frames.
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Resets the detector for a fresh recording.
    pub fn reset(&mut self) {
        self.silence = Duration::ZERO;
        self.total = Duration::ZERO;
        self.fired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(100);

    fn make_vad() -> VoiceActivityDetector {
        VoiceActivityDetector::new(VadConfig {
            speaking_threshold: 0.25,
            silence_threshold: 0.10,
            silence_duration_ms: 2000,
            min_recording_ms: 3000,
        })
    }

    fn feed(vad: &mut VoiceActivityDetector, level: f32, frames: u32) -> VadFrameResult {
        let mut last = VadFrameResult {
            speaking: false,
            silence_ms: 0,
            auto_stop: false,
        };
        for _ in 0..frames {
            last = vad.observe(level, FRAME);
            if last.auto_stop {
                return last;
            }
        }
        last
    }

    #[test]
    fn test_speech_resets_silence_clock() {
        let mut vad = make_vad();
        feed(&mut vad, 0.0, 10);
        assert_eq!(vad.silence(), Duration::from_millis(1000));

        let result = vad.observe(0.5, FRAME);
        assert!(result.speaking);
        assert_eq!(result.silence_ms, 0);
    }

    #[test]
    fn test_intermediate_level_holds_clock() {
        let mut vad = make_vad();
        feed(&mut vad, 0.0, 5);
        assert_eq!(vad.silence(), Duration::from_millis(500));

        // Between silence and speaking thresholds: no accumulation, no reset.
        let result = vad.observe(0.15, FRAME);
        assert!(!result.speaking);
        assert_eq!(result.silence_ms, 500);
    }

    #[test]
    fn test_auto_stop_after_sustained_silence() {
        let mut vad = make_vad();
        // 3s of speech, then silence.
        feed(&mut vad, 0.5, 30);
        let result = feed(&mut vad, 0.0, 25);
        assert!(result.auto_stop);
        assert_eq!(result.silence_ms, 2000);
        // Total at the stop frame: 3s speech + 2s silence.
        assert_eq!(vad.total(), Duration::from_millis(5000));
    }

    #[test]
    fn test_min_recording_guard_delays_first_auto_stop() {
        let mut vad = make_vad();
        // 0.5s of speech then silence: the 2s silence window elapses at
        // t=2.5s, but the 3s guard delays the signal to t=3.0s.
        feed(&mut vad, 0.5, 5);
        let result = feed(&mut vad, 0.0, 40);
        assert!(result.auto_stop);
        assert_eq!(vad.total(), Duration::from_millis(3000));
    }

    #[test]
    fn test_auto_stop_fires_once() {
        let mut vad = make_vad();
        feed(&mut vad, 0.5, 30);
        let result = feed(&mut vad, 0.0, 25);
        assert!(result.auto_stop);

        let again = vad.observe(0.0, FRAME);
        assert!(!again.auto_stop);
    }

    #[test]
    fn test_silence_only_never_stops_before_guard() {
        let mut vad = make_vad();
        let result = feed(&mut vad, 0.0, 29);
        assert!(!result.auto_stop);
        let result = vad.observe(0.0, FRAME);
        // 3s of pure silence: guard passed and window long since reached.
        assert!(result.auto_stop);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut vad = make_vad();
        feed(&mut vad, 0.5, 30);
        feed(&mut vad, 0.0, 25);

        vad.reset();
        assert_eq!(vad.silence(), Duration::ZERO);
        assert_eq!(vad.total(), Duration::ZERO);
        let result = vad.observe(0.0, FRAME);
        assert!(!result.auto_stop);
    }

    #[test]
    fn test_clock_does_not_advance_without_frames() {
        // A pause delivers no frames; the detector sees no time pass.
        let mut vad = make_vad();
        feed(&mut vad, 0.5, 30);
        feed(&mut vad, 0.0, 19);
        let before = vad.silence();

        // (no frames delivered here, nothing to call)

        let result = vad.observe(0.0, FRAME);
        assert_eq!(
            result.silence_ms,
            before.as_millis() as u32 + FRAME.as_millis() as u32
        );
    }

    #[test]
    fn test_speech_interrupting_silence_restarts_window() {
        let mut vad = make_vad();
        feed(&mut vad, 0.5, 30);
        feed(&mut vad, 0.0, 15); // 1.5s silence, below the 2s window
        feed(&mut vad, 0.5, 2); // brief speech resets the clock
        let result = feed(&mut vad, 0.0, 19);
        assert!(!result.auto_stop);
        let result = vad.observe(0.0, FRAME);
        assert!(result.auto_stop);
    }
}
