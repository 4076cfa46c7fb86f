//! Loudness monitoring over the capture stream.
//!
//! Converts each audio frame into a normalized `[0,1]` level from its
//! frequency-domain energy: the mean magnitude of the half spectrum divided
//! by a fixed ceiling, clamped. The level feeds both the UI meter and the
//! voice activity detector.

use crate::defaults;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Computes a normalized loudness value per frame.
///
/// Analysis always runs over a fixed [`defaults::LEVEL_FFT_SIZE`] window
/// (shorter frames are zero-padded, longer frames truncated) so the result
/// does not depend on the frame length the device happens to deliver.
pub struct LevelMonitor {
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    ceiling: f32,
}

impl LevelMonitor {
    /// Creates a monitor with the default ceiling.
    pub fn new() -> Self {
        Self::with_ceiling(defaults::LEVEL_CEILING)
    }

    /// Creates a monitor with a custom magnitude ceiling.
    pub fn with_ceiling(ceiling: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(defaults::LEVEL_FFT_SIZE);
        Self {
            fft,
            buffer: vec![Complex::new(0.0, 0.0); defaults::LEVEL_FFT_SIZE],
            ceiling,
        }
    }

    /// Returns the normalized level of one frame, in `[0,1]`.
    pub fn process(&mut self, samples: &[i16]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }

        let n = defaults::LEVEL_FFT_SIZE;
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let value = samples
                .get(i)
                .map(|&s| s as f32 / i16::MAX as f32)
                .unwrap_or(0.0);
            *slot = Complex::new(value, 0.0);
        }

        self.fft.process(&mut self.buffer);

        // Mean magnitude over bins 1..=N/2 (skip DC), normalized so a
        // full-scale tone in a single bin contributes magnitude 1.0.
        let half = n / 2;
        let sum: f32 = self.buffer[1..=half]
            .iter()
            .map(|c| c.norm() * 2.0 / n as f32)
            .sum();
        let mean = sum / half as f32;

        (mean / self.ceiling).clamp(0.0, 1.0)
    }
}

impl Default for LevelMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sine at an exact FFT bin so energy lands in a single bin.
    fn make_tone(bin: usize, amplitude: f32, len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let phase =
                    2.0 * std::f32::consts::PI * bin as f32 * i as f32
                        / defaults::LEVEL_FFT_SIZE as f32;
                (amplitude * phase.sin() * i16::MAX as f32) as i16
            })
            .collect()
    }

    #[test]
    fn test_silence_is_zero() {
        let mut monitor = LevelMonitor::new();
        assert_eq!(monitor.process(&vec![0i16; 512]), 0.0);
    }

    #[test]
    fn test_empty_frame_is_zero() {
        let mut monitor = LevelMonitor::new();
        assert_eq!(monitor.process(&[]), 0.0);
    }

    #[test]
    fn test_tone_level_matches_expectation() {
        let mut monitor = LevelMonitor::new();
        // A bin-aligned tone of amplitude A yields mean magnitude A / (N/2),
        // so level ≈ A / (256 * 0.01) = A * 0.39.
        let level = monitor.process(&make_tone(8, 0.9, 512));
        assert!(
            (0.30..0.42).contains(&level),
            "expected ~0.35, got {}",
            level
        );
    }

    #[test]
    fn test_level_is_monotonic_in_amplitude() {
        let mut monitor = LevelMonitor::new();
        let quiet = monitor.process(&make_tone(8, 0.2, 512));
        let loud = monitor.process(&make_tone(8, 0.8, 512));
        assert!(loud > quiet);
    }

    #[test]
    fn test_level_is_clamped_to_one() {
        let mut monitor = LevelMonitor::with_ceiling(0.0001);
        let level = monitor.process(&make_tone(8, 1.0, 512));
        assert_eq!(level, 1.0);
    }

    #[test]
    fn test_level_independent_of_frame_length() {
        // Frames longer than the analysis window yield the same level
        // as the window-sized prefix.
        let mut monitor = LevelMonitor::new();
        let short = monitor.process(&make_tone(8, 0.6, 512));
        let long = monitor.process(&make_tone(8, 0.6, 1600));
        assert!((short - long).abs() < 1e-4);
    }

    #[test]
    fn test_short_frame_is_zero_padded() {
        let mut monitor = LevelMonitor::new();
        let short = monitor.process(&make_tone(8, 0.6, 256));
        assert!(short > 0.0);
        assert!(short <= 1.0);
    }
}
