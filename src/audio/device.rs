use crate::defaults;
use crate::error::{CallscribeError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// A frame of raw audio samples delivered by the capture thread.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// PCM samples (16-bit signed integers), mono.
    pub samples: Vec<i16>,
    /// Sequence number for ordering and gap detection.
    pub sequence: u64,
    /// Duration covered by this frame, derived from the sample count.
    pub duration: Duration,
}

impl AudioFrame {
    /// Creates a new frame, deriving the duration from the sample count.
    pub fn new(samples: Vec<i16>, sequence: u64, sample_rate: u32) -> Self {
        let duration = if sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(samples.len() as u64 * 1_000_000_000 / sample_rate as u64)
        };
        Self {
            samples,
            sequence,
            duration,
        }
    }
}

/// Trait for microphone capture devices.
///
/// This trait allows swapping implementations (real audio device vs mock).
/// Exactly one owner holds the handle at a time; the capture session that
/// starts the device is responsible for stopping it on every exit path.
pub trait AudioDevice: Send {
    /// Open the device and start capturing.
    fn start(&mut self) -> Result<()>;

    /// Pause the capture stream. No samples are produced while paused.
    fn pause(&mut self) -> Result<()>;

    /// Resume a paused capture stream.
    fn resume(&mut self) -> Result<()>;

    /// Stop capturing and release the device handle.
    fn stop(&mut self) -> Result<()>;

    /// Read buffered audio samples. May return an empty vector when no
    /// samples have arrived yet.
    fn read_frame(&mut self) -> Result<Vec<i16>>;

    /// Sample rate of the frames this device produces.
    fn sample_rate(&self) -> u32;
}

/// A phase of scripted frames for the mock device.
#[derive(Debug, Clone)]
pub struct FramePhase {
    pub samples: Vec<i16>,
    pub count: u32,
}

/// Cloneable view of a mock device's lifecycle, usable after the device
/// itself has been moved into a capture session.
#[derive(Debug, Clone, Default)]
pub struct MockDeviceProbe {
    started: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    frames_read: Arc<AtomicU32>,
}

impl MockDeviceProbe {
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// True once `stop()` has run (the handle is released).
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn frames_read(&self) -> u32 {
        self.frames_read.load(Ordering::SeqCst)
    }
}

/// Mock audio device for testing.
pub struct MockAudioDevice {
    phases: Vec<FramePhase>,
    phase_index: usize,
    phase_remaining: u32,
    sample_rate: u32,
    should_fail_start: bool,
    should_fail_read: bool,
    error_message: String,
    probe: MockDeviceProbe,
}

impl MockAudioDevice {
    /// Create a new mock device that returns empty frames.
    pub fn new() -> Self {
        Self {
            phases: Vec::new(),
            phase_index: 0,
            phase_remaining: 0,
            sample_rate: defaults::SAMPLE_RATE,
            should_fail_start: false,
            should_fail_read: false,
            error_message: "mock device error".to_string(),
            probe: MockDeviceProbe::default(),
        }
    }

    /// Script a sequence of frame phases. Once exhausted, reads return empty.
    pub fn with_frame_phases(mut self, phases: Vec<FramePhase>) -> Self {
        self.phase_remaining = phases.first().map(|p| p.count).unwrap_or(0);
        self.phases = phases;
        self.phase_index = 0;
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on read.
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures.
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Lifecycle probe that stays valid after the device is moved.
    pub fn probe(&self) -> MockDeviceProbe {
        self.probe.clone()
    }
}

impl Default for MockAudioDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDevice for MockAudioDevice {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(CallscribeError::DeviceAcquisition {
                message: self.error_message.clone(),
            });
        }
        self.probe.started.store(true, Ordering::SeqCst);
        self.probe.released.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.probe.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.probe.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.probe.started.store(false, Ordering::SeqCst);
        self.probe.released.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            return Err(CallscribeError::Capture {
                message: self.error_message.clone(),
            });
        }
        self.probe.frames_read.fetch_add(1, Ordering::SeqCst);

        while self.phase_index < self.phases.len() {
            if self.phase_remaining > 0 {
                self.phase_remaining -= 1;
                return Ok(self.phases[self.phase_index].samples.clone());
            }
            self.phase_index += 1;
            self.phase_remaining = self
                .phases
                .get(self.phase_index)
                .map(|p| p.count)
                .unwrap_or(0);
        }
        Ok(Vec::new())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
