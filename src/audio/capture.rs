//! Real microphone capture using CPAL (Cross-Platform Audio Library).

use crate::audio::device::AudioDevice;
use crate::defaults;
use crate::error::{CallscribeError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Process-wide guard: the microphone handle has exactly one owner at a
/// time, so no two sessions may capture concurrently in the same process.
static DEVICE_IN_USE: AtomicBool = AtomicBool::new(false);

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends. The messages are harmless but confusing to users.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Preferred device names for desktop audio servers.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns to filter out (not useful for voice input).
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// List all available audio input devices with filtering and recommendations.
///
/// # Returns
/// A vector of device names, with preferred devices marked with "\[recommended\]".
/// Filters out obviously unusable devices (surround channels, HDMI, etc.).
pub fn list_devices() -> Result<Vec<String>> {
    let (host, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host.input_devices();
        (host, devices)
    });
    let _ = host; // keep host alive while iterating devices
    let devices = devices.map_err(|e| CallscribeError::Capture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                device_names.push(format!("{} [recommended]", name));
            } else {
                device_names.push(name);
            }
        }
    }

    Ok(device_names)
}

/// Find an input device, preferring PipeWire/PulseAudio when no name is given.
fn find_device(preferred_name: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Some(wanted) = preferred_name {
            if let Ok(devices) = host.input_devices() {
                for device in devices {
                    if let Ok(name) = device.name()
                        && name == wanted
                    {
                        return Ok(device);
                    }
                }
            }
            return Err(CallscribeError::DeviceNotFound {
                device: wanted.to_string(),
            });
        }

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| CallscribeError::DeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only accessed by the capture thread that owns the
/// `CpalAudioDevice`; its methods never cross thread boundaries concurrently.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Downmix interleaved f32 frames to mono and resample to the target rate.
///
/// Resampling is plain linear interpolation; per-callback phase is not
/// carried across buffers, which is inaudible at speech sample rates.
fn downmix_and_resample(input: &[f32], channels: u16, in_rate: u32, out_rate: u32) -> Vec<i16> {
    let channels = channels.max(1) as usize;
    let frames = input.len() / channels;
    if frames == 0 {
        return Vec::new();
    }

    let mono: Vec<f32> = (0..frames)
        .map(|i| {
            let start = i * channels;
            input[start..start + channels].iter().sum::<f32>() / channels as f32
        })
        .collect();

    if in_rate == out_rate {
        return mono
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .collect();
    }

    let ratio = in_rate as f64 / out_rate as f64;
    let out_len = (frames as f64 / ratio) as usize;
    (0..out_len)
        .map(|i| {
            let src = i as f64 * ratio;
            let idx = src as usize;
            let frac = (src - idx as f64) as f32;
            let a = mono[idx.min(frames - 1)];
            let b = mono[(idx + 1).min(frames - 1)];
            let sample = a + (b - a) * frac;
            (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
        })
        .collect()
}

/// Real microphone device backed by CPAL.
///
/// Produces 16-bit PCM mono at the configured sample rate regardless of the
/// hardware format (channel mixing + resampling happen in the callback).
pub struct CpalAudioDevice {
    device: cpal::Device,
    stream: Option<SendableStream>,
    buffer: Arc<Mutex<Vec<i16>>>,
    sample_rate: u32,
    holds_guard: bool,
}

impl CpalAudioDevice {
    /// Select a capture device by name, or the best default.
    pub fn new(preferred_name: Option<&str>) -> Result<Self> {
        let device = find_device(preferred_name)?;
        Ok(Self {
            device,
            stream: None,
            buffer: Arc::new(Mutex::new(Vec::new())),
            sample_rate: defaults::SAMPLE_RATE,
            holds_guard: false,
        })
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    fn build_stream(&mut self) -> Result<cpal::Stream> {
        let config = self
            .device
            .default_input_config()
            .map_err(|e| CallscribeError::DeviceAcquisition {
                message: format!("no usable input config: {e}"),
            })?;

        let channels = config.channels();
        let in_rate = config.sample_rate().0;
        let out_rate = self.sample_rate;
        let buffer = self.buffer.clone();
        let err_fn = |e| eprintln!("callscribe: capture stream error: {e}");

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &config.into(),
                    move |data: &[f32], _| {
                        let samples = downmix_and_resample(data, channels, in_rate, out_rate);
                        if let Ok(mut buf) = buffer.lock() {
                            buf.extend_from_slice(&samples);
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| CallscribeError::DeviceAcquisition {
                    message: format!("failed to open input stream: {e}"),
                })?,
            cpal::SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &config.into(),
                    move |data: &[i16], _| {
                        let as_f32: Vec<f32> =
                            data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                        let samples = downmix_and_resample(&as_f32, channels, in_rate, out_rate);
                        if let Ok(mut buf) = buffer.lock() {
                            buf.extend_from_slice(&samples);
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| CallscribeError::DeviceAcquisition {
                    message: format!("failed to open input stream: {e}"),
                })?,
            other => {
                return Err(CallscribeError::DeviceAcquisition {
                    message: format!("unsupported sample format: {other:?}"),
                });
            }
        };

        Ok(stream)
    }
}

impl AudioDevice for CpalAudioDevice {
    fn start(&mut self) -> Result<()> {
        if DEVICE_IN_USE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CallscribeError::DeviceAcquisition {
                message: "capture device already in use by another session".to_string(),
            });
        }
        self.holds_guard = true;

        let stream = match self.build_stream() {
            Ok(s) => s,
            Err(e) => {
                self.release_guard();
                return Err(e);
            }
        };
        if let Err(e) = stream.play() {
            self.release_guard();
            return Err(CallscribeError::DeviceAcquisition {
                message: format!("failed to start input stream: {e}"),
            });
        }
        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if let Some(SendableStream(stream)) = &self.stream {
            stream.pause().map_err(|e| CallscribeError::Capture {
                message: format!("failed to pause stream: {e}"),
            })?;
        }
        // Discard anything buffered before the pause took effect.
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if let Some(SendableStream(stream)) = &self.stream {
            stream.play().map_err(|e| CallscribeError::Capture {
                message: format!("failed to resume stream: {e}"),
            })?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.stream = None;
        self.release_guard();
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Vec<i16>> {
        let mut buf = self.buffer.lock().map_err(|_| CallscribeError::Capture {
            message: "capture buffer poisoned".to_string(),
        })?;
        Ok(std::mem::take(&mut *buf))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl CpalAudioDevice {
    fn release_guard(&mut self) {
        if self.holds_guard {
            DEVICE_IN_USE.store(false, Ordering::SeqCst);
            self.holds_guard = false;
        }
    }
}

impl Drop for CpalAudioDevice {
    fn drop(&mut self) {
        self.stream = None;
        self.release_guard();
    }
}
