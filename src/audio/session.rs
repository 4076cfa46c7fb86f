//! Audio capture session: exclusive ownership of the device handle.
//!
//! The session owns the microphone device for the lifetime of one recording
//! and polls it on a dedicated thread, fanning frames out to the orchestrator
//! over a bounded channel. The device handle is released on every exit path:
//! explicit stop, discard, fatal read errors, and drop.

use crate::audio::device::{AudioDevice, AudioFrame};
use crate::defaults;
use crate::error::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Consecutive read failures after which capture gives up.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Events delivered to the orchestrator by the capture thread.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A frame of captured audio.
    Frame(AudioFrame),
    /// Capture failed repeatedly; the device has been released.
    Fatal(String),
}

enum CaptureControl {
    Pause,
    Resume,
    Stop,
}

/// Owns the device handle and the polling thread for one recording.
pub struct AudioCaptureSession {
    ctrl_tx: Sender<CaptureControl>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl AudioCaptureSession {
    /// Starts the device and begins polling.
    ///
    /// Device acquisition failures are returned synchronously before any
    /// thread is spawned; the caller's state is untouched.
    pub fn start(mut device: Box<dyn AudioDevice>, events: Sender<CaptureEvent>) -> Result<Self> {
        device.start()?;
        let sample_rate = device.sample_rate();

        let (ctrl_tx, ctrl_rx) = bounded(8);
        let thread = thread::spawn(move || run_capture(device, ctrl_rx, events));

        Ok(Self {
            ctrl_tx,
            thread: Some(thread),
            sample_rate,
        })
    }

    /// Pauses the device stream; frame delivery stops entirely.
    pub fn pause(&self) {
        let _ = self.ctrl_tx.send(CaptureControl::Pause);
    }

    /// Resumes a paused stream.
    pub fn resume(&self) {
        let _ = self.ctrl_tx.send(CaptureControl::Resume);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Stops polling and releases the device. When this returns, the device
    /// handle is guaranteed to be released.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = self.ctrl_tx.send(CaptureControl::Stop);
            if handle.join().is_err() {
                eprintln!("callscribe: capture thread panicked");
            }
        }
    }
}

impl Drop for AudioCaptureSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_capture(
    mut device: Box<dyn AudioDevice>,
    ctrl_rx: Receiver<CaptureControl>,
    events: Sender<CaptureEvent>,
) {
    let poll_interval = Duration::from_millis(defaults::CAPTURE_POLL_MS);
    let sample_rate = device.sample_rate();
    let mut paused = false;
    let mut sequence: u64 = 0;
    let mut consecutive_errors: u32 = 0;

    loop {
        match ctrl_rx.recv_timeout(poll_interval) {
            Ok(CaptureControl::Pause) => {
                if !paused {
                    if let Err(e) = device.pause() {
                        eprintln!("callscribe: failed to pause capture: {e}");
                    }
                    paused = true;
                }
            }
            Ok(CaptureControl::Resume) => {
                if paused {
                    if let Err(e) = device.resume() {
                        eprintln!("callscribe: failed to resume capture: {e}");
                    }
                    paused = false;
                }
            }
            Ok(CaptureControl::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if paused {
                    continue;
                }

                let samples = match device.read_frame() {
                    Ok(s) => {
                        consecutive_errors = 0;
                        s
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                            let _ = events.try_send(CaptureEvent::Fatal(format!(
                                "audio capture failed {consecutive_errors} times in a row: {e}"
                            )));
                            break;
                        }
                        continue;
                    }
                };

                if samples.is_empty() {
                    // Normal at startup while the device initializes.
                    continue;
                }

                let frame = AudioFrame::new(samples, sequence, sample_rate);
                sequence += 1;

                match events.try_send(CaptureEvent::Frame(frame)) {
                    Err(e) if e.is_disconnected() => break,
                    // Channel full: drop the frame rather than block the
                    // capture path.
                    _ => {}
                }
            }
        }
    }

    if let Err(e) = device.stop() {
        eprintln!("callscribe: failed to stop capture device: {e}");
    }
}
