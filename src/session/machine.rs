//! Recording state machine.
//!
//! An explicit FSM object with message passing: commands from the caller,
//! frames from the capture thread and events from the recognizer all arrive
//! on channels and are merged by one event-loop thread. That loop is the
//! single writer of session state; producers never reach into it directly.

use crate::audio::chunk::{AudioChunk, ChunkScheduler, ClosedChunk};
use crate::audio::device::AudioDevice;
use crate::audio::encoder::{ChunkEncoder, WavChunkEncoder, encode_chunk};
use crate::audio::level::LevelMonitor;
use crate::audio::session::{AudioCaptureSession, CaptureEvent};
use crate::audio::vad::{VadConfig, VoiceActivityDetector};
use crate::config::Config;
use crate::defaults;
use crate::error::{CallscribeError, Result};
use crate::persist::{ConversationPersister, RecordId};
use crate::session::reporter::{Incident, IncidentReporter, StderrReporter};
use crate::session::state::RecordingState;
use crate::session::timer::{Clock, SessionTimer, SystemClock};
use crate::transcribe::recognizer::{SpeechRecognizer, TranscriptEvent};
use crate::transcribe::registry::RecognizerRegistry;
use crate::transcribe::segment::TranscriptSegment;
use crossbeam_channel::{Receiver, Sender, bounded, never, select, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Factory producing a fresh device handle for each recording.
pub type DeviceFactory = Box<dyn Fn() -> Result<Box<dyn AudioDevice>> + Send>;

/// Recorder tuning derived from the configuration file.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub vad: VadConfig,
    pub max_chunk_ms: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            vad: VadConfig::default(),
            max_chunk_ms: defaults::MAX_CHUNK_MS,
        }
    }
}

impl From<&Config> for RecorderConfig {
    fn from(config: &Config) -> Self {
        Self {
            vad: VadConfig {
                speaking_threshold: config.vad.speaking_threshold,
                silence_threshold: config.vad.silence_threshold,
                silence_duration_ms: config.vad.silence_duration_ms,
                min_recording_ms: config.vad.min_recording_ms,
            },
            max_chunk_ms: config.chunking.max_chunk_ms,
        }
    }
}

/// Collaborators of the recorder.
pub struct RecorderDeps {
    pub device_factory: DeviceFactory,
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
    pub encoder: Arc<dyn ChunkEncoder>,
    pub clock: Arc<dyn Clock>,
    pub reporter: Arc<dyn IncidentReporter>,
    pub config: RecorderConfig,
}

impl RecorderDeps {
    pub fn new<F>(device_factory: F, config: RecorderConfig) -> Self
    where
        F: Fn() -> Result<Box<dyn AudioDevice>> + Send + 'static,
    {
        Self {
            device_factory: Box::new(device_factory),
            recognizer: None,
            encoder: Arc::new(WavChunkEncoder::new()),
            clock: Arc::new(SystemClock),
            reporter: Arc::new(StderrReporter),
            config,
        }
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn ChunkEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn IncidentReporter>) -> Self {
        self.reporter = reporter;
        self
    }
}

/// Final artifacts of a stopped recording.
///
/// Available once both producers have shut down cleanly: the device is
/// released and the recognizer has flushed its final result.
#[derive(Debug, Clone)]
pub struct RecordingBundle {
    pub transcript: String,
    pub chunks: Vec<AudioChunk>,
    pub duration: Duration,
}

enum Command {
    Start(Sender<Result<()>>),
    Pause(Sender<Result<()>>),
    Resume(Sender<Result<()>>),
    Stop(Sender<Result<()>>),
    Discard(Sender<Result<()>>),
    Snapshot(Sender<Result<RecordingBundle>>),
    BeginUpload(Sender<Result<RecordingBundle>>),
    FinishUpload {
        success: bool,
        reply: Sender<Result<()>>,
    },
    Shutdown,
}

type StateListener = Box<dyn Fn(RecordingState) + Send + Sync>;

struct SharedState {
    state: Mutex<RecordingState>,
    level_bits: AtomicU32,
    live_transcript: Mutex<String>,
    last_error: Mutex<Option<String>>,
    listeners: Mutex<Vec<StateListener>>,
    timer: Mutex<Option<SessionTimer>>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            state: Mutex::new(RecordingState::Idle),
            level_bits: AtomicU32::new(0),
            live_transcript: Mutex::new(String::new()),
            last_error: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            timer: Mutex::new(None),
        }
    }
}

/// Public facade of the recording state machine.
///
/// All mutating calls are forwarded to the event loop and answered
/// synchronously; queries read shared snapshots that only the loop writes.
pub struct Recorder {
    cmd_tx: Sender<Command>,
    shared: Arc<SharedState>,
    loop_thread: Option<JoinHandle<()>>,
}

impl Recorder {
    pub fn new(deps: RecorderDeps) -> Self {
        let shared = Arc::new(SharedState::default());
        let (cmd_tx, cmd_rx) = unbounded();

        let loop_shared = shared.clone();
        let loop_thread = thread::spawn(move || {
            Orchestrator::new(deps, loop_shared, cmd_rx).run();
        });

        Self {
            cmd_tx,
            shared,
            loop_thread: Some(loop_thread),
        }
    }

    /// Acquire the device, open a transcription session and begin recording.
    ///
    /// Fails with `DeviceAcquisition` (state stays `Idle`) if the microphone
    /// cannot be opened.
    pub fn start(&self) -> Result<()> {
        self.roundtrip(Command::Start)
    }

    /// Suspend capture. A reported no-op outside `Recording`.
    pub fn pause(&self) -> Result<()> {
        self.roundtrip(Command::Pause)
    }

    /// Resume a paused recording with a fresh transcription session.
    pub fn resume(&self) -> Result<()> {
        self.roundtrip(Command::Resume)
    }

    /// Finalize the recording. Idempotent once `Stopped`.
    pub fn stop(&self) -> Result<()> {
        self.roundtrip(Command::Stop)
    }

    /// Hard cancellation from any state; releases the device immediately.
    /// Idempotent.
    pub fn discard(&self) -> Result<()> {
        self.roundtrip(Command::Discard)
    }

    /// Clone of the finalized bundle (valid in `Stopped` and `Failed`).
    pub fn bundle(&self) -> Result<RecordingBundle> {
        self.roundtrip(Command::Snapshot)
    }

    /// Persist the finalized bundle and fire analysis enrichment.
    ///
    /// On success the session is released and the state returns to `Idle`;
    /// on persistence failure the bundle is retained and the state moves to
    /// `Failed` so the call can be retried. An empty transcript is rejected
    /// before the upload begins and leaves the state untouched.
    pub async fn persist(
        &self,
        persister: &ConversationPersister,
        owner_id: &str,
        participant_id: &str,
    ) -> Result<RecordId> {
        let bundle = self.roundtrip(Command::BeginUpload)?;
        let result = persister
            .persist(
                owner_id,
                participant_id,
                &bundle.transcript,
                &bundle.chunks,
                bundle.duration,
            )
            .await;

        let success = result.is_ok();
        self.roundtrip(|reply| Command::FinishUpload { success, reply })?;
        result
    }

    /// Current session state.
    pub fn state(&self) -> RecordingState {
        self.shared
            .state
            .lock()
            .map(|s| *s)
            .unwrap_or(RecordingState::Idle)
    }

    /// Latest normalized audio level in `[0,1]`.
    pub fn audio_level(&self) -> f32 {
        f32::from_bits(self.shared.level_bits.load(Ordering::Relaxed))
    }

    /// Cumulative transcript so far, including the live partial segment.
    pub fn live_transcript(&self) -> String {
        self.shared
            .live_transcript
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    /// Last fatal condition recorded by the session, if any.
    pub fn last_error(&self) -> Option<String> {
        self.shared
            .last_error
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Elapsed recording time, excluding all paused intervals.
    pub fn elapsed(&self) -> Duration {
        self.shared
            .timer
            .lock()
            .ok()
            .and_then(|t| t.as_ref().map(|t| t.elapsed()))
            .unwrap_or(Duration::ZERO)
    }

    /// Register a state-change listener.
    ///
    /// Listeners run on the event-loop thread and must not call back into
    /// the recorder synchronously; hand off to a channel instead.
    pub fn on_state_change<F>(&self, listener: F)
    where
        F: Fn(RecordingState) + Send + Sync + 'static,
    {
        if let Ok(mut listeners) = self.shared.listeners.lock() {
            listeners.push(Box::new(listener));
        }
    }

    fn roundtrip<T>(&self, make: impl FnOnce(Sender<Result<T>>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = bounded(1);
        self.cmd_tx
            .send(make(reply_tx))
            .map_err(|_| CallscribeError::Other("recorder loop terminated".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| CallscribeError::Other("recorder loop terminated".to_string()))?
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        if let Some(handle) = self.loop_thread.take()
            && handle.join().is_err()
        {
            eprintln!("callscribe: recorder loop panicked");
        }
    }
}

/// Live resources of one recording.
struct ActiveCapture {
    capture: AudioCaptureSession,
    audio_rx: Receiver<CaptureEvent>,
    transcript_rx: Receiver<TranscriptEvent>,
    transcript_tx: Sender<TranscriptEvent>,
    level: LevelMonitor,
    vad: VoiceActivityDetector,
    chunker: ChunkScheduler,
}

struct Orchestrator {
    deps: RecorderDeps,
    shared: Arc<SharedState>,
    cmd_rx: Receiver<Command>,
    registry: RecognizerRegistry,
    active: Option<ActiveCapture>,
    finalized: Vec<TranscriptSegment>,
    live: TranscriptSegment,
    chunks: Vec<AudioChunk>,
    bundle: Option<RecordingBundle>,
}

impl Orchestrator {
    fn new(deps: RecorderDeps, shared: Arc<SharedState>, cmd_rx: Receiver<Command>) -> Self {
        Self {
            deps,
            shared,
            cmd_rx,
            registry: RecognizerRegistry::new(),
            active: None,
            finalized: Vec::new(),
            live: TranscriptSegment::new(0),
            chunks: Vec::new(),
            bundle: None,
        }
    }

    fn run(mut self) {
        loop {
            // Local clones keep the select free of borrows into self, so the
            // arms can mutate session state.
            let cmd_rx = self.cmd_rx.clone();
            let (audio_rx, transcript_rx) = match &self.active {
                Some(active) => (active.audio_rx.clone(), active.transcript_rx.clone()),
                None => (never(), never()),
            };

            select! {
                recv(cmd_rx) -> cmd => match cmd {
                    Ok(command) => {
                        if self.handle_command(command) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(audio_rx) -> event => {
                    if let Ok(event) = event {
                        self.handle_audio(event);
                    }
                },
                recv(transcript_rx) -> event => {
                    if let Ok(event) = event {
                        self.handle_transcript(event);
                    }
                },
            }
        }

        // The loop owns the session; releasing it here covers every exit path.
        self.handle_discard();
    }

    /// Returns true when the loop should shut down.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Start(reply) => {
                let _ = reply.send(self.handle_start());
            }
            Command::Pause(reply) => {
                let _ = reply.send(self.handle_pause());
            }
            Command::Resume(reply) => {
                let _ = reply.send(self.handle_resume());
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.handle_stop());
            }
            Command::Discard(reply) => {
                self.handle_discard();
                let _ = reply.send(Ok(()));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.handle_snapshot());
            }
            Command::BeginUpload(reply) => {
                let _ = reply.send(self.handle_begin_upload());
            }
            Command::FinishUpload { success, reply } => {
                let _ = reply.send(self.handle_finish_upload(success));
            }
            Command::Shutdown => return true,
        }
        false
    }

    fn handle_start(&mut self) -> Result<()> {
        let state = self.state();
        if state != RecordingState::Idle {
            return Err(CallscribeError::InvalidState {
                operation: "start".to_string(),
                state: state.to_string(),
            });
        }

        let device = (self.deps.device_factory)()?;

        let (audio_tx, audio_rx) = bounded(1024);
        let capture = AudioCaptureSession::start(device, audio_tx)?;
        let sample_rate = capture.sample_rate();

        let (transcript_tx, transcript_rx) = bounded(256);
        if let Some(recognizer) = self.deps.recognizer.clone()
            && let Err(e) = self
                .registry
                .start_session(recognizer.as_ref(), transcript_tx.clone())
        {
            capture.stop();
            return Err(e);
        }

        self.active = Some(ActiveCapture {
            capture,
            audio_rx,
            transcript_rx,
            transcript_tx,
            level: LevelMonitor::new(),
            vad: VoiceActivityDetector::new(self.deps.config.vad),
            chunker: ChunkScheduler::new(self.deps.config.max_chunk_ms, sample_rate),
        });
        self.finalized.clear();
        self.live = TranscriptSegment::new(0);
        self.chunks.clear();
        self.bundle = None;

        if let Ok(mut timer) = self.shared.timer.lock() {
            *timer = Some(SessionTimer::start(self.deps.clock.clone()));
        }
        if let Ok(mut error) = self.shared.last_error.lock() {
            *error = None;
        }
        self.shared.level_bits.store(0, Ordering::Relaxed);
        self.update_live_transcript();
        self.set_state(RecordingState::Recording);
        Ok(())
    }

    fn handle_pause(&mut self) -> Result<()> {
        let state = self.state();
        if state != RecordingState::Recording {
            self.deps.reporter.report(
                "recorder",
                &Incident::Recoverable(format!("pause ignored in state {state}")),
            );
            return Ok(());
        }

        if let Some(active) = &self.active {
            active.capture.pause();
        }
        // The transcription session is fully torn down, not muted: stale
        // partial buffers must not bleed into the post-resume transcript.
        let transcript_rx = self.active.as_ref().map(|a| a.transcript_rx.clone());
        if let Some(rx) = transcript_rx {
            self.close_transcription_segment(&rx);
        }

        if let Ok(mut timer) = self.shared.timer.lock()
            && let Some(timer) = timer.as_mut()
        {
            timer.pause();
        }
        self.set_state(RecordingState::Paused);
        Ok(())
    }

    fn handle_resume(&mut self) -> Result<()> {
        let state = self.state();
        if state != RecordingState::Paused {
            self.deps.reporter.report(
                "recorder",
                &Incident::Recoverable(format!("resume ignored in state {state}")),
            );
            return Ok(());
        }

        if let Some(active) = &self.active {
            active.capture.resume();
        }

        let transcript_tx = self.active.as_ref().map(|a| a.transcript_tx.clone());
        if let Some(recognizer) = self.deps.recognizer.clone()
            && let Some(tx) = transcript_tx
            && let Err(e) = self.registry.start_session(recognizer.as_ref(), tx)
        {
            self.record_error(&e.to_string());
            self.deps
                .reporter
                .report("transcription", &Incident::Fatal(e.to_string()));
            self.do_stop();
            return Err(e);
        }

        if let Ok(mut timer) = self.shared.timer.lock()
            && let Some(timer) = timer.as_mut()
        {
            timer.resume();
        }
        self.set_state(RecordingState::Recording);
        Ok(())
    }

    fn handle_stop(&mut self) -> Result<()> {
        match self.state() {
            RecordingState::Recording | RecordingState::Paused => {
                self.do_stop();
                Ok(())
            }
            // Idempotent once stopped.
            RecordingState::Stopped => Ok(()),
            state => {
                self.deps.reporter.report(
                    "recorder",
                    &Incident::Recoverable(format!("stop ignored in state {state}")),
                );
                Ok(())
            }
        }
    }

    fn handle_discard(&mut self) {
        if let Some(active) = self.active.take() {
            // Joins the capture thread; the device is released when this returns.
            active.capture.stop();
        }
        self.registry.stop_active();

        self.bundle = None;
        self.chunks.clear();
        self.finalized.clear();
        self.live = TranscriptSegment::new(0);

        if let Ok(mut timer) = self.shared.timer.lock() {
            *timer = None;
        }
        self.shared.level_bits.store(0, Ordering::Relaxed);
        self.update_live_transcript();

        if self.state() != RecordingState::Idle {
            self.set_state(RecordingState::Idle);
        }
    }

    fn handle_snapshot(&mut self) -> Result<RecordingBundle> {
        let state = self.state();
        if !state.has_bundle() {
            return Err(CallscribeError::InvalidState {
                operation: "bundle".to_string(),
                state: state.to_string(),
            });
        }
        self.bundle
            .clone()
            .ok_or_else(|| CallscribeError::Other("no finalized bundle".to_string()))
    }

    fn handle_begin_upload(&mut self) -> Result<RecordingBundle> {
        let state = self.state();
        if !matches!(state, RecordingState::Stopped | RecordingState::Failed) {
            return Err(CallscribeError::InvalidState {
                operation: "persist".to_string(),
                state: state.to_string(),
            });
        }
        let bundle = self
            .bundle
            .clone()
            .ok_or_else(|| CallscribeError::Other("no finalized bundle".to_string()))?;

        // Checked before any I/O; the state is left untouched so the caller
        // can only proceed with a fresh recording.
        if bundle.transcript.trim().is_empty() {
            return Err(CallscribeError::EmptyTranscript);
        }

        self.set_state(RecordingState::Uploading);
        Ok(bundle)
    }

    fn handle_finish_upload(&mut self, success: bool) -> Result<()> {
        let state = self.state();
        if state != RecordingState::Uploading {
            return Err(CallscribeError::InvalidState {
                operation: "finish_upload".to_string(),
                state: state.to_string(),
            });
        }
        if success {
            // Ownership of the audio and transcript has transferred to the
            // persisted record; release the in-memory session.
            self.bundle = None;
            self.finalized.clear();
            self.live = TranscriptSegment::new(0);
            self.update_live_transcript();
            if let Ok(mut timer) = self.shared.timer.lock() {
                *timer = None;
            }
            self.set_state(RecordingState::Idle);
        } else {
            self.set_state(RecordingState::Failed);
        }
        Ok(())
    }

    fn handle_audio(&mut self, event: CaptureEvent) {
        if self.state() != RecordingState::Recording {
            return;
        }
        match event {
            CaptureEvent::Frame(frame) => {
                let Some(active) = self.active.as_mut() else {
                    return;
                };
                let level = active.level.process(&frame.samples);
                let verdict = active.vad.observe(level, frame.duration);
                let closed: Vec<ClosedChunk> = active.chunker.push(&frame.samples);

                self.shared
                    .level_bits
                    .store(level.to_bits(), Ordering::Relaxed);
                for chunk in closed {
                    self.push_chunk(chunk);
                }

                // Auto-stop is a normal stop transition, not a cancellation;
                // the bundle remains eligible for persist().
                if verdict.auto_stop {
                    self.do_stop();
                }
            }
            CaptureEvent::Fatal(message) => {
                self.record_error(&message);
                self.deps
                    .reporter
                    .report("capture", &Incident::Fatal(message));
                self.do_stop();
            }
        }
    }

    fn handle_transcript(&mut self, event: TranscriptEvent) {
        match event {
            TranscriptEvent::Partial(text) => {
                if self.state() == RecordingState::Recording {
                    self.live.update(&text);
                    self.update_live_transcript();
                }
            }
            TranscriptEvent::Final(text) => {
                self.fold_live_segment(Some(&text));
                self.update_live_transcript();
            }
            TranscriptEvent::Error(message) => {
                // Never retried: surface it and leave `Recording` immediately.
                self.record_error(&message);
                self.deps
                    .reporter
                    .report("transcription", &Incident::Fatal(message));
                if self.state() == RecordingState::Recording {
                    self.do_stop();
                }
            }
        }
    }

    /// Finalize the recording: release the device, absorb tail audio, flush
    /// the recognizer and build the bundle.
    fn do_stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let ActiveCapture {
            capture,
            audio_rx,
            transcript_rx,
            mut chunker,
            ..
        } = active;

        // 1. Device released first; when stop() returns the capture thread
        //    has joined and no more frames can be produced.
        capture.stop();

        // 2. Frames already in flight still belong to the recording.
        while let Ok(event) = audio_rx.try_recv() {
            if let CaptureEvent::Frame(frame) = event {
                for chunk in chunker.push(&frame.samples) {
                    self.push_chunk(chunk);
                }
            }
        }
        if let Some(tail) = chunker.flush() {
            self.push_chunk(tail);
        }

        // 3. Transcription stopped cleanly: the final cumulative result is
        //    folded in before the bundle exists (the persist barrier).
        self.close_transcription_segment(&transcript_rx);

        // 4. Freeze the timer.
        let duration = match self.shared.timer.lock() {
            Ok(mut guard) => match guard.as_mut() {
                Some(timer) => {
                    timer.stop();
                    timer.elapsed()
                }
                None => Duration::ZERO,
            },
            Err(_) => Duration::ZERO,
        };

        self.bundle = Some(RecordingBundle {
            transcript: self.full_transcript(),
            chunks: std::mem::take(&mut self.chunks),
            duration,
        });
        self.update_live_transcript();
        self.set_state(RecordingState::Stopped);
    }

    /// Stop the active recognition session and fold its final result into
    /// the finalized segment list.
    fn close_transcription_segment(&mut self, transcript_rx: &Receiver<TranscriptEvent>) {
        let had_session = self.registry.stop_active();
        if had_session {
            let deadline =
                Instant::now() + Duration::from_millis(defaults::STOP_FLUSH_TIMEOUT_MS);
            loop {
                match transcript_rx.recv_deadline(deadline) {
                    Ok(TranscriptEvent::Partial(text)) => self.live.update(&text),
                    Ok(TranscriptEvent::Final(text)) => {
                        self.fold_live_segment(Some(&text));
                        return;
                    }
                    Ok(TranscriptEvent::Error(message)) => {
                        self.record_error(&message);
                        break;
                    }
                    Err(_) => {
                        self.deps.reporter.report(
                            "transcription",
                            &Incident::Recoverable(
                                "timed out waiting for final transcript".to_string(),
                            ),
                        );
                        break;
                    }
                }
            }
        }
        self.fold_live_segment(None);
    }

    /// Close the live segment (with `final_text` when the recognizer
    /// provided one) and open a fresh one at the current elapsed offset.
    fn fold_live_segment(&mut self, final_text: Option<&str>) {
        match final_text {
            Some(text) => self.live.finalize(text),
            None => {
                let text = self.live.text.clone();
                self.live.finalize(&text);
            }
        }
        let offset = self.elapsed_ms();
        let closed = std::mem::replace(&mut self.live, TranscriptSegment::new(offset));
        if !closed.is_empty() {
            self.finalized.push(closed);
        }
    }

    fn push_chunk(&mut self, closed: ClosedChunk) {
        match encode_chunk(self.deps.encoder.as_ref(), &closed) {
            Ok(chunk) => self.chunks.push(chunk),
            Err(e) => {
                self.record_error(&e.to_string());
                self.deps
                    .reporter
                    .report("encoder", &Incident::Fatal(e.to_string()));
            }
        }
    }

    fn full_transcript(&self) -> String {
        let mut parts: Vec<&str> = self
            .finalized
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect();
        let live = self.live.text.trim();
        if !live.is_empty() {
            parts.push(live);
        }
        parts.join(" ")
    }

    fn update_live_transcript(&self) {
        if let Ok(mut transcript) = self.shared.live_transcript.lock() {
            *transcript = self.full_transcript();
        }
    }

    fn record_error(&self, message: &str) {
        if let Ok(mut error) = self.shared.last_error.lock() {
            *error = Some(message.to_string());
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.shared
            .timer
            .lock()
            .ok()
            .and_then(|t| t.as_ref().map(|t| t.elapsed().as_millis() as u64))
            .unwrap_or(0)
    }

    fn state(&self) -> RecordingState {
        self.shared
            .state
            .lock()
            .map(|s| *s)
            .unwrap_or(RecordingState::Idle)
    }

    fn set_state(&self, state: RecordingState) {
        if let Ok(mut current) = self.shared.state.lock() {
            *current = state;
        }
        if let Ok(listeners) = self.shared.listeners.lock() {
            for listener in listeners.iter() {
                listener(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::{FramePhase, MockAudioDevice, MockDeviceProbe};
    use crate::session::reporter::CollectingReporter;
    use crate::session::timer::MockClock;
    use crate::transcribe::recognizer::{MockRecognizer, MockScript};

    fn wait_for<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    /// Sine at an exact FFT bin; amplitude 0.9 lands well above the
    /// speaking threshold, silence well below.
    fn speech_frame(len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * 8.0 * i as f32
                    / defaults::LEVEL_FFT_SIZE as f32;
                (0.9 * phase.sin() * i16::MAX as f32) as i16
            })
            .collect()
    }

    fn silence_frame(len: usize) -> Vec<i16> {
        vec![0i16; len]
    }

    fn factory_for(device: MockAudioDevice) -> DeviceFactory {
        let slot = Mutex::new(Some(device));
        Box::new(move || {
            slot.lock()
                .ok()
                .and_then(|mut s| s.take())
                .map(|d| Box::new(d) as Box<dyn AudioDevice>)
                .ok_or_else(|| CallscribeError::DeviceAcquisition {
                    message: "mock device exhausted".to_string(),
                })
        })
    }

    /// Fast VAD tuning so tests finish quickly: 100ms frames, 300ms silence
    /// window, 200ms recording guard.
    fn fast_config() -> RecorderConfig {
        RecorderConfig {
            vad: VadConfig {
                speaking_threshold: 0.25,
                silence_threshold: 0.10,
                silence_duration_ms: 300,
                min_recording_ms: 200,
            },
            max_chunk_ms: 300_000,
        }
    }

    /// Config that never auto-stops, for tests that stop manually.
    fn manual_config() -> RecorderConfig {
        RecorderConfig {
            vad: VadConfig {
                silence_duration_ms: 600_000,
                min_recording_ms: 600_000,
                ..VadConfig::default()
            },
            max_chunk_ms: 300_000,
        }
    }

    fn talk_then_silence_device() -> (MockAudioDevice, MockDeviceProbe) {
        let device = MockAudioDevice::new().with_frame_phases(vec![
            FramePhase {
                samples: speech_frame(1600),
                count: 5,
            },
            FramePhase {
                samples: silence_frame(1600),
                count: 20,
            },
        ]);
        let probe = device.probe();
        (device, probe)
    }

    #[test]
    fn test_start_device_failure_leaves_idle() {
        let device = MockAudioDevice::new()
            .with_start_failure()
            .with_error_message("permission denied");
        let recorder = Recorder::new(RecorderDeps::new(factory_for(device), fast_config()));

        let result = recorder.start();
        match result {
            Err(CallscribeError::DeviceAcquisition { message }) => {
                assert_eq!(message, "permission denied");
            }
            other => panic!("Expected DeviceAcquisition error, got {:?}", other),
        }
        assert_eq!(recorder.state(), RecordingState::Idle);
    }

    #[test]
    fn test_start_from_non_idle_is_rejected() {
        let (device, _probe) = talk_then_silence_device();
        let recorder = Recorder::new(RecorderDeps::new(factory_for(device), manual_config()));

        recorder.start().unwrap();
        let result = recorder.start();
        assert!(matches!(
            result,
            Err(CallscribeError::InvalidState { .. })
        ));
        recorder.discard().unwrap();
    }

    #[test]
    fn test_recording_reports_audio_level() {
        let (device, _probe) = talk_then_silence_device();
        let recorder = Recorder::new(RecorderDeps::new(factory_for(device), manual_config()));

        recorder.start().unwrap();
        assert_eq!(recorder.state(), RecordingState::Recording);
        assert!(
            wait_for(|| recorder.audio_level() > 0.25, Duration::from_secs(2)),
            "level meter should rise while speech frames flow"
        );
        recorder.stop().unwrap();
    }

    #[test]
    fn test_vad_auto_stop_finalizes_recording() {
        let (device, probe) = talk_then_silence_device();
        let recognizer = Arc::new(
            MockRecognizer::new("mock")
                .with_default_script(MockScript::with_partials(&["hello"]).with_final("hello")),
        );
        let recorder = Recorder::new(
            RecorderDeps::new(factory_for(device), fast_config()).with_recognizer(recognizer),
        );

        recorder.start().unwrap();
        assert!(
            wait_for(
                || recorder.state() == RecordingState::Stopped,
                Duration::from_secs(5)
            ),
            "sustained silence should auto-stop the recording"
        );
        assert!(probe.is_released());

        let bundle = recorder.bundle().unwrap();
        assert_eq!(bundle.transcript, "hello");
        assert!(!bundle.chunks.is_empty());
    }

    #[test]
    fn test_chunks_are_contiguous_and_ordered() {
        let (device, _probe) = talk_then_silence_device();
        let mut config = fast_config();
        // 500ms chunks: 2.5s of scripted audio closes several.
        config.max_chunk_ms = 500;
        let recorder = Recorder::new(RecorderDeps::new(factory_for(device), config));

        recorder.start().unwrap();
        assert!(wait_for(
            || recorder.state() == RecordingState::Stopped,
            Duration::from_secs(5)
        ));

        let bundle = recorder.bundle().unwrap();
        let sequences: Vec<u64> = bundle.chunks.iter().map(|c| c.sequence).collect();
        let expected: Vec<u64> = (0..sequences.len() as u64).collect();
        assert_eq!(sequences, expected);
        assert!(sequences.len() > 1);
    }

    #[test]
    fn test_pause_resume_are_reported_noops_in_wrong_state() {
        let (device, _probe) = talk_then_silence_device();
        let reporter = Arc::new(CollectingReporter::new());
        let recorder = Recorder::new(
            RecorderDeps::new(factory_for(device), manual_config()).with_reporter(reporter.clone()),
        );

        // Idle: both are no-ops, not errors.
        recorder.pause().unwrap();
        recorder.resume().unwrap();
        assert_eq!(recorder.state(), RecordingState::Idle);

        let incidents = reporter.incidents();
        assert_eq!(incidents.len(), 2);
        assert!(incidents[0].1.contains("pause ignored"));
        assert!(incidents[1].1.contains("resume ignored"));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (device, _probe) = talk_then_silence_device();
        let recorder = Recorder::new(RecorderDeps::new(factory_for(device), manual_config()));

        recorder.start().unwrap();
        recorder.stop().unwrap();
        assert_eq!(recorder.state(), RecordingState::Stopped);
        recorder.stop().unwrap();
        assert_eq!(recorder.state(), RecordingState::Stopped);
    }

    #[test]
    fn test_discard_twice_releases_device_once() {
        let (device, probe) = talk_then_silence_device();
        let recorder = Recorder::new(RecorderDeps::new(factory_for(device), manual_config()));

        recorder.start().unwrap();
        recorder.discard().unwrap();
        assert_eq!(recorder.state(), RecordingState::Idle);
        assert!(probe.is_released());

        recorder.discard().unwrap();
        assert_eq!(recorder.state(), RecordingState::Idle);
    }

    #[test]
    fn test_discard_from_stopped_clears_bundle() {
        let (device, _probe) = talk_then_silence_device();
        let recorder = Recorder::new(RecorderDeps::new(factory_for(device), manual_config()));

        recorder.start().unwrap();
        recorder.stop().unwrap();
        assert!(recorder.bundle().is_ok());

        recorder.discard().unwrap();
        assert!(recorder.bundle().is_err());
        assert_eq!(recorder.state(), RecordingState::Idle);
    }

    #[test]
    fn test_pause_tears_down_and_resume_reopens_recognizer() {
        let (device, _probe) = talk_then_silence_device();
        let recognizer = Arc::new(
            MockRecognizer::new("mock")
                .with_script(MockScript::with_partials(&["hello"]).with_final("hello"))
                .with_script(MockScript::with_partials(&["world"]).with_final("world")),
        );
        let recorder = Recorder::new(
            RecorderDeps::new(factory_for(device), manual_config())
                .with_recognizer(recognizer.clone()),
        );

        recorder.start().unwrap();
        assert_eq!(recognizer.sessions_started(), 1);
        assert!(wait_for(
            || recorder.live_transcript() == "hello",
            Duration::from_secs(2)
        ));

        recorder.pause().unwrap();
        assert_eq!(recorder.state(), RecordingState::Paused);

        recorder.resume().unwrap();
        assert_eq!(recognizer.sessions_started(), 2);

        recorder.stop().unwrap();
        let bundle = recorder.bundle().unwrap();
        assert_eq!(bundle.transcript, "hello world");
    }

    #[test]
    fn test_transcription_error_aborts_recording() {
        let (device, probe) = talk_then_silence_device();
        let recognizer = Arc::new(
            MockRecognizer::new("mock")
                .with_default_script(MockScript::default().with_error("engine crashed")),
        );
        let recorder = Recorder::new(
            RecorderDeps::new(factory_for(device), manual_config()).with_recognizer(recognizer),
        );

        recorder.start().unwrap();
        assert!(wait_for(
            || recorder.state() == RecordingState::Stopped,
            Duration::from_secs(5)
        ));
        assert!(probe.is_released());
        assert!(
            recorder
                .last_error()
                .is_some_and(|e| e.contains("engine crashed"))
        );
    }

    #[test]
    fn test_timer_excludes_paused_intervals() {
        let (device, _probe) = talk_then_silence_device();
        let clock = Arc::new(MockClock::new());
        let recorder = Recorder::new(
            RecorderDeps::new(factory_for(device), manual_config()).with_clock(clock.clone()),
        );

        recorder.start().unwrap();
        clock.advance(Duration::from_secs(5));
        recorder.pause().unwrap();
        clock.advance(Duration::from_secs(5));
        recorder.resume().unwrap();
        clock.advance(Duration::from_secs(3));
        recorder.stop().unwrap();

        let bundle = recorder.bundle().unwrap();
        assert_eq!(bundle.duration, Duration::from_secs(8));
        assert_eq!(recorder.elapsed(), Duration::from_secs(8));
    }

    #[test]
    fn test_state_change_listeners_observe_transitions() {
        let (device, _probe) = talk_then_silence_device();
        let recorder = Recorder::new(RecorderDeps::new(factory_for(device), manual_config()));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        recorder.on_state_change(move |state| {
            if let Ok(mut states) = sink.lock() {
                states.push(state);
            }
        });

        recorder.start().unwrap();
        recorder.pause().unwrap();
        recorder.resume().unwrap();
        recorder.stop().unwrap();

        let states = seen.lock().unwrap().clone();
        assert_eq!(
            states,
            vec![
                RecordingState::Recording,
                RecordingState::Paused,
                RecordingState::Recording,
                RecordingState::Stopped,
            ]
        );
    }

    #[test]
    fn test_capture_fatal_error_stops_session() {
        let device = MockAudioDevice::new().with_read_failure();
        let probe = device.probe();
        let recorder = Recorder::new(RecorderDeps::new(factory_for(device), manual_config()));

        recorder.start().unwrap();
        assert!(wait_for(
            || recorder.state() == RecordingState::Stopped,
            Duration::from_secs(5)
        ));
        assert!(probe.is_released());
        assert!(recorder.last_error().is_some());
    }

    #[test]
    fn test_bundle_unavailable_before_stop() {
        let (device, _probe) = talk_then_silence_device();
        let recorder = Recorder::new(RecorderDeps::new(factory_for(device), manual_config()));

        assert!(matches!(
            recorder.bundle(),
            Err(CallscribeError::InvalidState { .. })
        ));
        recorder.start().unwrap();
        assert!(recorder.bundle().is_err());
        recorder.discard().unwrap();
    }
}
