//! Streaming speech recognition seam.
//!
//! The recognition engine itself is an external collaborator; this module
//! defines the contract the orchestrator depends on, plus a scriptable mock.

use crate::error::{CallscribeError, Result};
use crossbeam_channel::Sender;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Events delivered by an active recognition session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// Cumulative transcript so far (not a delta). May be superseded.
    Partial(String),
    /// The locked transcript of the session; sent once, on clean shutdown.
    Final(String),
    /// Unrecoverable recognition failure. Never retried internally.
    Error(String),
}

/// Trait for streaming speech-to-text providers.
///
/// `start_session` opens a continuous recognition channel that reports
/// through `events`. The returned handle must be stopped explicitly; a stop
/// flushes the final cumulative result before the channel closes.
pub trait SpeechRecognizer: Send + Sync {
    fn start_session(&self, events: Sender<TranscriptEvent>) -> Result<Box<dyn RecognizerSession>>;

    /// Provider name for diagnostics.
    fn name(&self) -> &str;
}

/// Handle to one active recognition session.
pub trait RecognizerSession: Send {
    /// Stop recognition, flushing the final result to the event channel.
    fn stop(self: Box<Self>);
}

/// Script for one mock recognition session.
#[derive(Debug, Clone, Default)]
pub struct MockScript {
    /// Cumulative partials emitted immediately on start.
    pub partials: Vec<String>,
    /// Final text flushed on stop. Defaults to the last partial.
    pub final_text: Option<String>,
    /// Emit an error event right after the partials.
    pub error: Option<String>,
}

impl MockScript {
    pub fn with_partials(partials: &[&str]) -> Self {
        Self {
            partials: partials.iter().map(|s| s.to_string()).collect(),
            final_text: None,
            error: None,
        }
    }

    pub fn with_final(mut self, text: &str) -> Self {
        self.final_text = Some(text.to_string());
        self
    }

    pub fn with_error(mut self, message: &str) -> Self {
        self.error = Some(message.to_string());
        self
    }
}

/// Mock recognizer for testing.
///
/// Each `start_session` pops the next script from the queue; when the queue
/// is empty the default script is replayed. Partials (and a scripted error)
/// are emitted synchronously on start; the final result is flushed on stop.
pub struct MockRecognizer {
    name: String,
    scripts: Mutex<VecDeque<MockScript>>,
    default_script: MockScript,
    fail_start: bool,
    sessions_started: AtomicU32,
}

impl MockRecognizer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scripts: Mutex::new(VecDeque::new()),
            default_script: MockScript::default(),
            fail_start: false,
            sessions_started: AtomicU32::new(0),
        }
    }

    /// Queue a script for the next session.
    pub fn with_script(self, script: MockScript) -> Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.push_back(script);
        }
        self
    }

    /// Script used when the queue is empty.
    pub fn with_default_script(mut self, script: MockScript) -> Self {
        self.default_script = script;
        self
    }

    /// Configure the mock to fail on session start.
    pub fn with_start_failure(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Number of sessions started so far.
    pub fn sessions_started(&self) -> u32 {
        self.sessions_started.load(Ordering::SeqCst)
    }
}

impl SpeechRecognizer for MockRecognizer {
    fn start_session(&self, events: Sender<TranscriptEvent>) -> Result<Box<dyn RecognizerSession>> {
        if self.fail_start {
            return Err(CallscribeError::Transcription {
                message: "mock recognizer start failure".to_string(),
            });
        }
        self.sessions_started.fetch_add(1, Ordering::SeqCst);

        let script = self
            .scripts
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| self.default_script.clone());

        for partial in &script.partials {
            let _ = events.send(TranscriptEvent::Partial(partial.clone()));
        }
        if let Some(error) = &script.error {
            let _ = events.send(TranscriptEvent::Error(error.clone()));
        }

        let final_text = script
            .final_text
            .or_else(|| script.partials.last().cloned())
            .unwrap_or_default();

        Ok(Box::new(MockSession { events, final_text }))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct MockSession {
    events: Sender<TranscriptEvent>,
    final_text: String,
}

impl RecognizerSession for MockSession {
    fn stop(self: Box<Self>) {
        let _ = self.events.send(TranscriptEvent::Final(self.final_text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_mock_emits_partials_on_start() {
        let recognizer =
            MockRecognizer::new("mock").with_default_script(MockScript::with_partials(&[
                "hello",
                "hello wor",
                "hello world",
            ]));
        let (tx, rx) = unbounded();

        let session = recognizer.start_session(tx).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            TranscriptEvent::Partial("hello".to_string())
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            TranscriptEvent::Partial("hello wor".to_string())
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            TranscriptEvent::Partial("hello world".to_string())
        );
        assert!(rx.try_recv().is_err());

        session.stop();
        assert_eq!(
            rx.try_recv().unwrap(),
            TranscriptEvent::Final("hello world".to_string())
        );
    }

    #[test]
    fn test_mock_final_overrides_last_partial() {
        let recognizer = MockRecognizer::new("mock").with_default_script(
            MockScript::with_partials(&["draft"]).with_final("polished"),
        );
        let (tx, rx) = unbounded();

        let session = recognizer.start_session(tx).unwrap();
        session.stop();

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert_eq!(last, Some(TranscriptEvent::Final("polished".to_string())));
    }

    #[test]
    fn test_mock_error_event() {
        let recognizer = MockRecognizer::new("mock")
            .with_default_script(MockScript::default().with_error("engine crashed"));
        let (tx, rx) = unbounded();

        let _session = recognizer.start_session(tx).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            TranscriptEvent::Error("engine crashed".to_string())
        );
    }

    #[test]
    fn test_mock_start_failure() {
        let recognizer = MockRecognizer::new("mock").with_start_failure();
        let (tx, _rx) = unbounded();

        let result = recognizer.start_session(tx);
        assert!(matches!(
            result,
            Err(CallscribeError::Transcription { .. })
        ));
    }

    #[test]
    fn test_mock_scripts_consumed_in_order() {
        let recognizer = MockRecognizer::new("mock")
            .with_script(MockScript::with_partials(&["first"]))
            .with_script(MockScript::with_partials(&["second"]));
        let (tx, rx) = unbounded();

        recognizer.start_session(tx.clone()).unwrap().stop();
        recognizer.start_session(tx.clone()).unwrap().stop();
        // Queue exhausted: falls back to the (empty) default script.
        recognizer.start_session(tx).unwrap().stop();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                TranscriptEvent::Partial("first".to_string()),
                TranscriptEvent::Final("first".to_string()),
                TranscriptEvent::Partial("second".to_string()),
                TranscriptEvent::Final("second".to_string()),
                TranscriptEvent::Final(String::new()),
            ]
        );
        assert_eq!(recognizer.sessions_started(), 3);
    }
}
