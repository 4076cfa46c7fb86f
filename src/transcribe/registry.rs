//! Active recognition session registry.
//!
//! At most one transcription session runs at a time. The registry holds the
//! handle explicitly and is owned by the orchestrator; stopping "everything"
//! means stopping the one tracked handle, not calling into a global.

use crate::error::Result;
use crate::transcribe::recognizer::{RecognizerSession, SpeechRecognizer, TranscriptEvent};
use crossbeam_channel::Sender;

/// Tracks the single active recognition session.
#[derive(Default)]
pub struct RecognizerRegistry {
    active: Option<Box<dyn RecognizerSession>>,
}

impl RecognizerRegistry {
    pub fn new() -> Self {
        Self { active: None }
    }

    /// Starts a fresh session, stopping any previous one first.
    pub fn start_session(
        &mut self,
        recognizer: &dyn SpeechRecognizer,
        events: Sender<TranscriptEvent>,
    ) -> Result<()> {
        self.stop_active();
        let session = recognizer.start_session(events)?;
        self.active = Some(session);
        Ok(())
    }

    /// Stops the active session, if any. Idempotent.
    ///
    /// Returns true if a session was actually stopped.
    pub fn stop_active(&mut self) -> bool {
        match self.active.take() {
            Some(session) => {
                session.stop();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for RecognizerRegistry {
    fn drop(&mut self) {
        self.stop_active();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::recognizer::{MockRecognizer, MockScript};
    use crossbeam_channel::unbounded;

    #[test]
    fn test_registry_starts_and_stops() {
        let recognizer = MockRecognizer::new("mock");
        let (tx, _rx) = unbounded();
        let mut registry = RecognizerRegistry::new();

        assert!(!registry.is_active());
        registry.start_session(&recognizer, tx).unwrap();
        assert!(registry.is_active());

        assert!(registry.stop_active());
        assert!(!registry.is_active());
    }

    #[test]
    fn test_stop_active_is_idempotent() {
        let mut registry = RecognizerRegistry::new();
        assert!(!registry.stop_active());
        assert!(!registry.stop_active());
    }

    #[test]
    fn test_second_start_stops_first_session() {
        let recognizer = MockRecognizer::new("mock")
            .with_script(MockScript::with_partials(&["one"]))
            .with_script(MockScript::with_partials(&["two"]));
        let (tx, rx) = unbounded();
        let mut registry = RecognizerRegistry::new();

        registry.start_session(&recognizer, tx.clone()).unwrap();
        registry.start_session(&recognizer, tx).unwrap();

        // The first session was flushed before the second started.
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                TranscriptEvent::Partial("one".to_string()),
                TranscriptEvent::Final("one".to_string()),
                TranscriptEvent::Partial("two".to_string()),
            ]
        );
        assert_eq!(recognizer.sessions_started(), 2);
        assert!(registry.is_active());
    }

    #[test]
    fn test_failed_start_leaves_registry_inactive() {
        let recognizer = MockRecognizer::new("mock").with_start_failure();
        let (tx, _rx) = unbounded();
        let mut registry = RecognizerRegistry::new();

        assert!(registry.start_session(&recognizer, tx).is_err());
        assert!(!registry.is_active());
    }

    #[test]
    fn test_drop_stops_active_session() {
        let recognizer = MockRecognizer::new("mock")
            .with_default_script(MockScript::with_partials(&["text"]));
        let (tx, rx) = unbounded();

        {
            let mut registry = RecognizerRegistry::new();
            registry.start_session(&recognizer, tx).unwrap();
        }

        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.contains(&TranscriptEvent::Final("text".to_string())));
    }
}
