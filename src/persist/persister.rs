//! Finalize/persist step for completed recordings.
//!
//! The primary save (audio artifacts + metadata row) is the caller's
//! operation; analysis enrichment is fired after it succeeds and is never
//! awaited on the caller's path. A conversation is never lost because
//! enrichment failed.

use crate::audio::chunk::AudioChunk;
use crate::error::{CallscribeError, Result};
use crate::persist::analyzer::ConversationAnalyzer;
use crate::persist::record::{AudioArtifact, ConversationRecord, RecordId, RecordStatus};
use crate::persist::store::{MetadataStore, ObjectStore};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Persists finalized (audio, transcript, duration) bundles.
pub struct ConversationPersister {
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    analyzer: Arc<dyn ConversationAnalyzer>,
    artifact_extension: String,
}

impl ConversationPersister {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        analyzer: Arc<dyn ConversationAnalyzer>,
    ) -> Self {
        Self {
            objects,
            metadata,
            analyzer,
            artifact_extension: "wav".to_string(),
        }
    }

    /// Extension used in artifact keys; must match the chunk encoder.
    pub fn with_artifact_extension(mut self, extension: &str) -> Self {
        self.artifact_extension = extension.to_string();
        self
    }

    /// Persist a finalized bundle; returns the new record id.
    ///
    /// An empty or whitespace-only transcript is rejected before any I/O.
    /// On success the record status is `Transcribed` and enrichment runs
    /// out-of-band; its outcome never affects this call's result.
    pub async fn persist(
        &self,
        owner_id: &str,
        participant_id: &str,
        transcript: &str,
        chunks: &[AudioChunk],
        duration: Duration,
    ) -> Result<RecordId> {
        if transcript.trim().is_empty() {
            return Err(CallscribeError::EmptyTranscript);
        }

        let id = RecordId::new();

        let mut artifacts = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let key = format!(
                "conversations/{}/chunk-{:04}.{}",
                id, chunk.sequence, self.artifact_extension
            );
            let location = self.objects.put(&key, chunk.payload.clone()).await?;
            artifacts.push(AudioArtifact {
                sequence: chunk.sequence,
                location,
                duration_ms: chunk.duration_ms,
            });
        }

        let now = Utc::now();
        let record = ConversationRecord {
            id,
            owner_id: owner_id.to_string(),
            participant_id: participant_id.to_string(),
            artifacts,
            transcript: transcript.to_string(),
            duration_secs: duration.as_secs_f64(),
            status: RecordStatus::Transcribed,
            error: None,
            analysis: None,
            created_at: now,
            updated_at: now,
        };
        self.metadata.insert(record).await?;

        info!(record_id = %id, chunks = chunks.len(), "conversation persisted");

        // Fired, not awaited: the caller's save has already succeeded.
        let analyzer = self.analyzer.clone();
        let metadata = self.metadata.clone();
        let text = transcript.to_string();
        tokio::spawn(async move {
            enrich(analyzer, metadata, id, &text).await;
        });

        Ok(id)
    }
}

/// Best-effort enrichment. Failures are recorded as diagnostics only; the
/// record rests at `Transcribed`, which is an allowed terminal state.
async fn enrich(
    analyzer: Arc<dyn ConversationAnalyzer>,
    metadata: Arc<dyn MetadataStore>,
    id: RecordId,
    transcript: &str,
) {
    match analyzer.analyze(id, transcript).await {
        Ok(analysis) => match metadata.attach_analysis(id, analysis).await {
            Ok(()) => info!(record_id = %id, "analysis attached"),
            Err(e) => {
                warn!(record_id = %id, error = %e, "failed to attach analysis; record stays transcribed");
            }
        },
        Err(e) => {
            warn!(record_id = %id, error = %e, "conversation analysis failed; record stays transcribed");
        }
    }
}
