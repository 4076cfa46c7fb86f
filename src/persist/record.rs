//! Persisted conversation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a persisted conversation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a conversation record.
///
/// `Transcribed` is an allowed terminal state: a record whose enrichment
/// never succeeds rests there permanently without being an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Processing,
    Transcribed,
    Analyzed,
    Error,
}

/// AI-derived analysis attached to a record by the enrichment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub tone: String,
    pub response_quality: String,
    pub misbehavior: bool,
    pub red_flags: Vec<String>,
    pub sentiment: f32,
    pub recommendation: String,
}

/// Reference to one stored audio chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub sequence: u64,
    /// Location of the stored payload (key or URL, store-defined).
    pub location: String,
    pub duration_ms: u32,
}

/// The durable representation of a completed recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: RecordId,
    /// Recording participant (employee) identity.
    pub owner_id: String,
    /// External participant identifier.
    pub participant_id: String,
    pub artifacts: Vec<AudioArtifact>,
    pub transcript: String,
    pub duration_secs: f64,
    pub status: RecordStatus,
    pub error: Option<String>,
    pub analysis: Option<AnalysisResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> ConversationRecord {
        let now = Utc::now();
        ConversationRecord {
            id: RecordId::new(),
            owner_id: "emp-7".to_string(),
            participant_id: "cust-1".to_string(),
            artifacts: vec![AudioArtifact {
                sequence: 0,
                location: "conversations/x/chunk-0000.wav".to_string(),
                duration_ms: 12000,
            }],
            transcript: "hello".to_string(),
            duration_secs: 12.0,
            status: RecordStatus::Transcribed,
            error: None,
            analysis: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RecordStatus::Transcribed).unwrap(),
            "\"transcribed\""
        );
        assert_eq!(
            serde_json::to_string(&RecordStatus::Analyzed).unwrap(),
            "\"analyzed\""
        );
        let parsed: RecordStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(parsed, RecordStatus::Pending);
    }

    #[test]
    fn test_record_json_roundtrip() {
        let record = make_record();
        let json = serde_json::to_string(&record).unwrap();
        let parsed: ConversationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_record_id_display_is_uuid() {
        let id = RecordId::new();
        assert_eq!(id.to_string().len(), 36);
    }

    #[test]
    fn test_distinct_ids() {
        assert_ne!(RecordId::new(), RecordId::new());
    }
}
