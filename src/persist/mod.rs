//! Persistence of finalized conversations and best-effort analysis enrichment.

pub mod analyzer;
pub mod persister;
pub mod record;
pub mod store;

pub use analyzer::{ConversationAnalyzer, MockAnalyzer, RestAnalyzer};
pub use persister::ConversationPersister;
pub use record::{AnalysisResult, AudioArtifact, ConversationRecord, RecordId, RecordStatus};
pub use store::{
    MemoryMetadataStore, MemoryObjectStore, MetadataStore, ObjectStore, RestConversationStore,
};
