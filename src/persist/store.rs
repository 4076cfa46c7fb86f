//! Storage seams for audio artifacts and conversation metadata.

use crate::error::{CallscribeError, Result};
use crate::persist::record::{AnalysisResult, ConversationRecord, RecordId, RecordStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Binary object store for audio artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a payload under `key`; returns the artifact location.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String>;
}

/// Metadata store for conversation records.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn insert(&self, record: ConversationRecord) -> Result<()>;

    /// Attach an analysis result, advancing the record to `Analyzed`.
    async fn attach_analysis(&self, id: RecordId, analysis: AnalysisResult) -> Result<()>;

    async fn fetch(&self, id: RecordId) -> Result<Option<ConversationRecord>>;
}

/// In-memory object store for tests and local use.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    put_calls: AtomicU32,
    should_fail: bool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the store to fail every put.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn put_calls(&self) -> u32 {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(CallscribeError::Persistence {
                message: "mock object store failure".to_string(),
            });
        }
        self.objects
            .lock()
            .map_err(|_| CallscribeError::Persistence {
                message: "object store poisoned".to_string(),
            })?
            .insert(key.to_string(), bytes);
        Ok(key.to_string())
    }
}

/// In-memory metadata store for tests and local use.
#[derive(Default)]
pub struct MemoryMetadataStore {
    records: Mutex<HashMap<RecordId, ConversationRecord>>,
    insert_calls: AtomicU32,
    fail_insert: bool,
    fail_attach: bool,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the store to fail inserts.
    pub fn with_insert_failure(mut self) -> Self {
        self.fail_insert = true;
        self
    }

    /// Configure the store to fail analysis attachment.
    pub fn with_attach_failure(mut self) -> Self {
        self.fail_attach = true;
        self
    }

    pub fn insert_calls(&self) -> u32 {
        self.insert_calls.load(Ordering::SeqCst)
    }

    /// Synchronous snapshot of one record, for test assertions.
    pub fn snapshot(&self, id: RecordId) -> Option<ConversationRecord> {
        self.records.lock().ok()?.get(&id).cloned()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert(&self, record: ConversationRecord) -> Result<()> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert {
            return Err(CallscribeError::Persistence {
                message: "mock metadata store failure".to_string(),
            });
        }
        self.records
            .lock()
            .map_err(|_| CallscribeError::Persistence {
                message: "metadata store poisoned".to_string(),
            })?
            .insert(record.id, record);
        Ok(())
    }

    async fn attach_analysis(&self, id: RecordId, analysis: AnalysisResult) -> Result<()> {
        if self.fail_attach {
            return Err(CallscribeError::Persistence {
                message: "mock attach failure".to_string(),
            });
        }
        let mut records = self
            .records
            .lock()
            .map_err(|_| CallscribeError::Persistence {
                message: "metadata store poisoned".to_string(),
            })?;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| CallscribeError::Persistence {
                message: format!("record {id} not found"),
            })?;
        record.analysis = Some(analysis);
        record.status = RecordStatus::Analyzed;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn fetch(&self, id: RecordId) -> Result<Option<ConversationRecord>> {
        Ok(self.snapshot(id))
    }
}

/// REST-backed store implementing both seams against the data platform.
pub struct RestConversationStore {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl RestConversationStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
        }
    }

    pub fn with_auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if !response.status().is_success() {
            return Err(CallscribeError::Persistence {
                message: format!("{what} returned status {}", response.status()),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ObjectStore for RestConversationStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        let url = format!("{}/artifacts/{}", self.base_url, key);
        let response = self
            .authorize(self.client.put(&url).body(bytes))
            .send()
            .await
            .map_err(|e| CallscribeError::Persistence {
                message: format!("artifact upload failed: {e}"),
            })?;
        Self::check(response, "artifact upload").await?;
        Ok(url)
    }
}

#[async_trait]
impl MetadataStore for RestConversationStore {
    async fn insert(&self, record: ConversationRecord) -> Result<()> {
        let url = format!("{}/conversations", self.base_url);
        let response = self
            .authorize(self.client.post(&url).json(&record))
            .send()
            .await
            .map_err(|e| CallscribeError::Persistence {
                message: format!("record insert failed: {e}"),
            })?;
        Self::check(response, "record insert").await?;
        Ok(())
    }

    async fn attach_analysis(&self, id: RecordId, analysis: AnalysisResult) -> Result<()> {
        let url = format!("{}/conversations/{}/analysis", self.base_url, id);
        let response = self
            .authorize(self.client.patch(&url).json(&analysis))
            .send()
            .await
            .map_err(|e| CallscribeError::Persistence {
                message: format!("analysis update failed: {e}"),
            })?;
        Self::check(response, "analysis update").await?;
        Ok(())
    }

    async fn fetch(&self, id: RecordId) -> Result<Option<ConversationRecord>> {
        let url = format!("{}/conversations/{}", self.base_url, id);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| CallscribeError::Persistence {
                message: format!("record fetch failed: {e}"),
            })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response, "record fetch").await?;
        let record =
            response
                .json::<ConversationRecord>()
                .await
                .map_err(|e| CallscribeError::Persistence {
                    message: format!("record decode failed: {e}"),
                })?;
        Ok(Some(record))
    }
}
