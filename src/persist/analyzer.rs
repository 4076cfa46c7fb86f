//! Conversation analysis seam.
//!
//! The analysis model is an external collaborator; persistence never depends
//! on it succeeding.

use crate::error::{CallscribeError, Result};
use crate::persist::record::{AnalysisResult, RecordId};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};

/// Trait for the asynchronous "analyze conversation" capability.
#[async_trait]
pub trait ConversationAnalyzer: Send + Sync {
    async fn analyze(&self, record_id: RecordId, transcript: &str) -> Result<AnalysisResult>;
}

/// Mock analyzer for testing.
pub struct MockAnalyzer {
    result: AnalysisResult,
    should_fail: bool,
    calls: AtomicU32,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self {
            result: AnalysisResult {
                tone: "neutral".to_string(),
                response_quality: "adequate".to_string(),
                misbehavior: false,
                red_flags: Vec::new(),
                sentiment: 0.5,
                recommendation: String::new(),
            },
            should_fail: false,
            calls: AtomicU32::new(0),
        }
    }

    /// Configure the result returned on success.
    pub fn with_result(mut self, result: AnalysisResult) -> Self {
        self.result = result;
        self
    }

    /// Configure the analyzer to fail.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationAnalyzer for MockAnalyzer {
    async fn analyze(&self, _record_id: RecordId, _transcript: &str) -> Result<AnalysisResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(CallscribeError::Analysis {
                message: "mock analyzer failure".to_string(),
            });
        }
        Ok(self.result.clone())
    }
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    record_id: String,
    transcript: &'a str,
}

/// REST-backed analyzer client.
pub struct RestAnalyzer {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl RestAnalyzer {
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
}

#[async_trait]
impl ConversationAnalyzer for RestAnalyzer {
    async fn analyze(&self, record_id: RecordId, transcript: &str) -> Result<AnalysisResult> {
        let url = format!("{}/analyze", self.base_url);
        let body = AnalyzeRequest {
            record_id: record_id.to_string(),
            transcript,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| CallscribeError::Analysis {
            message: format!("analyze request failed: {e}"),
        })?;

        if !response.status().is_success() {
            return Err(CallscribeError::Analysis {
                message: format!("analyzer returned status {}", response.status()),
            });
        }

        response
            .json::<AnalysisResult>()
            .await
            .map_err(|e| CallscribeError::Analysis {
                message: format!("analysis decode failed: {e}"),
            })
    }
}
