use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use pianola_tutor::{PerformanceReport, PracticeMode, SessionLog};

/// Everything the summarizer gets to see about one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub score_id: String,
    pub mode: PracticeMode,
    pub report: PerformanceReport,
    pub log: SessionLog,
}

/// Hands finished session logs to the external coaching summarizer.
#[derive(Clone)]
pub struct FeedbackClient {
    pub endpoint: String,
    http: reqwest::Client,
}

impl FeedbackClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Returns the summarizer's feedback text.
    pub async fn summarize(&self, request: &FeedbackRequest) -> Result<String> {
        info!(
            endpoint = %self.endpoint,
            score = %request.score_id,
            entries = request.log.len(),
            "requesting session feedback"
        );
        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .context("send feedback request")?
            .error_for_status()
            .context("feedback service rejected the request")?;
        response.text().await.context("read feedback response")
    }
}
