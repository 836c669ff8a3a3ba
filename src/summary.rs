//! Excerpt suggestions from an LLM.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppError;

#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    /// Suggest an excerpt for a post titled `title`.
    async fn summarize(&self, title: &str) -> Result<String, AppError>;
}

/// Used when no API key is configured.
#[derive(Debug, Default)]
pub struct DisabledSummaryGenerator;

#[async_trait]
impl SummaryGenerator for DisabledSummaryGenerator {
    async fn summarize(&self, _title: &str) -> Result<String, AppError> {
        Err(AppError::Unavailable(
            "Summary generation is not configured".to_string(),
        ))
    }
}

/// Google Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiSummaryGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Part {
    #[serde(default)]
    text: String,
}

pub fn build_prompt(title: &str) -> String {
    format!(
        "Based on the blog post title \"{}\", write a compelling excerpt that tells a reader \
         what the post covers and why it is worth reading.\n\n\
         Keep it between 30 and 70 words, in a confident and friendly tone.\n\
         Use one flowing paragraph, no bullet points, no headings, no quotes around the text.",
        title
    )
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect();
        let text = text.trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

impl GeminiSummaryGenerator {
    pub fn new(api_base: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl SummaryGenerator for GeminiSummaryGenerator {
    async fn summarize(&self, title: &str) -> Result<String, AppError> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(title) }] }]
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(model = %self.model, error = %e, "summary upstream request failed");
                AppError::Upstream(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(model = %self.model, status = %status, "summary upstream returned error");
            return Err(AppError::Upstream(format!("status {}", status)));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse summary response");
            AppError::Upstream(e.to_string())
        })?;

        parsed
            .into_text()
            .ok_or_else(|| AppError::Upstream("empty completion".to_string()))
    }
}
