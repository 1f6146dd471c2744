//! Drafting assistant: a fixed prompt sent to a text-generation API.
//!
//! Every call runs the same loop:
//!
//! ```text
//! attempt i -> wait for generation lock -> call API -> text
//!                                               \-> error -> backoff(i) -> attempt i+1
//! ```
//!
//! The lock is process-wide and shared by every caller regardless of input.
//! A lock timeout counts as a failed attempt. When the attempts run out the
//! caller still gets a string, describing the error.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::lock::{GENERATE_LOCK_WAIT, TimedLock};
use crate::retry::RetryPolicy;
use crate::{Error, Result};

/// Returned when the API answers without any candidate.
pub const NO_RESPONSE: &str = "No response from Gemini API";

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Build the drafting prompt around the user's raw input.
pub fn build_prompt(input: &str) -> String {
    format!(
        r#"role: あなたは連絡用掲示板への文書作成のプロです。
input: |
  {input}
task: |
  入力文の内容をもとに、連絡用掲示板に適した分かりやすく簡潔な投稿文を作成してください。
conditions:
  - 敬語を使い、丁寧で分かりやすい表現にする。
  - 前置きや後書き、あいさつ文は無で、必要な情報のみ漏れなく伝える。
  - 箇条書きや改行を適切に使い、読みやすくする。
output_format: |
  （掲示板への投稿文をテキスト形式（マークダウン等の装飾なし）で記載してください。）
"#
    )
}

// ═══════════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Sampling configuration sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_k: 40,
            top_p: 0.90,
            max_output_tokens: 8192,
        }
    }
}

/// `generateContent` request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

impl GenerateRequest {
    pub fn from_prompt(prompt: String) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: Some(prompt) }],
            }],
            generation_config: GenerationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

/// `generateContent` response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Text of the first candidate's first part, or [`NO_RESPONSE`] when
    /// there is no candidate.
    pub fn first_text(&self) -> Result<String> {
        let Some(candidate) = self.candidates.first() else {
            return Ok(NO_RESPONSE.to_string());
        };
        candidate
            .content
            .as_ref()
            .and_then(|content| content.parts.first())
            .and_then(|part| part.text.clone())
            .ok_or_else(|| Error::Upstream("candidate has no text part".to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Model client
// ═══════════════════════════════════════════════════════════════════════════

/// A text-generation backend.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse>;
}

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Upstream(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl TextModel for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Upstream("GEMINI_API_KEY is not configured".to_string()))?;

        let response = self
            .http
            .post(self.url())
            .query(&[("key", api_key)])
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(Error::Upstream(format!("HTTP {status}: {snippet}")));
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| Error::Upstream(format!("invalid response body: {}", e.without_url())))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Proxy
// ═══════════════════════════════════════════════════════════════════════════

/// Serialized, retrying proxy in front of a [`TextModel`].
pub struct Drafter {
    model: Arc<dyn TextModel>,
    lock: TimedLock,
    retry: RetryPolicy,
}

impl Drafter {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self::with_options(
            model,
            TimedLock::new("generation", GENERATE_LOCK_WAIT),
            RetryPolicy::default(),
        )
    }

    pub fn with_options(model: Arc<dyn TextModel>, lock: TimedLock, retry: RetryPolicy) -> Self {
        Self { model, lock, retry }
    }

    /// Draft a post from `input`. Failures come back as descriptive text.
    pub async fn draft(&self, input: &str) -> String {
        match self.try_draft(input).await {
            Ok(text) => text,
            Err(err) => {
                metrics::counter!("board_generate_failures_total").increment(1);
                format!("Error retrieving response: {err}")
            }
        }
    }

    /// Draft a post, returning the last error when every attempt fails.
    pub async fn try_draft(&self, input: &str) -> Result<String> {
        let request = GenerateRequest::from_prompt(build_prompt(input));

        self.retry
            .run("generate", |attempt| {
                let request = &request;
                async move {
                    metrics::counter!("board_generate_attempts_total").increment(1);
                    let _guard = self.lock.acquire().await?;
                    tracing::debug!(attempt, "calling text model");
                    self.model.generate(request).await?.first_text()
                }
            })
            .await
    }
}
