//! Claude document generator over the Anthropic Messages API.

use super::{ApiStatus, DocumentGenerator};
use crate::error::{Result, TolkError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default timeout for generation requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Document generator backed by the Anthropic Messages API.
#[derive(Debug)]
pub struct ClaudeGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeGenerator {
    pub fn new(api_key: &str, model: &str, max_tokens: u32) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(TolkError::Config(
                "Anthropic API key is empty. Set it with: export ANTHROPIC_API_KEY='sk-ant-...'"
                    .to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| TolkError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
            max_tokens,
        })
    }
}

#[async_trait]
impl DocumentGenerator for ClaudeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!("Posting messages request (model: {})", self.model);
        let started = std::time::Instant::now();

        let response = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let code = response.status().as_u16();
        if !response.status().is_success() {
            let message = extract_error_message(&response.text().await.unwrap_or_default());
            return Err(TolkError::Synthesis {
                status: ApiStatus::from_code(code),
                message,
            });
        }

        let payload: MessagesResponse = response.json().await?;
        info!(
            "Analysis completed in {:.2} seconds",
            started.elapsed().as_secs_f64()
        );

        payload
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .find(|text| !text.trim().is_empty())
            .ok_or_else(|| TolkError::Synthesis {
                status: ApiStatus::Unknown,
                message: "response contained no text content".to_string(),
            })
    }
}

/// Pull the human-readable message out of an API error body, falling back
/// to the raw body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}
