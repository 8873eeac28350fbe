pub(crate) mod types;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::debug;

use crate::http::post_json;
use crate::traits::TextCompletion;
use types::*;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const MAX_TOKENS: u32 = 1024;

/// Anthropic Messages API.
#[derive(Clone)]
pub struct Claude {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// One system prompt plus one user turn, deterministic sampling.
    pub async fn chat_completion(&self, system: &str, user: &str) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: (!system.is_empty()).then_some(system),
            messages: vec![Message { role: "user", content: user }],
            temperature: 0.0,
        };

        debug!(model = %self.model, prompt_bytes = user.len(), "Claude chat request");
        let url = format!("{}/messages", self.base_url);
        let response: MessagesResponse =
            post_json(&self.http, "Claude", &url, self.headers()?, &request).await?;

        response
            .into_text()
            .ok_or_else(|| anyhow!("Claude returned no text content"))
    }
}

#[async_trait]
impl TextCompletion for Claude {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat_completion(DEFAULT_SYSTEM_PROMPT, prompt).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}
