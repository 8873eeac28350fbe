pub(crate) mod types;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use crate::http::post_json;
use crate::traits::TextCompletion;
use types::*;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// OpenAI Chat Completions API.
#[derive(Clone)]
pub struct OpenAi {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub async fn chat_completion(&self, system: &str, user: &str) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages: vec![
                Message { role: "system", content: system },
                Message { role: "user", content: user },
            ],
            max_tokens: 1024,
            temperature: 0.0,
        };

        debug!(model = %self.model, prompt_bytes = user.len(), "OpenAI chat request");
        let url = format!("{}/chat/completions", self.base_url);
        let response: CompletionResponse =
            post_json(&self.http, "OpenAI", &url, self.headers()?, &request).await?;

        response
            .into_text()
            .ok_or_else(|| anyhow!("OpenAI returned no choices"))
    }
}

#[async_trait]
impl TextCompletion for OpenAi {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat_completion(DEFAULT_SYSTEM_PROMPT, prompt).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header() {
        let headers = OpenAi::new("sk-test", "gpt-4o").headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer sk-test");
    }

    #[test]
    fn base_url_override() {
        let ai = OpenAi::new("sk-test", "gpt-4o").with_base_url("http://localhost:8080/v1/");
        assert_eq!(ai.base_url, "http://localhost:8080/v1");
        assert_eq!(TextCompletion::model(&ai), "gpt-4o");
    }
}
