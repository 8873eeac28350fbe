pub mod error;
pub mod types;

pub use error::{CerebroError, Result};
pub use types::{
    ErrorData, ResponseData, SendTweetsRequest, SendTweetsResponse, Summary, Timestamp,
    UploadedTweet,
};

use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;

/// Client for the Cerebro analytics backend.
pub struct CerebroClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CerebroClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn read<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CerebroError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn get_summary(&self, path: &str) -> Result<Summary> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let envelope: ResponseData = Self::read(resp).await?;
        envelope.into_summary()
    }

    /// Summary of the agent's recent tweets.
    pub async fn tweet_summary(&self) -> Result<Summary> {
        self.get_summary("/tweet/summary").await
    }

    /// Global trend summary.
    pub async fn trend_summary(&self) -> Result<Summary> {
        self.get_summary("/trend/summary").await
    }

    /// Trend summary personalized to the agent's timeline.
    pub async fn personalized_trend_summary(&self) -> Result<Summary> {
        self.get_summary("/personalized-trend/summary").await
    }

    /// Upload a batch of timeline tweets for `request.user`.
    pub async fn send_tweets(&self, request: &SendTweetsRequest) -> Result<SendTweetsResponse> {
        let url = format!("{}/tweet/user", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let parsed: SendTweetsResponse = Self::read(resp).await?;
        tracing::debug!(
            user = %request.user,
            count = request.tweets.len(),
            next = ?parsed.next,
            "Uploaded tweets to Cerebro"
        );
        Ok(parsed)
    }
}
