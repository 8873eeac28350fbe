use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Timestamps arrive as RFC 3339 strings or epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Text(String),
}

impl Timestamp {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Timestamp::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            Timestamp::Text(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// A generated summary (tweets, trends, or personalized trends).
#[derive(Debug, Clone, Deserialize)]
pub struct Summary {
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    pub code: i64,
    pub message: String,
}

/// Envelope for summary endpoints. Exactly one of the fields is normally set.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseData {
    pub data: Option<Summary>,
    pub error: Option<ErrorData>,
}

impl ResponseData {
    /// The summary, or the envelope's error as [`crate::CerebroError::Rejected`].
    pub fn into_summary(self) -> crate::Result<Summary> {
        match (self.data, self.error) {
            (_, Some(error)) => Err(error.into()),
            (Some(summary), None) => Ok(summary),
            (None, None) => Err(crate::CerebroError::EmptyEnvelope),
        }
    }
}

/// A timeline post as uploaded to Cerebro.
#[derive(Debug, Clone, Serialize)]
pub struct UploadedTweet {
    pub id: String,
    pub text: String,
    pub username: Option<String>,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body for `POST /tweet/user`.
#[derive(Debug, Clone, Serialize)]
pub struct SendTweetsRequest {
    pub user: String,
    pub tweets: Vec<UploadedTweet>,
}

/// `next` tells the uploader whether Cerebro wants another page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendTweetsResponse {
    pub next: Option<bool>,
}
