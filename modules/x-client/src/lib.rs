pub mod error;
pub mod types;

pub use error::{Result, XError};
pub use types::{AuthoredTweet, FollowState, Tweet, TweetPage, User, UserPage};

use serde::de::DeserializeOwned;
use types::{FollowRequest, ListResponse, SingleResponse};

const BASE_URL: &str = "https://api.x.com/2";

const USER_FIELDS: &str = "username,name";
const TWEET_FIELDS: &str = "created_at,author_id";

/// Clamp a requested page size into the range an endpoint accepts.
fn clamp(requested: u32, min: u32, max: u32) -> String {
    requested.clamp(min, max).to_string()
}

/// X API v2 client authenticated with an OAuth 2.0 user-context access token.
#[derive(Clone)]
pub struct XClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl XClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn read<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(XError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        Self::read(resp).await
    }

    fn single<T>(resp: SingleResponse<T>, what: &str) -> Result<T> {
        match resp.data {
            Some(data) => Ok(data),
            None => {
                let detail = resp
                    .errors
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|e| e.detail.or(e.title))
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(XError::NotFound(if detail.is_empty() {
                    what.to_string()
                } else {
                    format!("{what}: {detail}")
                }))
            }
        }
    }

    /// Look up a user by handle.
    pub async fn user_by_username(&self, username: &str) -> Result<User> {
        let path = format!("/users/by/username/{}", username);
        let resp: SingleResponse<User> = self
            .get(&path, &[("user.fields", USER_FIELDS.to_string())])
            .await?;
        Self::single(resp, username)
    }

    /// One page of the accounts `user_id` follows.
    pub async fn following(
        &self,
        user_id: &str,
        max_results: u32,
        pagination_token: Option<&str>,
    ) -> Result<UserPage> {
        let path = format!("/users/{}/following", user_id);
        let mut query = vec![
            ("max_results", clamp(max_results, 1, 1000)),
            ("user.fields", USER_FIELDS.to_string()),
        ];
        if let Some(token) = pagination_token {
            query.push(("pagination_token", token.to_string()));
        }

        let resp: ListResponse<User> = self.get(&path, &query).await?;
        let meta = resp.meta.unwrap_or_default();
        let users = resp.data.unwrap_or_default();
        tracing::debug!(user_id, count = users.len(), "Fetched following page");

        Ok(UserPage {
            users,
            next_token: meta.next_token,
            previous_token: meta.previous_token,
        })
    }

    /// The user's home timeline, newest first.
    pub async fn home_timeline(
        &self,
        user_id: &str,
        max_results: u32,
        pagination_token: Option<&str>,
    ) -> Result<TweetPage> {
        let path = format!("/users/{}/timelines/reverse_chronological", user_id);
        let mut query = vec![
            ("max_results", clamp(max_results, 1, 100)),
            ("expansions", "author_id".to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
            ("user.fields", USER_FIELDS.to_string()),
        ];
        if let Some(token) = pagination_token {
            query.push(("pagination_token", token.to_string()));
        }

        let resp: ListResponse<Tweet> = self.get(&path, &query).await?;
        let page = resp.into_page();
        tracing::debug!(user_id, count = page.tweets.len(), "Fetched home timeline");
        Ok(page)
    }

    /// Recent search over the last seven days, most relevant first.
    pub async fn search_recent(&self, query_text: &str, max_results: u32) -> Result<TweetPage> {
        let query = vec![
            ("query", query_text.to_string()),
            ("max_results", clamp(max_results, 10, 100)),
            ("sort_order", "relevancy".to_string()),
            ("expansions", "author_id".to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
            ("user.fields", USER_FIELDS.to_string()),
        ];

        let resp: ListResponse<Tweet> = self.get("/tweets/search/recent", &query).await?;
        let page = resp.into_page();
        tracing::info!(
            query = query_text,
            count = page.tweets.len(),
            "Fetched search results"
        );
        Ok(page)
    }

    /// Tweets authored by `user_id`, newest first.
    pub async fn user_tweets(&self, user_id: &str, max_results: u32) -> Result<TweetPage> {
        let path = format!("/users/{}/tweets", user_id);
        let query = vec![
            ("max_results", clamp(max_results, 5, 100)),
            ("tweet.fields", TWEET_FIELDS.to_string()),
        ];

        let resp: ListResponse<Tweet> = self.get(&path, &query).await?;
        Ok(resp.into_page())
    }

    /// Follow `target_user_id` as `source_user_id`.
    pub async fn follow(&self, source_user_id: &str, target_user_id: &str) -> Result<FollowState> {
        let url = format!("{}/users/{}/following", self.base_url, source_user_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&FollowRequest { target_user_id })
            .send()
            .await?;

        let resp: SingleResponse<FollowState> = Self::read(resp).await?;
        Self::single(resp, target_user_id)
    }

    /// Unfollow `target_user_id` as `source_user_id`.
    pub async fn unfollow(
        &self,
        source_user_id: &str,
        target_user_id: &str,
    ) -> Result<FollowState> {
        let url = format!(
            "{}/users/{}/following/{}",
            self.base_url, source_user_id, target_user_id
        );
        let resp = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let resp: SingleResponse<FollowState> = Self::read(resp).await?;
        Self::single(resp, target_user_id)
    }
}
