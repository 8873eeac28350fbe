//! Hourly upload of the agent's home timeline to Cerebro.
//!
//! At the top of every hour, push up to [`MAX_PAGES`] pages of [`PAGE_SIZE`]
//! posts. Cerebro answers each page with `next`; only an explicit `true`
//! (and a cursor to continue from) fetches another page.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use cerebro_client::{CerebroClient, SendTweetsRequest, SendTweetsResponse, UploadedTweet};
use chrono::Utc;
use croner::Cron;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use x_client::XClient;

pub const SCHEDULE: &str = "0 * * * *";
pub const MAX_PAGES: usize = 10;
pub const PAGE_SIZE: u32 = 50;

pub struct TimelinePage {
    pub tweets: Vec<UploadedTweet>,
    pub next: Option<String>,
}

#[async_trait]
pub trait TimelineSource: Send + Sync {
    async fn page(&self, count: u32, cursor: Option<&str>) -> Result<TimelinePage>;
}

#[async_trait]
pub trait TweetSink: Send + Sync {
    async fn send(&self, request: &SendTweetsRequest) -> Result<SendTweetsResponse>;
}

/// Home timeline of one account.
pub struct XTimeline {
    client: XClient,
    user_id: String,
}

impl XTimeline {
    pub fn new(client: XClient, user_id: String) -> Self {
        Self { client, user_id }
    }
}

#[async_trait]
impl TimelineSource for XTimeline {
    async fn page(&self, count: u32, cursor: Option<&str>) -> Result<TimelinePage> {
        let page = self.client.home_timeline(&self.user_id, count, cursor).await?;
        let tweets = page
            .tweets
            .into_iter()
            .map(|t| UploadedTweet {
                id: t.id,
                text: t.text,
                username: t.username,
                created_at: t.created_at,
            })
            .collect();
        Ok(TimelinePage {
            tweets,
            next: page.next_token,
        })
    }
}

#[async_trait]
impl TweetSink for CerebroClient {
    async fn send(&self, request: &SendTweetsRequest) -> Result<SendTweetsResponse> {
        Ok(self.send_tweets(request).await?)
    }
}

pub struct TimelineSync {
    source: Arc<dyn TimelineSource>,
    sink: Arc<dyn TweetSink>,
    username: String,
}

impl TimelineSync {
    pub fn new(source: Arc<dyn TimelineSource>, sink: Arc<dyn TweetSink>, username: String) -> Self {
        Self {
            source,
            sink,
            username,
        }
    }

    /// One upload pass. Returns the number of pages sent.
    pub async fn sync_once(&self) -> Result<usize> {
        let mut cursor: Option<String> = None;
        let mut sent = 0;

        for _ in 0..MAX_PAGES {
            let page = self.source.page(PAGE_SIZE, cursor.as_deref()).await?;
            let request = SendTweetsRequest {
                user: self.username.clone(),
                tweets: page.tweets,
            };
            let response = self.sink.send(&request).await?;
            sent += 1;

            // Only an explicit `next: true` asks for more. A missing `next` ends the pass.
            match (response.next, page.next) {
                (Some(true), Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        info!(pages = sent, username = %self.username, "Timeline synced to Cerebro");
        Ok(sent)
    }

    /// Run [`sync_once`](Self::sync_once) on [`SCHEDULE`] until cancelled.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let cron = Cron::from_str(SCHEDULE)
            .map_err(|e| anyhow!("Invalid timeline sync schedule {SCHEDULE}: {e:?}"))?;

        loop {
            let now = Utc::now();
            let next = cron
                .find_next_occurrence(&now, false)
                .map_err(|e| anyhow!("No upcoming timeline sync time: {e:?}"))?;
            let wait = (next - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Timeline sync cancelled");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = self.sync_once().await {
                        error!(error = %e, "Timeline sync failed");
                    }
                }
            }
        }
    }
}
