// Trait seams for the subscription loop.
//
// SocialPlatform: everything the loop reads from or does on the platform.
// ProcessedLedger: durable "already shown to the model" set.
// Pacer: every wait in the loop goes through here.
//
// Production impls: XPlatform, PgLedger, TokioPacer. Test mocks live in
// `testing` and make the whole loop run without network, database or real time.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use chorus_common::{Post, Profile};

// ---------------------------------------------------------------------------
// SocialPlatform
// ---------------------------------------------------------------------------

/// One page of a following list. When `next == previous` there are no more pages.
#[derive(Debug, Clone, Default)]
pub struct FollowingPage {
    pub profiles: Vec<Profile>,
    pub next: Option<String>,
    pub previous: Option<String>,
}

#[async_trait]
pub trait SocialPlatform: Send + Sync {
    /// A page of accounts `user_id` follows, starting at `cursor`.
    async fn following(
        &self,
        user_id: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<FollowingPage>;

    /// The last home timeline fetched in this process, if any.
    async fn cached_timeline(&self) -> Result<Option<Vec<Post>>>;

    /// Fetch the agent's home timeline.
    async fn home_timeline(&self, count: u32) -> Result<Vec<Post>>;

    /// Top-ranked posts matching free text.
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Post>>;

    /// Recent posts authored by `user_id`.
    async fn user_posts(&self, user_id: &str, limit: u32) -> Result<Vec<Post>>;

    /// Resolve a handle to a profile.
    async fn profile(&self, username: &str) -> Result<Profile>;

    async fn follow(&self, profile: &Profile) -> Result<()>;

    async fn unfollow(&self, profile: &Profile) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ProcessedLedger
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ProcessedLedger: Send + Sync {
    /// Whether `id` has been recorded before.
    async fn contains(&self, id: Uuid) -> Result<bool>;

    /// Record `id`. Recording an existing id is a no-op.
    async fn record(&self, id: Uuid, item_ref: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Pacer
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Suspends on the tokio timer.
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
