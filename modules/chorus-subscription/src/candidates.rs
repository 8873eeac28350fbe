use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::seq::IndexedRandom;
use tracing::{info, warn};

use chorus_common::{Post, Profile};

use crate::traits::{Pacer, SocialPlatform};

pub const FOLLOWING_PAGE_SIZE: u32 = 10;
pub const CACHED_TIMELINE_FETCH: u32 = 10;
pub const UNCACHED_TIMELINE_FETCH: u32 = 50;
pub const SEARCH_WARMUP: Duration = Duration::from_secs(5);

/// A profile known either by handle only or fully resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileRef {
    Unresolved(String),
    Resolved(Profile),
}

impl ProfileRef {
    pub fn username(&self) -> &str {
        match self {
            ProfileRef::Unresolved(username) => username,
            ProfileRef::Resolved(profile) => &profile.username,
        }
    }
}

/// A profile the loop will consider acting on. `following == None` means unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub profile: ProfileRef,
    pub following: Option<bool>,
}

impl Candidate {
    fn followed(profile: Profile) -> Self {
        Self {
            profile: ProfileRef::Resolved(profile),
            following: Some(true),
        }
    }

    fn discovered(username: String) -> Self {
        Self {
            profile: ProfileRef::Unresolved(username),
            following: Some(false),
        }
    }
}

/// Where the next iteration looks for candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryMode {
    /// Accounts the agent follows plus authors on its home timeline.
    #[default]
    Graph,
    /// Authors of top posts for one persona topic.
    Search,
}

impl fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryMode::Graph => write!(f, "graph"),
            DiscoveryMode::Search => write!(f, "search"),
        }
    }
}

/// Distinct author handles in timeline order, skipping `exclude`.
fn distinct_authors(posts: &[Post], exclude: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for username in posts.iter().filter_map(|p| p.username.as_deref()) {
        if username.eq_ignore_ascii_case(exclude) || seen.iter().any(|s| s == username) {
            continue;
        }
        seen.push(username.to_string());
    }
    seen
}

pub struct CandidateSource {
    platform: Arc<dyn SocialPlatform>,
    pacer: Arc<dyn Pacer>,
    agent: Profile,
    topics: Vec<String>,
    profiles_check_limit: usize,
    tweet_fetch_limit: u32,
}

impl CandidateSource {
    pub fn new(
        platform: Arc<dyn SocialPlatform>,
        pacer: Arc<dyn Pacer>,
        agent: Profile,
        topics: Vec<String>,
        profiles_check_limit: usize,
        tweet_fetch_limit: u32,
    ) -> Self {
        Self {
            platform,
            pacer,
            agent,
            topics,
            profiles_check_limit,
            tweet_fetch_limit,
        }
    }

    pub async fn discover(&self, mode: DiscoveryMode) -> Result<Vec<Candidate>> {
        match mode {
            DiscoveryMode::Graph => self.from_graph().await,
            DiscoveryMode::Search => self.from_search().await,
        }
    }

    async fn from_graph(&self) -> Result<Vec<Candidate>> {
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut cursor: Option<String> = None;

        // The whole last page is kept, so the list may overshoot the limit.
        while candidates.len() < self.profiles_check_limit {
            let page = self
                .platform
                .following(&self.agent.id, FOLLOWING_PAGE_SIZE, cursor.as_deref())
                .await?;
            if page.profiles.is_empty() {
                break;
            }
            candidates.extend(page.profiles.into_iter().map(Candidate::followed));

            if candidates.len() < self.profiles_check_limit && page.next == page.previous {
                break;
            }
            cursor = page.next;
        }
        let followed = candidates.len();

        let count = match self.platform.cached_timeline().await? {
            Some(_) => CACHED_TIMELINE_FETCH,
            None => UNCACHED_TIMELINE_FETCH,
        };
        let timeline = self.platform.home_timeline(count).await?;
        candidates.extend(
            distinct_authors(&timeline, &self.agent.username)
                .into_iter()
                .map(Candidate::discovered),
        );

        info!(
            followed,
            from_timeline = candidates.len() - followed,
            "Collected candidates from the social graph"
        );
        Ok(candidates)
    }

    async fn from_search(&self) -> Result<Vec<Candidate>> {
        let topic = {
            let mut rng = rand::rng();
            self.topics.choose(&mut rng).cloned()
        };
        let Some(topic) = topic else {
            warn!("No persona topics configured, search discovery has nothing to look for");
            return Ok(Vec::new());
        };

        self.pacer.pause(SEARCH_WARMUP).await;
        let posts = self
            .platform
            .search(&topic, self.tweet_fetch_limit)
            .await?;
        let candidates: Vec<Candidate> = distinct_authors(&posts, &self.agent.username)
            .into_iter()
            .map(Candidate::discovered)
            .collect();

        info!(topic = %topic, count = candidates.len(), "Collected candidates from search");
        Ok(candidates)
    }
}
