// Test mocks for the subscription loop.
//
// One mock per trait boundary:
// - MockPlatform (SocialPlatform): HashMap-based responses, records every write
// - MemoryLedger (ProcessedLedger): in-memory id set
// - RecordingPacer (Pacer): returns immediately, records durations, optional hook
// - ScriptedCompletion (TextCompletion): queued replies and failures
//
// Plus helpers for constructing Profile, Post and Persona.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ai_client::TextCompletion;
use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use chorus_common::{Persona, Post, Profile};

use crate::traits::{FollowingPage, Pacer, ProcessedLedger, SocialPlatform};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn profile(id: &str, username: &str) -> Profile {
    Profile {
        id: id.to_string(),
        username: username.to_string(),
        display_name: username.to_string(),
    }
}

pub fn post(id: &str, username: &str, text: &str) -> Post {
    Post {
        id: id.to_string(),
        text: text.to_string(),
        author_id: None,
        username: Some(username.to_string()),
        created_at: None,
    }
}

pub fn persona() -> Persona {
    Persona {
        name: "Ada".to_string(),
        bio: vec!["Builds compilers.".to_string()],
        post_directions: vec!["Be precise.".to_string()],
        topics: vec!["rust".to_string()],
    }
}

// ---------------------------------------------------------------------------
// MockPlatform
// ---------------------------------------------------------------------------

/// Ordered record of side effects shared between mocks.
pub type EventLog = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
struct PlatformCalls {
    following_cursors: Vec<Option<String>>,
    home_timeline_counts: Vec<u32>,
    searches: Vec<(String, u32)>,
    profile_lookups: Vec<String>,
    follows: Vec<String>,
    unfollows: Vec<String>,
}

/// HashMap-based platform. Returns `Err` for unregistered following pages,
/// searches, user posts and profiles. The home timeline defaults to empty.
/// Builder pattern: `.on_following_page()`, `.on_home_timeline()`, `.on_search()`,
/// `.on_user_posts()`, `.on_profile()`.
///
/// With `.with_event_log()` each follow and unfollow is also appended to a
/// shared log as `follow:<username>` / `unfollow:<username>`.
#[derive(Default)]
pub struct MockPlatform {
    following_pages: HashMap<Option<String>, FollowingPage>,
    home_timeline: Vec<Post>,
    searches: HashMap<String, Vec<Post>>,
    user_posts: HashMap<String, Vec<Post>>,
    profiles: HashMap<String, Profile>,
    fail_follow: bool,
    events: Option<EventLog>,
    timeline_cache: Mutex<Option<Vec<Post>>>,
    calls: Mutex<PlatformCalls>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_following_page(mut self, cursor: Option<&str>, page: FollowingPage) -> Self {
        self.following_pages.insert(cursor.map(String::from), page);
        self
    }

    pub fn with_cached_timeline(self, posts: Vec<Post>) -> Self {
        *self.timeline_cache.lock().unwrap() = Some(posts);
        self
    }

    pub fn on_home_timeline(mut self, posts: Vec<Post>) -> Self {
        self.home_timeline = posts;
        self
    }

    pub fn on_search(mut self, query: &str, posts: Vec<Post>) -> Self {
        self.searches.insert(query.to_string(), posts);
        self
    }

    pub fn on_user_posts(mut self, user_id: &str, posts: Vec<Post>) -> Self {
        self.user_posts.insert(user_id.to_string(), posts);
        self
    }

    pub fn on_profile(mut self, profile: Profile) -> Self {
        self.profiles.insert(profile.username.clone(), profile);
        self
    }

    pub fn failing_follow(mut self) -> Self {
        self.fail_follow = true;
        self
    }

    pub fn with_event_log(mut self, log: EventLog) -> Self {
        self.events = Some(log);
        self
    }

    fn log_event(&self, event: String) {
        if let Some(log) = &self.events {
            log.lock().unwrap().push(event);
        }
    }

    pub fn following_cursors(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().following_cursors.clone()
    }

    pub fn home_timeline_counts(&self) -> Vec<u32> {
        self.calls.lock().unwrap().home_timeline_counts.clone()
    }

    pub fn searches(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().searches.clone()
    }

    pub fn profile_lookups(&self) -> Vec<String> {
        self.calls.lock().unwrap().profile_lookups.clone()
    }

    pub fn follows(&self) -> Vec<String> {
        self.calls.lock().unwrap().follows.clone()
    }

    pub fn unfollows(&self) -> Vec<String> {
        self.calls.lock().unwrap().unfollows.clone()
    }
}

#[async_trait]
impl SocialPlatform for MockPlatform {
    async fn following(
        &self,
        _user_id: &str,
        _page_size: u32,
        cursor: Option<&str>,
    ) -> Result<FollowingPage> {
        let key = cursor.map(String::from);
        self.calls.lock().unwrap().following_cursors.push(key.clone());
        self.following_pages
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("MockPlatform: no following page for {key:?}"))
    }

    async fn cached_timeline(&self) -> Result<Option<Vec<Post>>> {
        Ok(self.timeline_cache.lock().unwrap().clone())
    }

    async fn home_timeline(&self, count: u32) -> Result<Vec<Post>> {
        self.calls.lock().unwrap().home_timeline_counts.push(count);
        *self.timeline_cache.lock().unwrap() = Some(self.home_timeline.clone());
        Ok(self.home_timeline.clone())
    }

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Post>> {
        self.calls
            .lock()
            .unwrap()
            .searches
            .push((query.to_string(), limit));
        self.searches
            .get(query)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("MockPlatform: no search registered for {query}"))
    }

    async fn user_posts(&self, user_id: &str, _limit: u32) -> Result<Vec<Post>> {
        self.user_posts
            .get(user_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("MockPlatform: no posts registered for {user_id}"))
    }

    async fn profile(&self, username: &str) -> Result<Profile> {
        self.calls
            .lock()
            .unwrap()
            .profile_lookups
            .push(username.to_string());
        self.profiles
            .get(username)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("MockPlatform: no profile registered for {username}"))
    }

    async fn follow(&self, profile: &Profile) -> Result<()> {
        if self.fail_follow {
            bail!("MockPlatform: follow rejected for {}", profile.username);
        }
        self.log_event(format!("follow:{}", profile.username));
        self.calls
            .lock()
            .unwrap()
            .follows
            .push(profile.username.clone());
        Ok(())
    }

    async fn unfollow(&self, profile: &Profile) -> Result<()> {
        self.log_event(format!("unfollow:{}", profile.username));
        self.calls
            .lock()
            .unwrap()
            .unfollows
            .push(profile.username.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryLedger
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryLedger {
    ids: Mutex<HashSet<Uuid>>,
    failing: bool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processed(self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.ids.lock().unwrap().extend(ids);
        self
    }

    /// Every lookup and write fails.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn holds(&self, id: Uuid) -> bool {
        self.ids.lock().unwrap().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap().len()
    }
}

#[async_trait]
impl ProcessedLedger for MemoryLedger {
    async fn contains(&self, id: Uuid) -> Result<bool> {
        if self.failing {
            bail!("MemoryLedger: lookup failed");
        }
        Ok(self.ids.lock().unwrap().contains(&id))
    }

    async fn record(&self, id: Uuid, _item_ref: &str) -> Result<()> {
        if self.failing {
            bail!("MemoryLedger: write failed");
        }
        self.ids.lock().unwrap().insert(id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingPacer
// ---------------------------------------------------------------------------

type PauseHook = Box<dyn Fn(Duration) + Send + Sync>;

/// Never sleeps. Records each requested pause and runs the hook, if any.
#[derive(Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
    hook: Option<PauseHook>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_pause(mut self, hook: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }

    pub fn count(&self, duration: Duration) -> usize {
        self.pauses
            .lock()
            .unwrap()
            .iter()
            .filter(|d| **d == duration)
            .count()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
        if let Some(hook) = &self.hook {
            hook(duration);
        }
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// ScriptedCompletion
// ---------------------------------------------------------------------------

/// Replays queued replies in order, then falls back to the default
/// (an empty reply unless set).
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Result<String, String>>>,
    fallback: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl Default for ScriptedCompletion {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(String::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.script.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.script.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    pub fn default_reply(mut self, text: &str) -> Self {
        self.fallback = Ok(text.to_string());
        self
    }

    pub fn default_failure(mut self, message: &str) -> Self {
        self.fallback = Err(message.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextCompletion for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.script.lock().unwrap().pop_front();
        match next.unwrap_or_else(|| self.fallback.clone()) {
            Ok(text) => Ok(text),
            Err(message) => bail!("ScriptedCompletion: {message}"),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
