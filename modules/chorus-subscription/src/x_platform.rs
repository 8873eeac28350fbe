use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use chorus_common::{Post, Profile};
use x_client::{AuthoredTweet, User, XClient};

use crate::traits::{FollowingPage, SocialPlatform};

/// `SocialPlatform` over the X API v2, acting as one authenticated account.
///
/// The most recent home timeline is kept in memory and served as the cached timeline.
pub struct XPlatform {
    client: XClient,
    agent: Profile,
    timeline_cache: Mutex<Option<Vec<Post>>>,
}

impl XPlatform {
    pub fn new(client: XClient, agent: Profile) -> Self {
        Self {
            client,
            agent,
            timeline_cache: Mutex::new(None),
        }
    }

    /// Resolve the account the agent acts as, by handle.
    pub async fn resolve_agent(client: &XClient, username: &str) -> Result<Profile> {
        Ok(profile_from(client.user_by_username(username).await?))
    }
}

fn profile_from(user: User) -> Profile {
    Profile {
        id: user.id,
        username: user.username,
        display_name: user.name,
    }
}

fn post_from(tweet: AuthoredTweet) -> Post {
    Post {
        id: tweet.id,
        text: tweet.text,
        author_id: tweet.author_id,
        username: tweet.username,
        created_at: tweet.created_at,
    }
}

/// The X API drops `next_token` on the last page. Report the request cursor in
/// both slots so callers see a repeating cursor and stop.
fn page_cursors(
    request_cursor: Option<&str>,
    next_token: Option<String>,
    previous_token: Option<String>,
) -> (Option<String>, Option<String>) {
    match next_token {
        Some(next) => (Some(next), previous_token),
        None => {
            let here = request_cursor.map(String::from);
            (here.clone(), here)
        }
    }
}

#[async_trait]
impl SocialPlatform for XPlatform {
    async fn following(
        &self,
        user_id: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<FollowingPage> {
        let page = self.client.following(user_id, page_size, cursor).await?;
        let (next, previous) = page_cursors(cursor, page.next_token, page.previous_token);
        Ok(FollowingPage {
            profiles: page.users.into_iter().map(profile_from).collect(),
            next,
            previous,
        })
    }

    async fn cached_timeline(&self) -> Result<Option<Vec<Post>>> {
        let cache = self
            .timeline_cache
            .lock()
            .map_err(|_| anyhow::anyhow!("timeline cache poisoned"))?;
        Ok(cache.clone())
    }

    async fn home_timeline(&self, count: u32) -> Result<Vec<Post>> {
        let page = self.client.home_timeline(&self.agent.id, count, None).await?;
        let posts: Vec<Post> = page.tweets.into_iter().map(post_from).collect();

        let mut cache = self
            .timeline_cache
            .lock()
            .map_err(|_| anyhow::anyhow!("timeline cache poisoned"))?;
        *cache = Some(posts.clone());
        Ok(posts)
    }

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Post>> {
        let page = self.client.search_recent(query, limit).await?;
        Ok(page.tweets.into_iter().map(post_from).collect())
    }

    async fn user_posts(&self, user_id: &str, limit: u32) -> Result<Vec<Post>> {
        let page = self.client.user_tweets(user_id, limit).await?;
        Ok(page.tweets.into_iter().map(post_from).collect())
    }

    async fn profile(&self, username: &str) -> Result<Profile> {
        Ok(profile_from(self.client.user_by_username(username).await?))
    }

    async fn follow(&self, profile: &Profile) -> Result<()> {
        let state = self.client.follow(&self.agent.id, &profile.id).await?;
        if state.pending_follow {
            debug!(username = %profile.username, "Follow request pending approval");
        } else if !state.following {
            warn!(username = %profile.username, "Follow call returned not-following");
        }
        Ok(())
    }

    async fn unfollow(&self, profile: &Profile) -> Result<()> {
        let state = self.client.unfollow(&self.agent.id, &profile.id).await?;
        if state.following {
            warn!(username = %profile.username, "Unfollow call returned still-following");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_next_token_repeats_request_cursor() {
        let (next, prev) = page_cursors(Some("abc"), None, Some("zzz".into()));
        assert_eq!(next.as_deref(), Some("abc"));
        assert_eq!(next, prev);
    }

    #[test]
    fn single_page_list_reports_equal_empty_cursors() {
        let (next, prev) = page_cursors(None, None, None);
        assert_eq!(next, None);
        assert_eq!(next, prev);
    }

    #[test]
    fn first_page_cursors_differ() {
        let (next, prev) = page_cursors(None, Some("p2".into()), None);
        assert_eq!(next.as_deref(), Some("p2"));
        assert_ne!(next, prev);
    }

    #[test]
    fn authored_tweet_maps_to_post() {
        let post = post_from(AuthoredTweet {
            id: "1".into(),
            text: "hello".into(),
            author_id: Some("42".into()),
            username: Some("ada".into()),
            author_name: Some("Ada".into()),
            created_at: None,
        });
        assert_eq!(post.username.as_deref(), Some("ada"));
        assert_eq!(post.author_id.as_deref(), Some("42"));
    }
}
