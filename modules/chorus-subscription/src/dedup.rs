use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use chorus_common::{string_to_uuid, Profile};

use crate::traits::{ProcessedLedger, SocialPlatform};

/// Posts fetched per candidate, and the most a window will ever hold.
pub const ACTIVITY_WINDOW_SIZE: usize = 10;

/// Ledger key for one (item, agent) pair.
pub fn processed_item_id(item_id: &str, agent_id: Uuid) -> Uuid {
    string_to_uuid(&format!("{item_id}-{agent_id}"))
}

/// Collapse `\r\n` and `\n` into single spaces.
pub fn collapse_line_breaks(text: &str) -> String {
    text.replace("\r\n", " ").replace('\n', " ")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityItem {
    pub ledger_id: Uuid,
    pub post_id: String,
    pub text: String,
}

/// A candidate's recent posts that have not been shown to the model yet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActivityWindow {
    pub items: Vec<ActivityItem>,
}

impl ActivityWindow {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `"{n}. {text}"` per item, 1-based, newline-joined.
    pub fn render(&self) -> String {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {}", i + 1, item.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct DedupGate {
    platform: Arc<dyn SocialPlatform>,
    ledger: Arc<dyn ProcessedLedger>,
}

impl DedupGate {
    pub fn new(platform: Arc<dyn SocialPlatform>, ledger: Arc<dyn ProcessedLedger>) -> Self {
        Self { platform, ledger }
    }

    /// The candidate's recent posts minus everything already in the ledger.
    /// `None` when the candidate has no posts at all.
    pub async fn unseen_activity(
        &self,
        agent_id: Uuid,
        profile: &Profile,
    ) -> Result<Option<ActivityWindow>> {
        let mut posts = self
            .platform
            .user_posts(&profile.id, ACTIVITY_WINDOW_SIZE as u32)
            .await?;
        posts.truncate(ACTIVITY_WINDOW_SIZE);

        if posts.is_empty() {
            info!(username = %profile.username, "No posts found for user");
            return Ok(None);
        }

        let mut window = ActivityWindow::default();
        for post in posts {
            let ledger_id = processed_item_id(&post.id, agent_id);
            let seen = match self.ledger.contains(ledger_id).await {
                Ok(seen) => seen,
                Err(e) => {
                    error!(username = %profile.username, error = %e, "Ledger lookup failed");
                    return Err(e);
                }
            };
            if seen {
                debug!(username = %profile.username, post_id = %post.id, "Post already processed");
                continue;
            }
            window.items.push(ActivityItem {
                ledger_id,
                text: collapse_line_breaks(&post.text),
                post_id: post.id,
            });
        }

        Ok(Some(window))
    }

    /// Record every item of `window`. Failures are logged and skipped.
    pub async fn mark_processed(&self, window: &ActivityWindow) {
        for item in &window.items {
            if let Err(e) = self.ledger.record(item.ledger_id, &item.post_id).await {
                warn!(post_id = %item.post_id, error = %e, "Failed to record processed item");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{post, profile, MemoryLedger, MockPlatform};

    fn agent() -> Uuid {
        string_to_uuid("Ada")
    }

    #[test]
    fn ledger_id_is_stable_per_agent() {
        let a = processed_item_id("123", agent());
        assert_eq!(a, processed_item_id("123", agent()));
        assert_ne!(a, processed_item_id("123", string_to_uuid("Grace")));
        assert_eq!(a, string_to_uuid(&format!("123-{}", agent())));
    }

    #[test]
    fn line_breaks_collapse() {
        assert_eq!(collapse_line_breaks("a\nb\r\nc"), "a b c");
    }

    #[test]
    fn render_numbers_items() {
        let window = ActivityWindow {
            items: vec![
                ActivityItem { ledger_id: Uuid::nil(), post_id: "1".into(), text: "first".into() },
                ActivityItem { ledger_id: Uuid::nil(), post_id: "2".into(), text: "second".into() },
            ],
        };
        assert_eq!(window.render(), "1. first\n2. second");
    }

    #[tokio::test]
    async fn no_posts_means_no_window() {
        let gate = DedupGate::new(
            Arc::new(MockPlatform::new().on_user_posts("7", vec![])),
            Arc::new(MemoryLedger::new()),
        );
        let window = gate.unseen_activity(agent(), &profile("7", "bob")).await.unwrap();
        assert!(window.is_none());
    }

    #[tokio::test]
    async fn processed_posts_are_filtered_and_window_is_capped() {
        let posts: Vec<_> = (0..12)
            .map(|i| post(&i.to_string(), "bob", &format!("line\n{i}")))
            .collect();
        let ledger = MemoryLedger::new().with_processed([processed_item_id("0", agent())]);
        let gate = DedupGate::new(
            Arc::new(MockPlatform::new().on_user_posts("7", posts)),
            Arc::new(ledger),
        );

        let window = gate
            .unseen_activity(agent(), &profile("7", "bob"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(window.len(), 9);
        assert_eq!(window.items[0].post_id, "1");
        assert_eq!(window.items[0].text, "line 1");
    }

    #[tokio::test]
    async fn all_seen_gives_empty_window() {
        let ledger = MemoryLedger::new().with_processed([processed_item_id("1", agent())]);
        let gate = DedupGate::new(
            Arc::new(MockPlatform::new().on_user_posts("7", vec![post("1", "bob", "x")])),
            Arc::new(ledger),
        );
        let window = gate.unseen_activity(agent(), &profile("7", "bob")).await.unwrap();
        assert_eq!(window, Some(ActivityWindow::default()));
    }

    #[tokio::test]
    async fn ledger_failure_propagates() {
        let gate = DedupGate::new(
            Arc::new(MockPlatform::new().on_user_posts("7", vec![post("1", "bob", "x")])),
            Arc::new(MemoryLedger::new().failing()),
        );
        assert!(gate.unseen_activity(agent(), &profile("7", "bob")).await.is_err());
    }

    #[tokio::test]
    async fn mark_processed_records_every_item() {
        let ledger = Arc::new(MemoryLedger::new());
        let gate = DedupGate::new(
            Arc::new(MockPlatform::new().on_user_posts("7", vec![post("1", "bob", "x"), post("2", "bob", "y")])),
            ledger.clone(),
        );
        let window = gate
            .unseen_activity(agent(), &profile("7", "bob"))
            .await
            .unwrap()
            .unwrap();
        gate.mark_processed(&window).await;

        assert_eq!(ledger.len(), 2);
        assert!(ledger.holds(processed_item_id("2", agent())));
    }
}
