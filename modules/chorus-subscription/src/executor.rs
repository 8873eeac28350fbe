use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use chorus_common::Profile;

use crate::decision::Decision;
use crate::traits::{Pacer, SocialPlatform};

/// Fixed wait before each candidate is processed.
pub const CANDIDATE_PACING: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Follow,
    Unfollow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action: ActionKind,
    pub username: String,
}

pub struct ActionExecutor {
    platform: Arc<dyn SocialPlatform>,
    pacer: Arc<dyn Pacer>,
    dry_run: bool,
}

impl ActionExecutor {
    pub fn new(platform: Arc<dyn SocialPlatform>, pacer: Arc<dyn Pacer>, dry_run: bool) -> Self {
        Self {
            platform,
            pacer,
            dry_run,
        }
    }

    pub async fn pace(&self) {
        self.pacer.pause(CANDIDATE_PACING).await;
    }

    /// Carry out `decision` against `profile`. Follow only when not already
    /// following, unfollow only when following. Dry-run reports without acting.
    pub async fn apply(
        &self,
        following: Option<bool>,
        profile: &Profile,
        decision: Decision,
    ) -> Result<Vec<ActionOutcome>> {
        let mut outcomes = Vec::new();
        let is_following = following == Some(true);

        if decision.follow && !is_following {
            info!(username = %profile.username, dry_run = self.dry_run, "Following user");
            if !self.dry_run {
                self.platform.follow(profile).await?;
            }
            outcomes.push(ActionOutcome {
                action: ActionKind::Follow,
                username: profile.username.clone(),
            });
        }

        if decision.unfollow && is_following {
            info!(username = %profile.username, dry_run = self.dry_run, "Unfollowing user");
            if !self.dry_run {
                self.platform.unfollow(profile).await?;
            }
            outcomes.push(ActionOutcome {
                action: ActionKind::Unfollow,
                username: profile.username.clone(),
            });
        }

        Ok(outcomes)
    }
}
