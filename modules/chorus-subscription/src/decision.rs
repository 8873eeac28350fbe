use std::sync::{Arc, LazyLock};
use std::time::Duration;

use ai_client::{truncate_to_char_boundary, TextCompletion};
use regex::{Captures, Regex};
use tracing::{debug, error, info};

use chorus_common::Persona;

use crate::dedup::ActivityWindow;
use crate::traits::Pacer;

pub const FOLLOW_TAG: &str = "[FOLLOW]";
pub const UNFOLLOW_TAG: &str = "[UNFOLLOW]";

static RE_FOLLOW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[FOLLOW\]").expect("static regex"));
static RE_UNFOLLOW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[UNFOLLOW\]").expect("static regex"));
static RE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("static regex"));

const ACTION_TEMPLATE: &str = "\
# INSTRUCTIONS: Decide whether {{agent_name}} (@{{agent_username}}) should follow or unfollow this account.
{{bio}}
{{post_directions}}

Guidelines:
- Only act on accounts whose posts are squarely about the character's core interests
- On-topic direct mentions count the most
- Ignore posts that are off-topic, generic viral content, promotion, or controversy outside the character's focus
- Large accounts only qualify when they are clearly relevant

Actions (reply with tags only):
[FOLLOW] - the posts match the character's topics almost perfectly
[UNFOLLOW] - most of the posts fall outside the guidelines above

Recent posts:
{{recent_posts}}

# Reply with qualifying action tags only. Default to no action unless the match is unmistakable.
Choose any of {{actions}} that apply, one per line, and nothing else.";

/// What the model asked for. Both flags may be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Decision {
    pub follow: bool,
    pub unfollow: bool,
}

/// First pass: a tag anywhere in the text, any case.
pub fn regex_pass(text: &str) -> Decision {
    Decision {
        follow: RE_FOLLOW.is_match(text),
        unfollow: RE_UNFOLLOW.is_match(text),
    }
}

/// Second pass: a line that is exactly a tag turns its flag on. Never clears.
pub fn line_pass(text: &str, prior: Decision) -> Decision {
    text.lines().map(str::trim).fold(prior, |mut d, line| {
        match line {
            FOLLOW_TAG => d.follow = true,
            UNFOLLOW_TAG => d.unfollow = true,
            _ => {}
        }
        d
    })
}

pub fn parse_decision(response: &str) -> Decision {
    let text = response.trim();
    line_pass(text, regex_pass(text))
}

/// Fill the action prompt for one candidate window.
pub fn render_prompt(persona: &Persona, agent_username: &str, window: &ActivityWindow) -> String {
    let recent_posts = window.render();
    let actions = format!("{FOLLOW_TAG}, {UNFOLLOW_TAG}");
    RE_PLACEHOLDER
        .replace_all(ACTION_TEMPLATE, |caps: &Captures| match &caps[1] {
            "agent_name" => persona.name.clone(),
            "agent_username" => agent_username.to_string(),
            "bio" => persona.bio_text(),
            "post_directions" => persona.post_directions_text(),
            "recent_posts" => recent_posts.clone(),
            "actions" => actions.clone(),
            _ => String::new(),
        })
        .into_owned()
}

/// Capped exponential backoff for the completion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_attempts: 8,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay after the `failed_attempt`-th failure (1-based).
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(failed_attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("text completion failed after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },
}

pub struct DecisionEngine {
    completion: Arc<dyn TextCompletion>,
    pacer: Arc<dyn Pacer>,
    retry: RetryPolicy,
    persona: Persona,
    agent_username: String,
}

impl DecisionEngine {
    pub fn new(
        completion: Arc<dyn TextCompletion>,
        pacer: Arc<dyn Pacer>,
        retry: RetryPolicy,
        persona: Persona,
        agent_username: String,
    ) -> Self {
        Self {
            completion,
            pacer,
            retry,
            persona,
            agent_username,
        }
    }

    pub async fn decide(
        &self,
        candidate_username: &str,
        window: &ActivityWindow,
    ) -> Result<Decision, DecisionError> {
        let prompt = render_prompt(&self.persona, &self.agent_username, window);
        let mut last_error = String::new();

        for attempt in 1..=self.retry.max_attempts {
            match self.completion.complete(&prompt).await {
                Ok(response) => {
                    let decision = parse_decision(&response);
                    debug!(
                        username = candidate_username,
                        model = self.completion.model(),
                        follow = decision.follow,
                        unfollow = decision.unfollow,
                        response = truncate_to_char_boundary(response.trim(), 200),
                        "Parsed action response"
                    );
                    return Ok(decision);
                }
                Err(e) => {
                    error!(
                        username = candidate_username,
                        attempt,
                        error = %e,
                        "Error generating actions"
                    );
                    last_error = e.to_string();
                    if attempt < self.retry.max_attempts {
                        let delay = self.retry.delay_after(attempt);
                        info!(delay_ms = delay.as_millis() as u64, "Retrying action generation");
                        self.pacer.pause(delay).await;
                    }
                }
            }
        }

        Err(DecisionError::RetryExhausted {
            attempts: self.retry.max_attempts,
            last_error,
        })
    }
}
