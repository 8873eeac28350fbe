use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ai_client::TextCompletion;
use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use chorus_common::{Config, Persona, Profile};

use crate::candidates::{Candidate, CandidateSource, DiscoveryMode, ProfileRef};
use crate::decision::{DecisionEngine, DecisionError, RetryPolicy};
use crate::dedup::DedupGate;
use crate::executor::{ActionExecutor, ActionKind, ActionOutcome};
use crate::traits::{Pacer, ProcessedLedger, SocialPlatform, TokioPacer};

/// Wait after a failed or skipped iteration.
pub const ERROR_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Loop settings, usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub dry_run: bool,
    pub graph_enabled: bool,
    pub search_fallback_enabled: bool,
    pub action_interval: Duration,
    pub profiles_check_limit: usize,
    pub tweet_fetch_limit: u32,
    /// Validated and logged; not used to filter candidates.
    pub target_users: Vec<String>,
    pub retry: RetryPolicy,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            graph_enabled: false,
            search_fallback_enabled: false,
            action_interval: Duration::from_secs(10 * 60),
            profiles_check_limit: 22,
            tweet_fetch_limit: 20,
            target_users: Vec::new(),
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&Config> for SubscriptionConfig {
    fn from(config: &Config) -> Self {
        Self {
            dry_run: config.dry_run,
            graph_enabled: config.start_users_subscription,
            search_fallback_enabled: config.allow_search_users_subscription,
            action_interval: Duration::from_secs(
                config.subscription_action_interval.max(1).saturating_mul(60),
            ),
            profiles_check_limit: config.profiles_check_limit,
            tweet_fetch_limit: config.subscription_tweet_fetch_limit,
            target_users: config.target_users.clone(),
            retry: RetryPolicy::with_max_attempts(config.decision_max_attempts),
        }
    }
}

/// Cooperative stop flag, checked at the top of each loop turn. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mode for the next iteration after one that produced `outcomes`.
pub fn next_mode(outcomes: &[ActionOutcome], search_fallback_enabled: bool) -> DiscoveryMode {
    let followed = outcomes.iter().any(|o| o.action == ActionKind::Follow);
    if !followed && search_fallback_enabled {
        DiscoveryMode::Search
    } else {
        DiscoveryMode::Graph
    }
}

/// Everything the client talks to.
#[derive(Clone, TypedBuilder)]
pub struct SubscriptionDeps {
    pub platform: Arc<dyn SocialPlatform>,
    pub ledger: Arc<dyn ProcessedLedger>,
    pub completion: Arc<dyn TextCompletion>,
    #[builder(default = Arc::new(TokioPacer) as Arc<dyn Pacer>)]
    pub pacer: Arc<dyn Pacer>,
    pub persona: Persona,
    /// The account the agent acts as.
    pub agent: Profile,
    #[builder(default)]
    pub stop: StopSignal,
}

pub struct SubscriptionClient {
    config: SubscriptionConfig,
    agent_id: Uuid,
    platform: Arc<dyn SocialPlatform>,
    pacer: Arc<dyn Pacer>,
    source: CandidateSource,
    gate: DedupGate,
    engine: DecisionEngine,
    executor: ActionExecutor,
    iteration: tokio::sync::Mutex<()>,
    last_process_time: Mutex<Option<DateTime<Utc>>>,
    running: AtomicBool,
    stop: StopSignal,
}

impl SubscriptionClient {
    pub fn new(deps: SubscriptionDeps, config: SubscriptionConfig) -> Self {
        let SubscriptionDeps {
            platform,
            ledger,
            completion,
            pacer,
            persona,
            agent,
            stop,
        } = deps;

        info!(
            username = %agent.username,
            dry_run = config.dry_run,
            graph_enabled = config.graph_enabled,
            search_fallback_enabled = config.search_fallback_enabled,
            action_interval_minutes = config.action_interval.as_secs() / 60,
            target_users = ?config.target_users,
            "Subscription client configuration"
        );

        let agent_id = persona.agent_id();
        let source = CandidateSource::new(
            platform.clone(),
            pacer.clone(),
            agent.clone(),
            persona.topics.clone(),
            config.profiles_check_limit,
            config.tweet_fetch_limit,
        );
        let gate = DedupGate::new(platform.clone(), ledger);
        let engine = DecisionEngine::new(
            completion,
            pacer.clone(),
            config.retry,
            persona,
            agent.username.clone(),
        );
        let executor = ActionExecutor::new(platform.clone(), pacer.clone(), config.dry_run);

        Self {
            config,
            agent_id,
            platform,
            pacer,
            source,
            gate,
            engine,
            executor,
            iteration: tokio::sync::Mutex::new(()),
            last_process_time: Mutex::new(None),
            running: AtomicBool::new(false),
            stop,
        }
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn last_process_time(&self) -> Option<DateTime<Utc>> {
        self.last_process_time.lock().ok().and_then(|t| *t)
    }

    /// Spawn the loop. `None` when disabled or already running.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.config.graph_enabled {
            if self.config.dry_run {
                info!("Users subscription disabled, dry run only reports actions when enabled");
            } else {
                info!("Users subscription disabled by configuration");
            }
            return None;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            info!("Users subscription already running");
            return None;
        }

        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            this.run_loop().await;
            this.running.store(false, Ordering::SeqCst);
        }))
    }

    /// Request a stop. An iteration in progress finishes first.
    pub fn stop(&self) {
        info!("Stopping users subscription");
        self.stop.request();
    }

    pub async fn run_loop(&self) {
        let mut mode = DiscoveryMode::Graph;

        while !self.stop.is_requested() {
            match self.run_iteration(mode).await {
                Ok(Some(outcomes)) => {
                    let follows = outcomes
                        .iter()
                        .filter(|o| o.action == ActionKind::Follow)
                        .count();
                    info!(processed = outcomes.len(), follows, "Processed users");

                    mode = next_mode(&outcomes, self.config.search_fallback_enabled);
                    info!(
                        minutes = self.config.action_interval.as_secs() / 60,
                        next_mode = %mode,
                        "Next users action processing scheduled"
                    );
                    self.pacer.pause(self.config.action_interval).await;
                }
                Ok(None) => {
                    // Another run held the guard. Wait the retry delay rather than spin.
                    self.pacer.pause(ERROR_RETRY_DELAY).await;
                }
                Err(e) => {
                    error!(error = %e, "Error in users action processing loop");
                    self.pacer.pause(ERROR_RETRY_DELAY).await;
                }
            }
        }

        info!("Users subscription loop stopped");
    }

    pub async fn run_iteration(&self, mode: DiscoveryMode) -> Result<Option<Vec<ActionOutcome>>> {
        info!(mode = %mode, "Discovering candidates");
        let candidates = self.source.discover(mode).await?;
        self.process_candidates(candidates).await
    }

    /// Run the decision pipeline over `candidates`. `None` if another run holds the guard.
    pub async fn process_candidates(
        &self,
        candidates: Vec<Candidate>,
    ) -> Result<Option<Vec<ActionOutcome>>> {
        let Ok(_guard) = self.iteration.try_lock() else {
            info!("Already processing users actions, skipping");
            return Ok(None);
        };

        if let Ok(mut last) = self.last_process_time.lock() {
            *last = Some(Utc::now());
        }
        info!(count = candidates.len(), dry_run = self.config.dry_run, "Processing users actions");

        let mut outcomes = Vec::new();
        for candidate in candidates {
            let username = candidate.profile.username().to_string();
            match self.process_candidate(candidate).await {
                Ok(mut done) => outcomes.append(&mut done),
                Err(e) => {
                    error!(username = %username, error = %e, "Error processing user");
                    return Err(e);
                }
            }
        }

        Ok(Some(outcomes))
    }

    async fn process_candidate(&self, candidate: Candidate) -> Result<Vec<ActionOutcome>> {
        self.executor.pace().await;

        let profile = match candidate.profile {
            ProfileRef::Resolved(profile) => profile,
            ProfileRef::Unresolved(username) => self.platform.profile(&username).await?,
        };

        let Some(window) = self.gate.unseen_activity(self.agent_id, &profile).await? else {
            return Ok(Vec::new());
        };

        let decision = match self.engine.decide(&profile.username, &window).await {
            Ok(decision) => decision,
            Err(e @ DecisionError::RetryExhausted { .. }) => {
                warn!(username = %profile.username, error = %e, "No actions generated");
                return Ok(Vec::new());
            }
        };
        self.gate.mark_processed(&window).await;

        self.executor.apply(candidate.following, &profile, decision).await
    }
}
