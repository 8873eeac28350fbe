//! End-to-end tests for the subscription loop, run entirely against the
//! `testing` mocks. No network, database or wall-clock waits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use chorus_subscription::candidates::ProfileRef;
use chorus_subscription::dedup::processed_item_id;
use chorus_subscription::executor::CANDIDATE_PACING;
use chorus_subscription::scheduler::ERROR_RETRY_DELAY;
use chorus_subscription::testing::{
    persona, post, profile, EventLog, MemoryLedger, MockPlatform, RecordingPacer,
    ScriptedCompletion,
};
use chorus_subscription::{
    ActionKind, ActionOutcome, Candidate, DiscoveryMode, FollowingPage, Pacer, RetryPolicy,
    StopSignal, SubscriptionClient, SubscriptionConfig, SubscriptionDeps,
};

struct Harness {
    platform: Arc<MockPlatform>,
    ledger: Arc<MemoryLedger>,
    completion: Arc<ScriptedCompletion>,
}

impl Harness {
    fn new(platform: MockPlatform, completion: ScriptedCompletion) -> Self {
        Self {
            platform: Arc::new(platform),
            ledger: Arc::new(MemoryLedger::new()),
            completion: Arc::new(completion),
        }
    }

    fn client(
        &self,
        pacer: Arc<dyn Pacer>,
        stop: StopSignal,
        config: SubscriptionConfig,
    ) -> Arc<SubscriptionClient> {
        let deps = SubscriptionDeps::builder()
            .platform(self.platform.clone())
            .ledger(self.ledger.clone())
            .completion(self.completion.clone())
            .pacer(pacer)
            .persona(persona())
            .agent(profile("me", "chorus_bot"))
            .stop(stop)
            .build();
        Arc::new(SubscriptionClient::new(deps, config))
    }
}

fn enabled() -> SubscriptionConfig {
    SubscriptionConfig {
        graph_enabled: true,
        ..SubscriptionConfig::default()
    }
}

fn resolved(id: &str, username: &str, following: Option<bool>) -> Candidate {
    Candidate {
        profile: ProfileRef::Resolved(profile(id, username)),
        following,
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_candidate_is_paced_even_when_skipped() {
    let harness = Harness::new(
        MockPlatform::new()
            .on_user_posts("1", vec![post("a", "bob", "rust tips")])
            .on_user_posts("2", vec![])
            .on_user_posts("3", vec![post("c", "dan", "compilers")]),
        ScriptedCompletion::new(),
    );
    let pacer = Arc::new(RecordingPacer::new());
    let client = harness.client(pacer.clone(), StopSignal::default(), enabled());

    let candidates = vec![
        resolved("1", "bob", Some(false)),
        resolved("2", "carol", Some(false)),
        resolved("3", "dan", None),
    ];
    let outcomes = client.process_candidates(candidates).await.unwrap().unwrap();

    assert!(outcomes.is_empty());
    assert_eq!(pacer.count(CANDIDATE_PACING), 3);
    assert_eq!(harness.completion.calls(), 2);
}

#[tokio::test]
async fn follow_decision_on_followed_account_is_a_no_op() {
    let harness = Harness::new(
        MockPlatform::new().on_user_posts("1", vec![post("a", "bob", "rust")]),
        ScriptedCompletion::new().default_reply("[FOLLOW]"),
    );
    let client = harness.client(Arc::new(RecordingPacer::new()), StopSignal::default(), enabled());

    let outcomes = client
        .process_candidates(vec![resolved("1", "bob", Some(true))])
        .await
        .unwrap()
        .unwrap();

    assert!(outcomes.is_empty());
    assert!(harness.platform.follows().is_empty());
}

#[tokio::test]
async fn follow_decision_on_stranger_follows_once() {
    let harness = Harness::new(
        MockPlatform::new()
            .on_profile(profile("9", "erin"))
            .on_user_posts("9", vec![post("a", "erin", "borrow checker")]),
        ScriptedCompletion::new().reply("Sure.\n[follow]"),
    );
    let client = harness.client(Arc::new(RecordingPacer::new()), StopSignal::default(), enabled());

    let candidate = Candidate {
        profile: ProfileRef::Unresolved("erin".into()),
        following: None,
    };
    let outcomes = client.process_candidates(vec![candidate]).await.unwrap().unwrap();

    assert_eq!(
        outcomes,
        vec![ActionOutcome {
            action: ActionKind::Follow,
            username: "erin".into()
        }]
    );
    assert_eq!(harness.platform.follows(), vec!["erin"]);
    assert_eq!(harness.platform.profile_lookups(), vec!["erin"]);
    assert!(client.last_process_time().is_some());
}

#[tokio::test]
async fn processed_items_are_not_shown_again() {
    let harness = Harness::new(
        MockPlatform::new().on_user_posts("1", vec![post("p1", "bob", "first rust post")]),
        ScriptedCompletion::new(),
    );
    let client = harness.client(Arc::new(RecordingPacer::new()), StopSignal::default(), enabled());

    client
        .process_candidates(vec![resolved("1", "bob", Some(false))])
        .await
        .unwrap();
    client
        .process_candidates(vec![resolved("1", "bob", Some(false))])
        .await
        .unwrap();

    let prompts = harness.completion.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("1. first rust post"));
    assert!(!prompts[1].contains("first rust post"));
    assert!(harness
        .ledger
        .holds(processed_item_id("p1", persona().agent_id())));
}

#[tokio::test]
async fn exhausted_retries_skip_the_candidate_only() {
    let harness = Harness::new(
        MockPlatform::new()
            .on_user_posts("1", vec![post("a", "bob", "x")])
            .on_user_posts("2", vec![post("b", "carol", "y")]),
        ScriptedCompletion::new()
            .fail("overloaded")
            .fail("overloaded")
            .reply("[FOLLOW]"),
    );
    let config = SubscriptionConfig {
        retry: RetryPolicy::with_max_attempts(2),
        ..enabled()
    };
    let client = harness.client(Arc::new(RecordingPacer::new()), StopSignal::default(), config);

    let outcomes = client
        .process_candidates(vec![
            resolved("1", "bob", Some(false)),
            resolved("2", "carol", Some(false)),
        ])
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].username, "carol");
    assert!(!harness.ledger.holds(processed_item_id("a", persona().agent_id())));
}

#[tokio::test]
async fn candidate_failure_aborts_the_rest() {
    let harness = Harness::new(
        MockPlatform::new().on_user_posts("2", vec![post("b", "carol", "y")]),
        ScriptedCompletion::new(),
    );
    let pacer = Arc::new(RecordingPacer::new());
    let client = harness.client(pacer.clone(), StopSignal::default(), enabled());

    let result = client
        .process_candidates(vec![
            Candidate {
                profile: ProfileRef::Unresolved("ghost".into()),
                following: None,
            },
            resolved("2", "carol", Some(false)),
        ])
        .await;

    assert!(result.is_err());
    assert_eq!(pacer.count(CANDIDATE_PACING), 1);
    assert_eq!(harness.completion.calls(), 0);
}

#[tokio::test]
async fn rejected_follow_aborts_after_recording_the_window() {
    let harness = Harness::new(
        MockPlatform::new()
            .on_user_posts("1", vec![post("a", "bob", "rust")])
            .on_user_posts("2", vec![post("b", "carol", "y")])
            .failing_follow(),
        ScriptedCompletion::new().default_reply("[FOLLOW]"),
    );
    let pacer = Arc::new(RecordingPacer::new());
    let client = harness.client(pacer.clone(), StopSignal::default(), enabled());

    let result = client
        .process_candidates(vec![
            resolved("1", "bob", Some(false)),
            resolved("2", "carol", Some(false)),
        ])
        .await;

    assert!(result.is_err());
    assert_eq!(pacer.count(CANDIDATE_PACING), 1);
    assert_eq!(harness.completion.calls(), 1);
    assert!(harness.ledger.holds(processed_item_id("a", persona().agent_id())));
    assert!(!harness.ledger.holds(processed_item_id("b", persona().agent_id())));
}

#[tokio::test]
async fn pacing_comes_before_each_follow_and_unfollow() {
    let events: EventLog = Arc::new(Mutex::new(Vec::new()));
    let harness = Harness::new(
        MockPlatform::new()
            .on_user_posts("1", vec![post("a", "bob", "rust")])
            .on_user_posts("2", vec![post("b", "carol", "spam")])
            .with_event_log(events.clone()),
        ScriptedCompletion::new().reply("[FOLLOW]").reply("[UNFOLLOW]"),
    );
    let pacer = {
        let events = events.clone();
        Arc::new(RecordingPacer::new().on_pause(move |_| {
            events.lock().unwrap().push("pause".to_string());
        }))
    };
    let client = harness.client(pacer, StopSignal::default(), enabled());

    client
        .process_candidates(vec![
            resolved("1", "bob", Some(false)),
            resolved("2", "carol", Some(true)),
        ])
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec!["pause", "follow:bob", "pause", "unfollow:carol"]
    );
}

#[tokio::test]
async fn dry_run_reports_without_following() {
    let harness = Harness::new(
        MockPlatform::new().on_user_posts("1", vec![post("a", "bob", "rust")]),
        ScriptedCompletion::new().default_reply("[FOLLOW]"),
    );
    let config = SubscriptionConfig {
        dry_run: true,
        ..enabled()
    };
    let client = harness.client(Arc::new(RecordingPacer::new()), StopSignal::default(), config);

    let outcomes = client
        .process_candidates(vec![resolved("1", "bob", Some(false))])
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(harness.platform.follows().is_empty());
}

#[tokio::test]
async fn zero_candidates_is_a_successful_iteration() {
    let harness = Harness::new(
        MockPlatform::new().on_following_page(None, FollowingPage::default()),
        ScriptedCompletion::new(),
    );
    let client = harness.client(Arc::new(RecordingPacer::new()), StopSignal::default(), enabled());

    let outcomes = client.run_iteration(DiscoveryMode::Graph).await.unwrap();
    assert_eq!(outcomes, Some(vec![]));
}

#[tokio::test]
async fn repeated_cursor_reads_one_following_page() {
    let harness = Harness::new(
        MockPlatform::new()
            .on_following_page(
                None,
                FollowingPage {
                    profiles: vec![profile("1", "bob")],
                    next: Some("c".into()),
                    previous: Some("c".into()),
                },
            )
            .on_user_posts("1", vec![]),
        ScriptedCompletion::new(),
    );
    let client = harness.client(Arc::new(RecordingPacer::new()), StopSignal::default(), enabled());

    client.run_iteration(DiscoveryMode::Graph).await.unwrap();
    assert_eq!(harness.platform.following_cursors(), vec![None]);
}

// ---------------------------------------------------------------------------
// Single-flight guard
// ---------------------------------------------------------------------------

/// Blocks inside `pause` until released.
#[derive(Default)]
struct GatedPacer {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl Pacer for GatedPacer {
    async fn pause(&self, _duration: Duration) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

#[tokio::test]
async fn overlapping_iteration_is_skipped() {
    let harness = Harness::new(
        MockPlatform::new().on_user_posts("1", vec![post("a", "bob", "rust")]),
        ScriptedCompletion::new(),
    );
    let pacer = Arc::new(GatedPacer::default());
    let client = harness.client(pacer.clone(), StopSignal::default(), enabled());

    let first = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .process_candidates(vec![resolved("1", "bob", Some(false))])
                .await
        }
    });
    pacer.entered.notified().await;

    let second = client.process_candidates(vec![]).await.unwrap();
    assert!(second.is_none());

    pacer.release.notify_one();
    let first = first.await.unwrap().unwrap();
    assert_eq!(first, Some(vec![]));
}

// ---------------------------------------------------------------------------
// Loop control
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_is_disabled_by_config() {
    let harness = Harness::new(MockPlatform::new(), ScriptedCompletion::new());
    let client = harness.client(
        Arc::new(RecordingPacer::new()),
        StopSignal::default(),
        SubscriptionConfig::default(),
    );
    assert!(client.start().is_none());
}

#[tokio::test]
async fn stop_during_iteration_lets_it_finish_and_starts_no_other() {
    let harness = Harness::new(
        MockPlatform::new()
            .on_following_page(
                None,
                FollowingPage {
                    profiles: vec![profile("1", "bob"), profile("2", "carol")],
                    next: None,
                    previous: None,
                },
            )
            .on_user_posts("1", vec![post("a", "bob", "x")])
            .on_user_posts("2", vec![post("b", "carol", "y")]),
        ScriptedCompletion::new(),
    );
    let stop = StopSignal::default();
    let pacer = Arc::new(RecordingPacer::new().on_pause({
        let stop = stop.clone();
        move |d| {
            if d == CANDIDATE_PACING {
                stop.request();
            }
        }
    }));
    let config = enabled();
    let interval = config.action_interval;
    let client = harness.client(pacer.clone(), stop, config);

    let handle = client.start().expect("loop should start");
    assert!(client.start().is_none());
    handle.await.unwrap();

    assert_eq!(harness.platform.following_cursors().len(), 1);
    assert_eq!(pacer.count(CANDIDATE_PACING), 2);
    assert_eq!(harness.completion.calls(), 2);
    assert_eq!(pacer.count(interval), 1);
}

#[tokio::test]
async fn failed_iteration_waits_and_keeps_mode() {
    let harness = Harness::new(MockPlatform::new(), ScriptedCompletion::new());
    let stop = StopSignal::default();
    let failures = Arc::new(AtomicUsize::new(0));
    let pacer = Arc::new(RecordingPacer::new().on_pause({
        let stop = stop.clone();
        let failures = failures.clone();
        move |d| {
            if d == ERROR_RETRY_DELAY && failures.fetch_add(1, Ordering::SeqCst) == 1 {
                stop.request();
            }
        }
    }));
    let config = SubscriptionConfig {
        search_fallback_enabled: true,
        ..enabled()
    };
    let client = harness.client(pacer.clone(), stop, config);

    client.run_loop().await;

    assert_eq!(pacer.pauses(), vec![ERROR_RETRY_DELAY, ERROR_RETRY_DELAY]);
    assert_eq!(harness.platform.following_cursors(), vec![None, None]);
    assert!(harness.platform.searches().is_empty());
}

#[tokio::test]
async fn iteration_without_follows_switches_to_search() {
    let harness = Harness::new(
        MockPlatform::new()
            .on_following_page(None, FollowingPage::default())
            .on_search("rust", vec![]),
        ScriptedCompletion::new(),
    );
    let stop = StopSignal::default();
    let iterations = Arc::new(AtomicUsize::new(0));
    let config = SubscriptionConfig {
        search_fallback_enabled: true,
        ..enabled()
    };
    let interval = config.action_interval;
    let pacer = Arc::new(RecordingPacer::new().on_pause({
        let stop = stop.clone();
        let iterations = iterations.clone();
        move |d| {
            if d == interval && iterations.fetch_add(1, Ordering::SeqCst) == 1 {
                stop.request();
            }
        }
    }));
    let client = harness.client(pacer.clone(), stop, config);

    client.run_loop().await;

    assert_eq!(harness.platform.following_cursors(), vec![None]);
    assert_eq!(harness.platform.searches().len(), 1);
    assert_eq!(pacer.count(interval), 2);
}
