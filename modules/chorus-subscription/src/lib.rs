pub mod candidates;
pub mod decision;
pub mod dedup;
pub mod executor;
pub mod ledger;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod x_platform;

pub use candidates::{Candidate, CandidateSource, DiscoveryMode, ProfileRef};
pub use decision::{Decision, DecisionEngine, DecisionError, RetryPolicy};
pub use dedup::{ActivityItem, ActivityWindow, DedupGate};
pub use executor::{ActionExecutor, ActionKind, ActionOutcome};
pub use ledger::PgLedger;
pub use scheduler::{StopSignal, SubscriptionClient, SubscriptionConfig, SubscriptionDeps};
pub use traits::{FollowingPage, Pacer, ProcessedLedger, SocialPlatform, TokioPacer};
pub use x_platform::XPlatform;
