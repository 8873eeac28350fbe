use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// TextCompletion Trait
// =============================================================================

/// A single-shot text completion: one rendered prompt in, raw model text out.
///
/// Implementations must not retry internally; callers own the retry policy.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Model identifier, used for logging.
    fn model(&self) -> &str;
}
