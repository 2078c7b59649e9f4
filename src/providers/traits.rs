use crate::router::types::GenerationOptions;
use async_trait::async_trait;

/// A text-generation backend. Adapters speak their backend's protocol and
/// nothing else: no ledger access, no budget checks, no journaling.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier used for ledger keys and limit lookups.
    fn name(&self) -> &str;

    /// Lower runs earlier in the fail-over chain.
    fn priority(&self) -> u32;

    /// Diagnostic copy of the configured USD-per-1000-tokens rate.
    fn cost_per_token(&self) -> f64;

    /// Generate a completion for the prompt.
    async fn generate(&self, prompt: &str, options: &GenerationOptions)
        -> anyhow::Result<String>;

    /// Cheap liveness probe. Must not mutate any accounting state.
    async fn check_health(&self) -> anyhow::Result<bool>;
}
