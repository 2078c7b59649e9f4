pub mod ollama;
pub mod openai;
pub mod traits;

pub use traits::Provider;

use crate::config::Config;
use std::sync::Arc;

/// Assemble the enabled adapters from their config sections. Cost-per-token
/// comes from the matching `Router.ProviderLimits` entry; adapters without
/// one report 0.0 (the ledger is still the authority for budget gating).
pub fn build_providers(config: &Config) -> anyhow::Result<Vec<Arc<dyn Provider>>> {
    let mut providers: Vec<Arc<dyn Provider>> = Vec::new();

    if let Some(openai) = config.openai.as_ref().filter(|c| c.enabled) {
        let cpt = config
            .router
            .limit_for("openai")
            .map_or(0.0, |l| l.cost_per_token);
        providers.push(Arc::new(openai::OpenAiProvider::new(openai, cpt)));
    }

    if let Some(ollama) = config.ollama.as_ref().filter(|c| c.enabled) {
        let cpt = config
            .router
            .limit_for("ollama")
            .map_or(0.0, |l| l.cost_per_token);
        providers.push(Arc::new(ollama::OllamaProvider::new(ollama, cpt)));
    }

    if providers.is_empty() {
        anyhow::bail!("No providers enabled; configure [OpenAi] or [Ollama]");
    }

    Ok(providers)
}

/// Scrub anything that looks like a credential from an error string before
/// it reaches logs or the journal.
pub fn sanitize_api_error(message: &str) -> String {
    message
        .split_whitespace()
        .map(|word| {
            let bare = word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-' && c != '_');
            if bare.len() >= 8 && (bare.starts_with("sk-") || bare.starts_with("Bearer")) {
                "[redacted]"
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
