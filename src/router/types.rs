use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// A generation call as received by the façade. Everything but the prompt
/// is defaulted so `{"prompt": "..."}` is a complete request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Model hint; `"default"` lets each adapter pick its configured model.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

impl GenerationRequest {
    /// The request minus the prompt, as handed to adapters.
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature.clamp(0.0, 2.0),
            model: self.model.clone(),
            stop_sequences: self.stop_sequences.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f64,
    pub model: String,
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            model: default_model(),
            stop_sequences: Vec::new(),
        }
    }
}

impl GenerationOptions {
    /// Resolve the model hint against an adapter's configured model.
    pub fn model_or<'a>(&'a self, configured: &'a str) -> &'a str {
        if self.model == default_model() || self.model.is_empty() {
            configured
        } else {
            &self.model
        }
    }
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f64 {
    0.7
}

fn default_model() -> String {
    "default".into()
}

/// Immutable per-call context created at router entry.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub prompt: String,
    pub options: GenerationOptions,
    pub started_at: DateTime<Utc>,
    pub started: Instant,
}

impl RequestContext {
    pub fn new(prompt: &str, options: GenerationOptions) -> Self {
        Self {
            prompt: prompt.to_string(),
            options,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Outcome of invoking a single provider.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub success: bool,
    pub provider: String,
    pub content: String,
    pub error: String,
    pub cost: f64,
    pub entry: ResponseEntry,
}

/// Accumulator for one routing call. The last attempt is the terminal one;
/// a successful attempt is always last.
#[derive(Debug, Clone, Default)]
pub struct RoutingResult {
    pub attempts: Vec<Attempt>,
}

impl RoutingResult {
    pub fn push(&mut self, attempt: Attempt) {
        self.attempts.push(attempt);
    }

    pub fn total_cost(&self) -> f64 {
        self.attempts.iter().map(|a| a.cost).sum()
    }

    pub fn failed_providers(&self) -> Vec<String> {
        self.attempts
            .iter()
            .filter(|a| !a.success)
            .map(|a| a.provider.clone())
            .collect()
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.len()
    }
}

/// Terminal response of a routing call.
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    Success {
        content: String,
        provider: String,
        cost: f64,
        duration_ms: u64,
    },
    Failure {
        error: String,
        failed_providers: Vec<String>,
        total_attempted_cost: f64,
        duration_ms: u64,
    },
}

impl RouteOutcome {
    pub fn duration_ms(&self) -> u64 {
        match self {
            Self::Success { duration_ms, .. } | Self::Failure { duration_ms, .. } => *duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Diagnostic snapshot of one provider, as served by `/api/ai/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub name: String,
    pub is_healthy: bool,
    pub requests_today: u64,
    pub cost_today: f64,
    pub remaining_requests: u64,
}

/// One journaled attempt or user-visible response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub model: String,
    pub success: bool,
    pub provider: String,
    pub content: String,
    pub error: String,
    pub cost: f64,
    pub duration_ms: u64,
}

impl ResponseEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: &RequestContext,
        provider: &str,
        success: bool,
        content: String,
        error: String,
        cost: f64,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            prompt: context.prompt.clone(),
            max_tokens: context.options.max_tokens,
            temperature: context.options.temperature,
            model: context.options.model.clone(),
            success,
            provider: provider.to_string(),
            content,
            error,
            cost,
            duration_ms,
        }
    }
}

/// The on-disk journal document. `total_requests` and `total_cost` stay
/// consistent with `responses` because `append` is the only mutation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseJournal {
    pub responses: Vec<ResponseEntry>,
    pub last_updated: DateTime<Utc>,
    pub total_requests: u64,
    pub total_cost: f64,
}

impl Default for ResponseJournal {
    fn default() -> Self {
        Self {
            responses: Vec::new(),
            last_updated: Utc::now(),
            total_requests: 0,
            total_cost: 0.0,
        }
    }
}

impl ResponseJournal {
    pub fn append(&mut self, entry: ResponseEntry) {
        self.total_cost += entry.cost;
        self.responses.push(entry);
        self.total_requests = self.responses.len() as u64;
        self.last_updated = Utc::now();
    }
}
