//! Routing and accounting kernel.
//!
//! Holds the priority-ordered provider chain and drives each generation
//! call through viability gating, sequential fail-over, ledger recording
//! and best-effort journaling. The kernel never propagates provider
//! errors to the façade; every call ends in a `RouteOutcome`.

use crate::config::{LimitType, RouterConfig};
use crate::journal::JsonFileStore;
use crate::ledger::UsageLedger;
use crate::providers::{sanitize_api_error, Provider};
use crate::router::types::{
    Attempt, GenerationOptions, ProviderStatus, RequestContext, ResponseEntry, ResponseJournal,
    RouteOutcome, RoutingResult,
};
use std::sync::Arc;
use std::time::Instant;

/// Character-count token approximation: four characters per token,
/// rounded up. Deterministic and provider-independent; not a tokenizer.
pub fn estimate_tokens(text: &str) -> u64 {
    tokens_for_chars(text.chars().count())
}

fn tokens_for_chars(chars: usize) -> u64 {
    (chars as u64).div_ceil(4)
}

/// Estimated USD cost for `text` at a USD-per-1000-tokens rate.
pub fn estimate_cost(text: &str, cost_per_token: f64) -> f64 {
    estimate_tokens(text) as f64 * cost_per_token / 1000.0
}

pub struct RouterKernel {
    providers: Vec<Arc<dyn Provider>>,
    ledger: Arc<UsageLedger>,
    journal: Arc<JsonFileStore>,
    config: RouterConfig,
}

impl RouterKernel {
    pub fn new(
        mut providers: Vec<Arc<dyn Provider>>,
        ledger: Arc<UsageLedger>,
        journal: Arc<JsonFileStore>,
        config: RouterConfig,
    ) -> Self {
        // Stable sort: equal priorities keep insertion order
        providers.sort_by_key(|p| p.priority());
        Self {
            providers,
            ledger,
            journal,
            config,
        }
    }

    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    /// Route one generation call through the provider chain.
    pub async fn route(&self, prompt: &str, options: GenerationOptions) -> RouteOutcome {
        let context = RequestContext::new(prompt, options);
        let mut result = RoutingResult::default();

        for provider in &self.providers {
            if !self.is_viable(provider.as_ref(), &context).await {
                continue;
            }

            let attempt = self.run_attempt(provider.as_ref(), &context).await;
            if attempt.success {
                let content = attempt.content.clone();
                let provider_name = attempt.provider.clone();
                let cost = attempt.cost;
                result.push(attempt);
                self.persist(&result).await;
                return RouteOutcome::Success {
                    content,
                    provider: provider_name,
                    cost,
                    duration_ms: context.elapsed_ms(),
                };
            }
            result.push(attempt);
        }

        self.persist(&result).await;
        RouteOutcome::Failure {
            error: "All AI providers exhausted or unavailable".to_string(),
            failed_providers: result.failed_providers(),
            total_attempted_cost: result.total_cost(),
            duration_ms: context.elapsed_ms(),
        }
    }

    /// Health, rate and cost gates, in that order. Any probe error or
    /// missing limit denies the provider (fail-closed).
    async fn is_viable(&self, provider: &dyn Provider, context: &RequestContext) -> bool {
        let name = provider.name();

        match provider.check_health().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(provider = name, "Skipping provider: health probe negative");
                return false;
            }
            Err(e) => {
                tracing::warn!(provider = name, "Health probe error: {e}");
                return false;
            }
        }

        if self.config.enable_rate_limiting {
            let Some(limit) = self.config.limit_for(name) else {
                tracing::debug!(provider = name, "Skipping provider: no limit configured");
                return false;
            };
            let usage = self.ledger.usage_for_limit_type(name, limit.limit_type);
            if usage.request_count >= limit.request_limit {
                tracing::debug!(
                    provider = name,
                    requests = usage.request_count,
                    limit = limit.request_limit,
                    "Skipping provider: request limit reached"
                );
                return false;
            }
        }

        if self.config.enable_cost_tracking {
            let projected = estimate_cost(&context.prompt, self.cost_per_token(provider));
            let spent = self.ledger.today_usage(name).total_cost;
            if spent + projected > self.config.daily_budget {
                tracing::debug!(
                    provider = name,
                    spent,
                    projected,
                    budget = self.config.daily_budget,
                    "Skipping provider: daily budget exceeded"
                );
                return false;
            }
            if !self.ledger.check_budget(name, projected) {
                tracing::debug!(provider = name, "Skipping provider: provider budget exceeded");
                return false;
            }
        }

        true
    }

    async fn run_attempt(&self, provider: &dyn Provider, context: &RequestContext) -> Attempt {
        let name = provider.name();
        tracing::info!(provider = name, "routing request to {name}");
        let started = Instant::now();

        match provider.generate(&context.prompt, &context.options).await {
            Ok(content) => {
                let duration_ms =
                    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                // Prompt and response lengths are summed before rounding
                let tokens = tokens_for_chars(
                    context.prompt.chars().count() + content.chars().count(),
                );
                let cost = tokens as f64 * self.cost_per_token(provider) / 1000.0;
                self.ledger.record(name, tokens, cost);

                let entry = ResponseEntry::new(
                    context,
                    name,
                    true,
                    content.clone(),
                    String::new(),
                    cost,
                    duration_ms,
                );
                Attempt {
                    success: true,
                    provider: name.to_string(),
                    content,
                    error: String::new(),
                    cost,
                    entry,
                }
            }
            Err(e) => {
                let duration_ms =
                    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                let message = sanitize_api_error(&e.to_string());
                tracing::error!(provider = name, "provider {name} failed: {message}");

                let entry = ResponseEntry::new(
                    context,
                    name,
                    false,
                    String::new(),
                    message.clone(),
                    0.0,
                    duration_ms,
                );
                Attempt {
                    success: false,
                    provider: name.to_string(),
                    content: String::new(),
                    error: message,
                    cost: 0.0,
                    entry,
                }
            }
        }
    }

    /// Append this call's attempts to the internal journal. Journal
    /// failures are logged and swallowed; routing already resolved.
    async fn persist(&self, result: &RoutingResult) {
        if !self.journal.enabled() || result.attempts.is_empty() {
            return;
        }

        let mut document = match self.journal.load::<ResponseJournal>().await {
            Ok(Some(document)) => document,
            Ok(None) => ResponseJournal::default(),
            Err(e) => {
                tracing::warn!("Journal unreadable, starting a fresh document: {e}");
                ResponseJournal::default()
            }
        };

        for attempt in &result.attempts {
            document.append(attempt.entry.clone());
        }

        if let Err(e) = self.journal.write(&document).await {
            tracing::warn!("Failed to persist routing result: {e}");
        }
    }

    /// Synchronous status sweep across the chain, in priority order.
    /// A probe failure yields an unhealthy zero-counter row; the sweep
    /// itself never aborts.
    pub async fn provider_status(&self) -> Vec<ProviderStatus> {
        let mut statuses = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let name = provider.name();
            match provider.check_health().await {
                Ok(is_healthy) => {
                    let limit = self.config.limit_for(name);
                    let limit_type = limit.map_or(LimitType::Day, |l| l.limit_type);
                    let request_limit = limit.map_or(0, |l| l.request_limit);
                    let usage = self.ledger.usage_for_limit_type(name, limit_type);
                    statuses.push(ProviderStatus {
                        name: name.to_string(),
                        is_healthy,
                        requests_today: usage.request_count,
                        cost_today: usage.total_cost,
                        remaining_requests: request_limit.saturating_sub(usage.request_count),
                    });
                }
                Err(e) => {
                    tracing::warn!(provider = name, "Status probe failed: {e}");
                    statuses.push(ProviderStatus {
                        name: name.to_string(),
                        is_healthy: false,
                        requests_today: 0,
                        cost_today: 0.0,
                        remaining_requests: 0,
                    });
                }
            }
        }

        statuses
    }

    /// Aggregate spend across all providers for the current UTC day.
    pub fn today_spend(&self) -> f64 {
        self.providers
            .iter()
            .map(|p| self.ledger.today_usage(p.name()).total_cost)
            .sum()
    }

    fn cost_per_token(&self, provider: &dyn Provider) -> f64 {
        // The limit entry is authoritative; the adapter carries a
        // diagnostic copy resolved from the same place at startup.
        self.config
            .limit_for(provider.name())
            .map_or_else(|| provider.cost_per_token(), |l| l.cost_per_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JournalOptions, ProviderLimitConfig};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    enum MockBehavior {
        Reply(&'static str),
        Fail(&'static str),
    }

    struct MockProvider {
        name: &'static str,
        priority: u32,
        healthy: bool,
        health_error: bool,
        behavior: MockBehavior,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn replying(name: &'static str, priority: u32, response: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                priority,
                healthy: true,
                health_error: false,
                behavior: MockBehavior::Reply(response),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str, priority: u32, error: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                priority,
                healthy: true,
                health_error: false,
                behavior: MockBehavior::Fail(error),
                calls: AtomicUsize::new(0),
            })
        }

        fn unhealthy(name: &'static str, priority: u32) -> Arc<Self> {
            Arc::new(Self {
                name,
                priority,
                healthy: false,
                health_error: false,
                behavior: MockBehavior::Reply("never"),
                calls: AtomicUsize::new(0),
            })
        }

        fn probe_error(name: &'static str, priority: u32) -> Arc<Self> {
            Arc::new(Self {
                name,
                priority,
                healthy: true,
                health_error: true,
                behavior: MockBehavior::Reply("never"),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn cost_per_token(&self) -> f64 {
            0.0
        }

        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                MockBehavior::Reply(response) => Ok((*response).to_string()),
                MockBehavior::Fail(error) => anyhow::bail!(*error),
            }
        }

        async fn check_health(&self) -> anyhow::Result<bool> {
            if self.health_error {
                anyhow::bail!("probe exploded");
            }
            Ok(self.healthy)
        }
    }

    fn limits_for(names: &[&str], request_limit: u64, cost_per_token: f64) -> RouterConfig {
        let mut provider_limits = HashMap::new();
        for name in names {
            provider_limits.insert(
                (*name).to_string(),
                ProviderLimitConfig {
                    request_limit,
                    limit_type: LimitType::Day,
                    cost_per_token,
                    daily_budget_limit: 10.0,
                },
            );
        }
        RouterConfig {
            provider_limits,
            ..RouterConfig::default()
        }
    }

    fn disabled_journal() -> Arc<JsonFileStore> {
        Arc::new(JsonFileStore::new(JournalOptions::default()))
    }

    fn kernel(
        providers: Vec<Arc<dyn Provider>>,
        config: RouterConfig,
    ) -> (RouterKernel, Arc<UsageLedger>) {
        let ledger = Arc::new(UsageLedger::new(config.provider_limits.clone()));
        let kernel = RouterKernel::new(providers, Arc::clone(&ledger), disabled_journal(), config);
        (kernel, ledger)
    }

    #[test]
    fn token_estimator_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("hi"), 1);
    }

    #[test]
    fn cost_estimator_scales_per_thousand_tokens() {
        // 8 chars = 2 tokens at 0.5 USD per 1000 tokens
        let cost = estimate_cost("abcdefgh", 0.5);
        assert!((cost - 0.001).abs() < 1e-12);
        assert!(estimate_cost("anything", 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn primary_healthy_is_the_only_one_invoked() {
        let p1 = MockProvider::replying("p1", 1, "hello");
        let p2 = MockProvider::replying("p2", 2, "backup");
        let (kernel, ledger) = kernel(
            vec![p1.clone(), p2.clone()],
            limits_for(&["p1", "p2"], 100, 0.0001),
        );

        let outcome = kernel.route("hi", GenerationOptions::default()).await;
        match outcome {
            RouteOutcome::Success {
                content,
                provider,
                cost,
                ..
            } => {
                assert_eq!(content, "hello");
                assert_eq!(provider, "p1");
                // (2 + 5) chars → 2 tokens → 2 × 0.0001 / 1000
                assert!((cost - 0.0000002).abs() < 1e-15);
            }
            RouteOutcome::Failure { error, .. } => panic!("unexpected failure: {error}"),
        }

        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 0);

        let usage = ledger.today_usage("p1");
        assert_eq!(usage.request_count, 1);
        assert_eq!(usage.tokens_used, 2);
        assert_eq!(ledger.today_usage("p2").request_count, 0);
    }

    #[tokio::test]
    async fn providers_sorted_by_priority_with_stable_ties() {
        let b = MockProvider::replying("b", 1, "from b");
        let a = MockProvider::replying("a", 1, "from a");
        let c = MockProvider::replying("c", 0, "from c");
        let (kernel, _) = kernel(
            vec![b.clone(), a.clone(), c.clone()],
            limits_for(&["a", "b", "c"], 100, 0.0),
        );

        let names: Vec<&str> = kernel.providers().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn fails_over_to_next_provider_on_error() {
        let p1 = MockProvider::failing("p1", 1, "connection reset");
        let p2 = MockProvider::replying("p2", 2, "ok");
        let (kernel, ledger) = kernel(
            vec![p1.clone(), p2.clone()],
            limits_for(&["p1", "p2"], 100, 0.0001),
        );

        let outcome = kernel.route("hi", GenerationOptions::default()).await;
        match outcome {
            RouteOutcome::Success { provider, content, .. } => {
                assert_eq!(provider, "p2");
                assert_eq!(content, "ok");
            }
            RouteOutcome::Failure { error, .. } => panic!("unexpected failure: {error}"),
        }

        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 1);
        // The failed attempt recorded nothing in the ledger
        assert_eq!(ledger.today_usage("p1").request_count, 0);
        assert_eq!(ledger.today_usage("p2").request_count, 1);
    }

    #[tokio::test]
    async fn journal_records_both_attempts_in_order() {
        let dir = TempDir::new().unwrap();
        let journal = Arc::new(JsonFileStore::new(JournalOptions {
            enabled: true,
            file_path: dir.path().join("attempts.json"),
            rollover_directory: dir.path().join("archive"),
            ..JournalOptions::default()
        }));
        journal.ensure_file().await.unwrap();

        let config = limits_for(&["p1", "p2"], 100, 0.0001);
        let ledger = Arc::new(UsageLedger::new(config.provider_limits.clone()));
        let p1 = MockProvider::failing("p1", 1, "boom");
        let p2 = MockProvider::replying("p2", 2, "ok");
        let kernel = RouterKernel::new(
            vec![p1, p2],
            ledger,
            Arc::clone(&journal),
            config,
        );

        kernel.route("hi", GenerationOptions::default()).await;

        let document: ResponseJournal = journal.load().await.unwrap().expect("journal written");
        assert_eq!(document.total_requests, 2);
        assert!(!document.responses[0].success);
        assert_eq!(document.responses[0].provider, "p1");
        assert_eq!(document.responses[0].error, "boom");
        assert!(document.responses[1].success);
        assert_eq!(document.responses[1].provider, "p2");
        assert_eq!(document.responses[1].content, "ok");
    }

    #[tokio::test]
    async fn all_unhealthy_yields_empty_failure() {
        let p1 = MockProvider::unhealthy("p1", 1);
        let p2 = MockProvider::unhealthy("p2", 2);
        let (kernel, ledger) = kernel(
            vec![p1.clone(), p2.clone()],
            limits_for(&["p1", "p2"], 100, 0.0001),
        );

        let outcome = kernel.route("hi", GenerationOptions::default()).await;
        match outcome {
            RouteOutcome::Failure {
                error,
                failed_providers,
                total_attempted_cost,
                ..
            } => {
                assert_eq!(error, "All AI providers exhausted or unavailable");
                assert!(failed_providers.is_empty());
                assert!(total_attempted_cost.abs() < f64::EPSILON);
            }
            RouteOutcome::Success { .. } => panic!("should not succeed"),
        }

        // Skipped providers were never dispatched and never recorded
        assert_eq!(p1.calls(), 0);
        assert_eq!(p2.calls(), 0);
        assert_eq!(ledger.today_usage("p1").request_count, 0);
    }

    #[tokio::test]
    async fn health_probe_error_skips_provider() {
        let p1 = MockProvider::probe_error("p1", 1);
        let p2 = MockProvider::replying("p2", 2, "ok");
        let (kernel, _) = kernel(
            vec![p1.clone(), p2],
            limits_for(&["p1", "p2"], 100, 0.0),
        );

        let outcome = kernel.route("hi", GenerationOptions::default()).await;
        assert!(outcome.is_success());
        assert_eq!(p1.calls(), 0);
    }

    #[tokio::test]
    async fn request_limit_trips_the_rate_gate() {
        let p1 = MockProvider::replying("p1", 1, "from p1");
        let p2 = MockProvider::replying("p2", 2, "from p2");

        let mut config = limits_for(&["p2"], 100, 0.0001);
        config.provider_limits.insert(
            "p1".into(),
            ProviderLimitConfig {
                request_limit: 1,
                limit_type: LimitType::Day,
                cost_per_token: 0.0001,
                daily_budget_limit: 10.0,
            },
        );
        let (kernel, ledger) = kernel(vec![p1.clone(), p2.clone()], config);

        // One request already on the books for p1
        ledger.record("p1", 1, 0.0);

        let outcome = kernel.route("hi", GenerationOptions::default()).await;
        match outcome {
            RouteOutcome::Success { provider, .. } => assert_eq!(provider, "p2"),
            RouteOutcome::Failure { error, .. } => panic!("unexpected failure: {error}"),
        }
        assert_eq!(p1.calls(), 0);
        assert_eq!(p2.calls(), 1);
    }

    #[tokio::test]
    async fn zero_request_limit_always_denies() {
        let p1 = MockProvider::replying("p1", 1, "never");
        let p2 = MockProvider::replying("p2", 2, "ok");

        let mut config = limits_for(&["p2"], 100, 0.0);
        config
            .provider_limits
            .insert("p1".into(), ProviderLimitConfig::default());
        let (kernel, _) = kernel(vec![p1.clone(), p2], config);

        let outcome = kernel.route("hi", GenerationOptions::default()).await;
        assert!(outcome.is_success());
        assert_eq!(p1.calls(), 0);
    }

    #[tokio::test]
    async fn unconfigured_provider_is_denied_by_rate() {
        let p1 = MockProvider::replying("p1", 1, "never");
        let p2 = MockProvider::replying("p2", 2, "ok");
        // Only p2 has a limit entry
        let (kernel, _) = kernel(vec![p1.clone(), p2], limits_for(&["p2"], 100, 0.0));

        let outcome = kernel.route("hi", GenerationOptions::default()).await;
        assert!(outcome.is_success());
        assert_eq!(p1.calls(), 0);
    }

    #[tokio::test]
    async fn expensive_provider_is_skipped_for_cheaper_one() {
        let p1 = MockProvider::replying("p1", 1, "pricey");
        let p2 = MockProvider::replying("p2", 2, "cheap");

        let mut config = limits_for(&["p2"], 100, 0.0001);
        config.provider_limits.insert(
            "p1".into(),
            ProviderLimitConfig {
                request_limit: 100,
                limit_type: LimitType::Day,
                // 1 token estimate × 10.0 / 1000 = 0.01 > budget
                cost_per_token: 10.0,
                daily_budget_limit: 10.0,
            },
        );
        config.daily_budget = 0.001;
        let (kernel, _) = kernel(vec![p1.clone(), p2.clone()], config);

        let outcome = kernel.route("hi", GenerationOptions::default()).await;
        match outcome {
            RouteOutcome::Success { provider, .. } => assert_eq!(provider, "p2"),
            RouteOutcome::Failure { error, .. } => panic!("unexpected failure: {error}"),
        }
        assert_eq!(p1.calls(), 0);
        assert_eq!(p2.calls(), 1);
    }

    #[tokio::test]
    async fn budget_boundary_exactly_equal_is_allowed() {
        let p1 = MockProvider::replying("p1", 1, "ok");
        let mut config = limits_for(&["p1"], 100, 1.0);
        // "abcd" → 1 token → estimate 0.001; budget exactly 0.001
        config.daily_budget = 0.001;
        let (kernel, _) = kernel(vec![p1.clone()], config);

        let outcome = kernel.route("abcd", GenerationOptions::default()).await;
        assert!(outcome.is_success());
        assert_eq!(p1.calls(), 1);
    }

    #[tokio::test]
    async fn per_provider_budget_gate_fails_closed() {
        let p1 = MockProvider::replying("p1", 1, "never");
        let p2 = MockProvider::replying("p2", 2, "ok");

        let mut config = limits_for(&["p2"], 100, 0.0001);
        config.provider_limits.insert(
            "p1".into(),
            ProviderLimitConfig {
                request_limit: 100,
                limit_type: LimitType::Day,
                cost_per_token: 0.0001,
                daily_budget_limit: 0.0,
            },
        );
        let (kernel, ledger) = kernel(vec![p1.clone(), p2], config);

        // Any recorded spend puts p1 over its zero per-provider budget
        ledger.record("p1", 10, 0.5);

        let outcome = kernel.route("hi", GenerationOptions::default()).await;
        assert!(outcome.is_success());
        assert_eq!(p1.calls(), 0);
    }

    #[tokio::test]
    async fn unlimited_limit_type_never_trips_rate() {
        let p1 = MockProvider::replying("p1", 1, "ok");
        let mut config = limits_for(&[], 0, 0.0);
        config.provider_limits.insert(
            "p1".into(),
            ProviderLimitConfig {
                request_limit: 1,
                limit_type: LimitType::Unlimited,
                cost_per_token: 0.0,
                daily_budget_limit: 10.0,
            },
        );
        let (kernel, ledger) = kernel(vec![p1.clone()], config);

        // Far beyond the request limit, but the window is unlimited
        for _ in 0..5 {
            ledger.record("p1", 1, 0.0);
        }

        let outcome = kernel.route("hi", GenerationOptions::default()).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn provider_status_reports_usage_and_remaining() {
        let p1 = MockProvider::replying("p1", 1, "ok");
        let p2 = MockProvider::unhealthy("p2", 2);
        let p3 = MockProvider::probe_error("p3", 3);
        let (kernel, ledger) = kernel(
            vec![p1, p2, p3],
            limits_for(&["p1", "p2", "p3"], 10, 0.0001),
        );

        ledger.record("p1", 5, 0.002);
        ledger.record("p1", 5, 0.003);
        ledger.record("p3", 1, 1.0);

        let statuses = kernel.provider_status().await;
        assert_eq!(statuses.len(), 3);

        assert_eq!(statuses[0].name, "p1");
        assert!(statuses[0].is_healthy);
        assert_eq!(statuses[0].requests_today, 2);
        assert!((statuses[0].cost_today - 0.005).abs() < 1e-12);
        assert_eq!(statuses[0].remaining_requests, 8);

        // Unhealthy but probed fine: real counters
        assert_eq!(statuses[1].name, "p2");
        assert!(!statuses[1].is_healthy);
        assert_eq!(statuses[1].remaining_requests, 10);

        // Probe error: zeroed counters, never aborts the sweep
        assert_eq!(statuses[2].name, "p3");
        assert!(!statuses[2].is_healthy);
        assert_eq!(statuses[2].requests_today, 0);
        assert!(statuses[2].cost_today.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn today_spend_sums_across_providers() {
        let p1 = MockProvider::replying("p1", 1, "ok");
        let p2 = MockProvider::replying("p2", 2, "ok");
        let (kernel, ledger) = kernel(
            vec![p1, p2],
            limits_for(&["p1", "p2"], 10, 0.0),
        );

        ledger.record("p1", 1, 0.25);
        ledger.record("p2", 1, 0.5);
        assert!((kernel.today_spend() - 0.75).abs() < 1e-12);
    }

    #[tokio::test]
    async fn gates_disabled_route_on_health_alone() {
        let p1 = MockProvider::replying("p1", 1, "ok");
        // No limit entries at all, both gates off
        let config = RouterConfig {
            enable_rate_limiting: false,
            enable_cost_tracking: false,
            ..RouterConfig::default()
        };
        let (kernel, _) = kernel(vec![p1.clone()], config);

        let outcome = kernel.route("hi", GenerationOptions::default()).await;
        assert!(outcome.is_success());
        assert_eq!(p1.calls(), 1);
    }
}
