//! In-memory usage accounting, keyed by (provider, UTC calendar day).
//!
//! Records are append-only and live for the process lifetime; nothing is
//! persisted or garbage-collected. All date arithmetic is UTC.

use crate::config::{LimitType, ProviderLimitConfig};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub tokens: u64,
    pub cost: f64,
}

/// Aggregated view of one provider-day, as served by `/api/ai/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsage {
    pub provider: String,
    pub date: String,
    pub request_count: u64,
    pub tokens_used: u64,
    pub total_cost: f64,
}

impl DailyUsage {
    fn zero(provider: &str, date: NaiveDate) -> Self {
        Self {
            provider: provider.to_string(),
            date: date.format("%Y-%m-%d").to_string(),
            request_count: 0,
            tokens_used: 0,
            total_cost: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    /// Seven daily views per provider, oldest first, missing days zeroed.
    pub providers: HashMap<String, Vec<DailyUsage>>,
    pub total_requests: u64,
    pub total_cost: f64,
}

type UsageKey = (String, NaiveDate);

/// Process-wide usage ledger. One short critical section per operation;
/// no lock is held across I/O.
pub struct UsageLedger {
    limits: HashMap<String, ProviderLimitConfig>,
    records: Mutex<HashMap<UsageKey, Vec<UsageRecord>>>,
}

impl UsageLedger {
    /// `limits` must already be keyed by lowercased provider name
    /// (`Config::load` normalizes this).
    pub fn new(limits: HashMap<String, ProviderLimitConfig>) -> Self {
        Self {
            limits,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit_for(&self, provider: &str) -> Option<&ProviderLimitConfig> {
        self.limits.get(&provider.to_lowercase())
    }

    /// Append a usage record under the current UTC day. Never fails.
    pub fn record(&self, provider: &str, tokens: u64, cost: f64) {
        let now = Utc::now();
        let key = (provider.to_string(), now.date_naive());
        let mut records = self.records.lock();
        records.entry(key).or_default().push(UsageRecord {
            timestamp: now,
            tokens,
            cost,
        });
    }

    /// Usage for the current UTC date; zero-valued when nothing recorded.
    pub fn today_usage(&self, provider: &str) -> DailyUsage {
        self.usage_for_date(provider, Utc::now().date_naive())
    }

    fn usage_for_date(&self, provider: &str, date: NaiveDate) -> DailyUsage {
        let records = self.records.lock();
        match records.get(&(provider.to_string(), date)) {
            Some(day) => DailyUsage {
                provider: provider.to_string(),
                date: date.format("%Y-%m-%d").to_string(),
                request_count: day.len() as u64,
                tokens_used: day.iter().map(|r| r.tokens).sum(),
                total_cost: day.iter().map(|r| r.cost).sum(),
            },
            None => DailyUsage::zero(provider, date),
        }
    }

    /// The view the rate gate consults. Hour and month windows resolve to
    /// the calendar-day view; unlimited yields a synthetic zero view that
    /// is always below any limit.
    pub fn usage_for_limit_type(&self, provider: &str, limit_type: LimitType) -> DailyUsage {
        match limit_type {
            LimitType::Unlimited => DailyUsage::zero(provider, Utc::now().date_naive()),
            LimitType::Hour | LimitType::Day | LimitType::Month => self.today_usage(provider),
        }
    }

    /// Seven daily views per provider for [today−6, today], plus grand
    /// totals across every provider and day.
    pub fn weekly_report(&self) -> WeeklyReport {
        let today = Utc::now().date_naive();
        let week: Vec<NaiveDate> = (0i64..7)
            .rev()
            .map(|back| today - Duration::days(back))
            .collect();

        let mut provider_names: Vec<String> = {
            let records = self.records.lock();
            records.keys().map(|(name, _)| name.clone()).collect()
        };
        provider_names.sort();
        provider_names.dedup();

        let mut providers = HashMap::new();
        let mut total_requests = 0u64;
        let mut total_cost = 0.0f64;

        for name in provider_names {
            let days: Vec<DailyUsage> = week
                .iter()
                .map(|date| self.usage_for_date(&name, *date))
                .collect();
            for day in &days {
                total_requests += day.request_count;
                total_cost += day.total_cost;
            }
            providers.insert(name, days);
        }

        WeeklyReport {
            providers,
            total_requests,
            total_cost,
        }
    }

    /// Would spending `additional_cost` keep the provider within its
    /// configured daily budget? Providers with no limit entry are denied.
    pub fn check_budget(&self, provider: &str, additional_cost: f64) -> bool {
        let Some(limit) = self.limit_for(provider) else {
            tracing::debug!(provider, "No provider limit configured; budget check denies");
            return false;
        };

        let today = self.today_usage(provider);
        today.total_cost + additional_cost <= limit.daily_budget_limit
    }
}
