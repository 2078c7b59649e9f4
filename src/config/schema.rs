//! Configuration schema.
//!
//! The on-disk document is TOML with the PascalCase section and key names
//! the deployment contract mandates (`Router`, `JsonFileServiceOptions`,
//! one section per adapter). Every field is defaulted so a minimal file
//! still yields a runnable config; `validate()` is the
//! startup gate that turns bad values into a hard ConfigError.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fallback when `MaxFileSizeInBytes` is absent or unparseable: 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "Router", default)]
    pub router: RouterConfig,

    #[serde(rename = "JsonFileServiceOptions", default)]
    pub journal: JournalOptions,

    /// Primary remote backend (OpenAI-compatible chat completions).
    #[serde(rename = "OpenAi", default)]
    pub openai: Option<OpenAiConfig>,

    /// Local fallback backend.
    #[serde(rename = "Ollama", default)]
    pub ollama: Option<OllamaConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Overall daily spend ceiling in USD across the provider chain.
    #[serde(rename = "DailyBudget", default = "default_daily_budget")]
    pub daily_budget: f64,

    /// Advisory; parsed and range-checked but routing visits each provider once.
    #[serde(rename = "MaxRetries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Maintenance cadence in seconds (journal age sweep, status snapshot).
    #[serde(rename = "HealthCheckInterval", default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    #[serde(rename = "EnableCostTracking", default = "default_true")]
    pub enable_cost_tracking: bool,

    #[serde(rename = "EnableRateLimiting", default = "default_true")]
    pub enable_rate_limiting: bool,

    /// Per-provider limits, keyed by lowercased provider name.
    #[serde(rename = "ProviderLimits", default)]
    pub provider_limits: HashMap<String, ProviderLimitConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            daily_budget: default_daily_budget(),
            max_retries: default_max_retries(),
            health_check_interval_secs: default_health_check_interval(),
            enable_cost_tracking: true,
            enable_rate_limiting: true,
            provider_limits: HashMap::new(),
        }
    }
}

impl RouterConfig {
    /// Look up a provider-limit entry by name, case-insensitively.
    pub fn limit_for(&self, provider: &str) -> Option<&ProviderLimitConfig> {
        self.provider_limits.get(&provider.to_lowercase())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderLimitConfig {
    /// Requests allowed per limit window. 0 denies all requests by rate.
    #[serde(rename = "RequestLimit", default)]
    pub request_limit: u64,

    #[serde(rename = "LimitType", default)]
    pub limit_type: LimitType,

    /// USD per 1000 tokens.
    #[serde(rename = "CostPerToken", default)]
    pub cost_per_token: f64,

    /// Per-provider daily spend ceiling in USD (default: 10.00).
    #[serde(rename = "DailyBudgetLimit", default = "default_daily_budget")]
    pub daily_budget_limit: f64,
}

impl Default for ProviderLimitConfig {
    fn default() -> Self {
        Self {
            request_limit: 0,
            limit_type: LimitType::default(),
            cost_per_token: 0.0,
            daily_budget_limit: default_daily_budget(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitType {
    #[serde(alias = "Hour")]
    Hour,
    #[default]
    #[serde(alias = "Day")]
    Day,
    #[serde(alias = "Month")]
    Month,
    #[serde(alias = "Unlimited")]
    Unlimited,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalOptions {
    #[serde(rename = "Enabled", default)]
    pub enabled: bool,

    #[serde(rename = "FilePath", default = "default_journal_path")]
    pub file_path: PathBuf,

    /// Accepts an integer byte count or a product expression such as
    /// `"5 * 1024 * 1024"`. Invalid input falls back to 10 MiB.
    #[serde(
        rename = "MaxFileSizeInBytes",
        default = "default_max_file_size",
        deserialize_with = "deserialize_size_field"
    )]
    pub max_file_size_bytes: u64,

    /// Document age, in days, beyond which rollover triggers.
    #[serde(rename = "MaxFileAge", default = "default_max_file_age_days")]
    pub max_file_age_days: u64,

    #[serde(rename = "RolloverDirectory", default = "default_rollover_dir")]
    pub rollover_directory: PathBuf,
}

impl Default for JournalOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            file_path: default_journal_path(),
            max_file_size_bytes: default_max_file_size(),
            max_file_age_days: default_max_file_age_days(),
            rollover_directory: default_rollover_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(rename = "Enabled", default = "default_true")]
    pub enabled: bool,

    #[serde(rename = "ApiKey", default)]
    pub api_key: Option<String>,

    #[serde(rename = "BaseUrl", default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(rename = "Model", default = "default_openai_model")]
    pub model: String,

    #[serde(rename = "MaxTokens", default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(rename = "Timeout", default = "default_remote_timeout")]
    pub timeout_secs: u64,

    /// Lower runs earlier in the fail-over chain.
    #[serde(rename = "Priority", default = "default_primary_priority")]
    pub priority: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_remote_timeout(),
            priority: default_primary_priority(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(rename = "Enabled", default = "default_true")]
    pub enabled: bool,

    #[serde(rename = "BaseUrl", default = "default_ollama_base_url")]
    pub base_url: String,

    #[serde(rename = "Model", default = "default_ollama_model")]
    pub model: String,

    #[serde(rename = "MaxTokens", default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds. Local models can be slow; default is generous.
    #[serde(rename = "Timeout", default = "default_local_timeout")]
    pub timeout_secs: u64,

    #[serde(rename = "Priority", default = "default_fallback_priority")]
    pub priority: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_local_timeout(),
            priority: default_fallback_priority(),
        }
    }
}

fn default_daily_budget() -> f64 {
    10.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_health_check_interval() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("data/responses.json")
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE_BYTES
}

fn default_max_file_age_days() -> u64 {
    7
}

fn default_rollover_dir() -> PathBuf {
    PathBuf::from("data/archive")
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".into()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".into()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_ollama_model() -> String {
    "llama3.2".into()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_remote_timeout() -> u64 {
    120
}

fn default_local_timeout() -> u64 {
    300
}

fn default_primary_priority() -> u32 {
    1
}

fn default_fallback_priority() -> u32 {
    2
}

/// Parse a byte-size expression: a bare integer or a `*`-separated product
/// (`"5 * 1024 * 1024"`). No general arithmetic.
pub fn parse_size_expression(raw: &str) -> Option<u64> {
    let mut product: u64 = 1;
    let mut seen_factor = false;

    for factor in raw.split('*') {
        let factor = factor.trim();
        if factor.is_empty() {
            return None;
        }
        let value: u64 = factor.parse().ok()?;
        product = product.checked_mul(value)?;
        seen_factor = true;
    }

    seen_factor.then_some(product)
}

fn deserialize_size_field<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeField {
        Bytes(u64),
        Expression(String),
    }

    match SizeField::deserialize(deserializer)? {
        SizeField::Bytes(n) => Ok(n),
        SizeField::Expression(raw) => Ok(parse_size_expression(&raw).unwrap_or_else(|| {
            tracing::warn!(
                expression = %raw,
                fallback = DEFAULT_MAX_FILE_SIZE_BYTES,
                "Unparseable MaxFileSizeInBytes expression, using default"
            );
            DEFAULT_MAX_FILE_SIZE_BYTES
        })),
    }
}

impl Config {
    /// Load and validate a TOML config file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Lowercase provider-limit keys so lookups match adapter names
    /// regardless of how the operator cased the section headers.
    fn normalize(&mut self) {
        let limits = std::mem::take(&mut self.router.provider_limits);
        self.router.provider_limits = limits
            .into_iter()
            .map(|(name, limit)| (name.to_lowercase(), limit))
            .collect();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.router.daily_budget <= 0.0 || !self.router.daily_budget.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "Router.DailyBudget must be a positive number, got {}",
                self.router.daily_budget
            )));
        }

        if !(1..=10).contains(&self.router.max_retries) {
            return Err(ConfigError::Invalid(format!(
                "Router.MaxRetries must be within 1..=10, got {}",
                self.router.max_retries
            )));
        }

        if self.router.health_check_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "Router.HealthCheckInterval must be positive".into(),
            ));
        }

        for (name, limit) in &self.router.provider_limits {
            if limit.cost_per_token < 0.0 || !limit.cost_per_token.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "ProviderLimits.{name}.CostPerToken must be non-negative"
                )));
            }
            if limit.daily_budget_limit < 0.0 || !limit.daily_budget_limit.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "ProviderLimits.{name}.DailyBudgetLimit must be non-negative"
                )));
            }
            if matches!(limit.limit_type, LimitType::Hour | LimitType::Month) {
                tracing::warn!(
                    provider = %name,
                    limit_type = ?limit.limit_type,
                    "LimitType resolves to a calendar-day window in this release"
                );
            }
        }

        if self.journal.enabled {
            if self.journal.file_path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "JsonFileServiceOptions.FilePath must be set when Enabled".into(),
                ));
            }
            if self.journal.max_file_size_bytes == 0 {
                return Err(ConfigError::Invalid(
                    "JsonFileServiceOptions.MaxFileSizeInBytes must be positive".into(),
                ));
            }
            if self.journal.max_file_age_days == 0 {
                return Err(ConfigError::Invalid(
                    "JsonFileServiceOptions.MaxFileAge must be positive".into(),
                ));
            }
            if self.journal.rollover_directory.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "JsonFileServiceOptions.RolloverDirectory must be set when Enabled".into(),
                ));
            }
        }

        let openai_enabled = self.openai.as_ref().is_some_and(|c| c.enabled);
        let ollama_enabled = self.ollama.as_ref().is_some_and(|c| c.enabled);
        if !openai_enabled && !ollama_enabled {
            return Err(ConfigError::Invalid(
                "no provider section is enabled; configure [OpenAi] or [Ollama]".into(),
            ));
        }

        Ok(())
    }
}
