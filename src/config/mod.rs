pub mod schema;

#[allow(unused_imports)]
pub use schema::{
    Config, ConfigError, JournalOptions, LimitType, OllamaConfig, OpenAiConfig,
    ProviderLimitConfig, RouterConfig, DEFAULT_MAX_FILE_SIZE_BYTES,
};
