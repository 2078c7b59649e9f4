use crate::config::OllamaConfig;
use crate::providers::traits::Provider;
use crate::router::types::GenerationOptions;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const HEALTH_PROBE_TIMEOUT_SECS: u64 = 5;

/// Local fallback adapter speaking the Ollama chat protocol.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    max_tokens: u32,
    priority: u32,
    cost_per_token: f64,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    options: Options,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f64,
    num_predict: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaProvider {
    pub fn new(config: &OllamaConfig, cost_per_token: f64) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            priority: config.priority,
            cost_per_token,
            client: Client::builder()
                // Local models may be slow to first token
                .timeout(Duration::from_secs(config.timeout_secs))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn cost_per_token(&self) -> f64 {
        self.cost_per_token
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: options.model_or(&self.model).to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
            options: Options {
                temperature: options.temperature,
                num_predict: options.max_tokens.min(self.max_tokens),
                stop: options.stop_sequences.clone(),
            },
        };

        let url = format!("{}/api/chat", self.base_url);
        tracing::debug!(model = %request.model, "Ollama request: {url}");

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        // Read raw body first so protocol errors can be reported verbatim
        let body = response.bytes().await?;

        if !status.is_success() {
            let raw = String::from_utf8_lossy(&body);
            anyhow::bail!(
                "Ollama API error ({status}): {}. Is Ollama running?",
                if raw.len() > 200 { &raw[..200] } else { &raw }
            );
        }

        let chat_response: ApiChatResponse = serde_json::from_slice(&body)
            .map_err(|e| anyhow::anyhow!("Failed to parse Ollama response: {e}"))?;

        let content = chat_response.message.content;
        if content.is_empty() {
            tracing::warn!("Ollama returned empty content");
        }

        Ok(content)
    }

    async fn check_health(&self) -> anyhow::Result<bool> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(HEALTH_PROBE_TIMEOUT_SECS))
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}
