use crate::config::OpenAiConfig;
use crate::providers::traits::Provider;
use crate::router::types::GenerationOptions;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Health probes must answer fast or the provider is treated as down.
const HEALTH_PROBE_TIMEOUT_SECS: u64 = 5;

/// Primary remote adapter speaking the OpenAI chat-completions protocol.
/// Works against api.openai.com or any compatible endpoint via `BaseUrl`.
pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
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
    temperature: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

impl OpenAiProvider {
    pub fn new(config: &OpenAiConfig, cost_per_token: f64) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            priority: config.priority,
            cost_per_token,
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("Authorization", format!("Bearer {key}")),
            None => req,
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
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
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            anyhow::anyhow!("OpenAI API key not set; add ApiKey to the [OpenAi] section")
        })?;

        let request = ChatRequest {
            model: options.model_or(&self.model).to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: options.temperature,
            max_tokens: options.max_tokens.min(self.max_tokens),
            stop: options.stop_sequences.clone(),
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        tracing::debug!(model = %request.model, "OpenAI request: {url}");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "OpenAI API error ({status}): {}",
                if error.len() > 200 { &error[..200] } else { &error }
            );
        }

        let chat_response: ChatResponse = response.json().await?;
        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("No choices in OpenAI response"))
    }

    async fn check_health(&self) -> anyhow::Result<bool> {
        let url = format!("{}/v1/models", self.base_url);
        let response = self
            .with_auth(self.client.get(&url))
            .timeout(Duration::from_secs(HEALTH_PROBE_TIMEOUT_SECS))
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(url: &str) -> OpenAiProvider {
        let config = OpenAiConfig {
            api_key: Some("sk-test".into()),
            base_url: url.into(),
            model: "gpt-4o-mini".into(),
            max_tokens: 64,
            ..OpenAiConfig::default()
        };
        OpenAiProvider::new(&config, 0.0001)
    }

    #[test]
    fn strips_trailing_slash() {
        let config = OpenAiConfig {
            base_url: "https://api.openai.com/".into(),
            ..OpenAiConfig::default()
        };
        let p = OpenAiProvider::new(&config, 0.0);
        assert_eq!(p.base_url, "https://api.openai.com");
    }

    #[test]
    fn descriptor_accessors() {
        let p = provider_for("https://api.openai.com");
        assert_eq!(p.name(), "openai");
        assert_eq!(p.priority(), 1);
        assert!((p.cost_per_token() - 0.0001).abs() < f64::EPSILON);
    }

    #[test]
    fn request_serializes_stop_only_when_present() {
        let req = ChatRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![Message {
                role: "user".into(),
                content: "hi".into(),
            }],
            temperature: 0.7,
            max_tokens: 100,
            stop: Vec::new(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("\"stop\""));

        let req = ChatRequest {
            stop: vec!["END".into()],
            ..req
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"stop\":[\"END\"]"));
    }

    #[test]
    fn response_with_missing_content_defaults_to_empty() {
        let json = r#"{"choices":[{"message":{"role":"assistant"}}]}"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert!(resp.choices[0].message.content.is_empty());
    }

    #[tokio::test]
    async fn generate_fails_without_key() {
        let config = OpenAiConfig {
            api_key: None,
            ..OpenAiConfig::default()
        };
        let p = OpenAiProvider::new(&config, 0.0);
        let err = p
            .generate("hi", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("API key not set"));
    }

    #[tokio::test]
    async fn generate_returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "hello"}}]
            })))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        let content = p.generate("hi", &GenerationOptions::default()).await.unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn generate_clamps_max_tokens_to_ceiling() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({"max_tokens": 64})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        let options = GenerationOptions {
            max_tokens: 4096,
            ..GenerationOptions::default()
        };
        assert_eq!(p.generate("hi", &options).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn generate_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        let err = p
            .generate("hi", &GenerationOptions::default())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("OpenAI API error"));
        assert!(msg.contains("429"));
    }

    #[tokio::test]
    async fn health_check_true_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        assert!(p.check_health().await.unwrap());
    }

    #[tokio::test]
    async fn health_check_false_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        assert!(!p.check_health().await.unwrap());
    }
}
