//! Provider-agnostic chat-model trait and concrete adapters.
//!
//! Agent primary paths are written against [`ModelClient`] only; swapping the
//! hosted API adapter for the local daemon adapter (or any future provider)
//! never touches agent logic, mirroring how the orchestrator's retry and
//! dispatch layers never reference a specific provider by name.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// A single turn in a chat-style completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Hint that the response should be valid JSON matching the caller's
    /// verdict schema. Adapters that support structured output enforce it
    /// server-side; others rely on the agent re-parsing best-effort.
    pub expects_json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub content: String,
}

/// Minimal, provider-agnostic chat-model contract. Concrete providers
/// (hosted API, local daemon) are adapters over this trait.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatCompletion>;

    /// Name surfaced in logs and verdict provenance, e.g. `"hosted:claude"`.
    fn provider_name(&self) -> &str;
}

/// Shared configuration for the hosted and local adapters.
#[derive(Debug, Clone)]
pub struct ModelClientConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl ModelClientConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Builds configuration from the conventional environment variables
    /// (`MODEL_BASE_URL`, `MODEL_NAME`, `MODEL_API_KEY`), falling back to
    /// `defaults` for anything unset.
    pub fn from_env(defaults: ModelClientConfig) -> Self {
        let base_url = std::env::var("MODEL_BASE_URL").unwrap_or(defaults.base_url);
        let model = std::env::var("MODEL_NAME").unwrap_or(defaults.model);
        let api_key = std::env::var("MODEL_API_KEY").ok().or(defaults.api_key);
        Self {
            base_url,
            model,
            api_key,
            timeout: defaults.timeout,
            max_retries: defaults.max_retries,
        }
    }
}

/// Adapter over a hosted, API-key-authenticated chat completion endpoint.
pub struct HostedModelClient {
    http: reqwest::Client,
    config: ModelClientConfig,
}

impl HostedModelClient {
    pub fn new(config: ModelClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("reqwest client configuration is static and always valid");
        Self { http, config }
    }
}

#[async_trait]
impl ModelClient for HostedModelClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatCompletion> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| AgentError::ModelClient("hosted model client missing api key".to_string()))?;

        #[derive(Serialize)]
        struct HostedRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
        }

        #[derive(Deserialize)]
        struct HostedResponse {
            content: String,
        }

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .bearer_auth(api_key)
            .json(&HostedRequest {
                model: &self.config.model,
                messages: &request.messages,
            })
            .send()
            .await
            .map_err(|e| AgentError::ModelClient(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AgentError::ModelClient(format!(
                "hosted model returned status {}",
                response.status()
            )));
        }

        let parsed: HostedResponse = response
            .json()
            .await
            .map_err(|e| AgentError::ModelClient(format!("invalid response body: {e}")))?;

        Ok(ChatCompletion {
            content: parsed.content,
        })
    }

    fn provider_name(&self) -> &str {
        "hosted"
    }
}

/// Adapter over a locally-running model daemon (no API key, plain HTTP).
pub struct LocalModelClient {
    http: reqwest::Client,
    config: ModelClientConfig,
}

impl LocalModelClient {
    pub fn new(config: ModelClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("reqwest client configuration is static and always valid");
        Self { http, config }
    }
}

#[async_trait]
impl ModelClient for LocalModelClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatCompletion> {
        #[derive(Serialize)]
        struct LocalRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            stream: bool,
        }

        #[derive(Deserialize)]
        struct LocalResponse {
            message: LocalMessage,
        }

        #[derive(Deserialize)]
        struct LocalMessage {
            content: String,
        }

        let response = self
            .http
            .post(format!("{}/api/chat", self.config.base_url))
            .json(&LocalRequest {
                model: &self.config.model,
                messages: &request.messages,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| AgentError::ModelClient(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AgentError::ModelClient(format!(
                "local model daemon returned status {}",
                response.status()
            )));
        }

        let parsed: LocalResponse = response
            .json()
            .await
            .map_err(|e| AgentError::ModelClient(format!("invalid response body: {e}")))?;

        Ok(ChatCompletion {
            content: parsed.message.content,
        })
    }

    fn provider_name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_sets_fields() {
        let config = ModelClientConfig::new("http://localhost:11434", "llama3")
            .with_timeout(Duration::from_secs(10))
            .with_max_retries(5);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 5);
    }

    #[test]
    fn hosted_and_local_clients_report_distinct_provider_names() {
        let hosted = HostedModelClient::new(ModelClientConfig::new("http://example.invalid", "m"));
        let local = LocalModelClient::new(ModelClientConfig::new("http://example.invalid", "m"));
        assert_eq!(hosted.provider_name(), "hosted");
        assert_eq!(local.provider_name(), "local");
    }
}
