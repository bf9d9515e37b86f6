//! Configuration for the mutation engine.
//!
//! Loading is layered the way [`loader`] has always worked: a base YAML
//! file, environment-variable overrides (`${VAR}` / `${VAR:default}`), and
//! explicit programmatic overrides via the builder, merged deepest-wins.

pub mod loader;

pub use loader::{deep_merge, load_yaml_config, load_yaml_file};

use serde::{Deserialize, Serialize};

/// Typed configuration for the engine (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub primary_model: String,
    pub fallback_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_concurrent_agents: usize,
    pub agent_timeout_seconds: u64,
    pub retry_attempts: u32,
    pub auto_approve_threshold: f64,
    pub semantic_similarity_threshold: f64,
    pub embedding_cache_ttl_seconds: u64,
    pub max_graph_traversal_depth: usize,
    pub approval_timeout_seconds: u64,
    pub live_channel_send_timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            primary_model: "hosted-default".to_string(),
            fallback_model: "local-default".to_string(),
            temperature: 0.2,
            max_tokens: 2048,
            max_concurrent_agents: 10,
            agent_timeout_seconds: 300,
            retry_attempts: 3,
            auto_approve_threshold: 0.85,
            semantic_similarity_threshold: 0.75,
            embedding_cache_ttl_seconds: 3600,
            max_graph_traversal_depth: 10,
            approval_timeout_seconds: 300,
            live_channel_send_timeout_seconds: 30,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(
        path: P,
    ) -> crate::Result<Self> {
        load_yaml_config(path).map_err(|e| crate::OrchestratorError::General(e.to_string()))
    }

    pub fn with_primary_model(mut self, model: impl Into<String>) -> Self {
        self.primary_model = model.into();
        self
    }

    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = model.into();
        self
    }

    pub fn with_max_concurrent_agents(mut self, n: usize) -> Self {
        self.max_concurrent_agents = n;
        self
    }

    pub fn with_agent_timeout_seconds(mut self, secs: u64) -> Self {
        self.agent_timeout_seconds = secs;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_auto_approve_threshold(mut self, threshold: f64) -> Self {
        self.auto_approve_threshold = threshold;
        self
    }

    pub fn with_approval_timeout_seconds(mut self, secs: u64) -> Self {
        self.approval_timeout_seconds = secs;
        self
    }
}
