//! Dependency agent: wraps `spec_graph`'s dependency resolver as an agent
//! capability, with a model-delegating primary path for free-text resolution
//! advice.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::agent::Agent;
use crate::error::{AgentError, Result};
use crate::model_client::{ChatMessage, ChatRequest, ModelClient};
use crate::task::AgentTask;
use crate::verdict::{DependencyVerdict, Verdict, VerdictEnvelope};

const SYSTEM_PROMPT: &str = "You are a Dependency Resolver Agent. Analyze dependency graphs, \
identify circular dependencies, and suggest resolution strategies such as dependency inversion \
or layered architecture. Respond with a JSON object: {is_valid, circular_dependencies, \
resolution_suggestions, confidence_score, reasoning}.";

#[derive(Debug, Deserialize)]
struct DependencyInput {
    snapshot: spec_graph::GraphSnapshot,
}

pub struct DependencyAgent {
    agent_id: String,
    model: Option<Arc<dyn ModelClient>>,
}

impl DependencyAgent {
    pub fn new(agent_id: impl Into<String>, model: Option<Arc<dyn ModelClient>>) -> Self {
        Self {
            agent_id: agent_id.into(),
            model,
        }
    }

    fn analyze(snapshot: &spec_graph::GraphSnapshot) -> DependencyVerdict {
        let resolver = spec_graph::algorithms::DependencyResolver::from_snapshot(snapshot);
        let cycles = resolver.detect_circular_dependencies();
        let is_valid = cycles.is_empty();

        let resolution_suggestions = cycles
            .iter()
            .map(|c| {
                format!(
                    "break the {} cycle ({}) via dependency inversion: {}",
                    c.cycle_type,
                    c.severity,
                    c.cycle.join(" -> ")
                )
            })
            .collect();

        DependencyVerdict {
            envelope: VerdictEnvelope {
                agent_id: String::new(),
                confidence_score: if is_valid { 0.8 } else { 0.6 },
                reasoning: "graph-based dependency analysis".to_string(),
                fallback_mode: true,
            },
            is_valid,
            circular_dependencies: cycles,
            resolution_suggestions,
        }
    }
}

#[async_trait]
impl Agent for DependencyAgent {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    async fn execute_primary(&self, task: &AgentTask) -> Result<Verdict> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| AgentError::ModelClient("no model client configured".to_string()))?;

        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(task.input_data.to_string()),
            ],
            expects_json: true,
        };
        let completion = model.chat(request).await?;

        let mut verdict: DependencyVerdict = serde_json::from_str(&completion.content)
            .map_err(|e| AgentError::ModelClient(format!("malformed verdict json: {e}")))?;
        verdict.envelope.agent_id = self.agent_id.clone();
        verdict.envelope.fallback_mode = false;
        Ok(Verdict::Dependency(verdict))
    }

    async fn execute_fallback(&self, task: &AgentTask) -> Result<Verdict> {
        if task.operation != "analyze_dependencies" && task.operation != "analyze_change_impact" {
            return Err(AgentError::UnsupportedOperation {
                agent_id: self.agent_id.clone(),
                operation: task.operation.clone(),
            });
        }
        let input: DependencyInput = serde_json::from_value(task.input_data.clone())
            .map_err(|e| AgentError::InvalidInput(e.to_string()))?;

        let mut verdict = Self::analyze(&input.snapshot);
        verdict.envelope.agent_id = self.agent_id.clone();
        Ok(Verdict::Dependency(verdict))
    }
}
