//! Mutation generator agent: plans atomic, reversible steps for a requested
//! change, with a deterministic template fallback.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::agent::Agent;
use crate::error::{AgentError, Result};
use crate::model_client::{ChatMessage, ChatRequest, ModelClient};
use crate::task::AgentTask;
use crate::verdict::{MutationPlan, MutationStep, MutationVerdict, Verdict, VerdictEnvelope};

const SYSTEM_PROMPT: &str = "You are a Mutation Generator Agent. Break requested specification \
changes into atomic, ordered, reversible steps, identify dependencies between steps, assess risk, \
and produce a rollback plan. Respond with a JSON object matching the mutation verdict schema.";

#[derive(Debug, Deserialize)]
struct ChangeRequest {
    #[serde(rename = "type", default = "default_change_type")]
    change_type: String,
    #[serde(default)]
    target: String,
    #[serde(default)]
    content: Value,
}

fn default_change_type() -> String {
    "modify".to_string()
}

pub struct MutationAgent {
    agent_id: String,
    model: Option<Arc<dyn ModelClient>>,
}

impl MutationAgent {
    pub fn new(agent_id: impl Into<String>, model: Option<Arc<dyn ModelClient>>) -> Self {
        Self {
            agent_id: agent_id.into(),
            model,
        }
    }

    fn generate_deterministic(change: &ChangeRequest) -> MutationVerdict {
        let step = MutationStep {
            step_id: format!("{}_001", change.change_type),
            operation: change.change_type.clone(),
            target: change.target.clone(),
            content: change.content.clone(),
            dependencies: Vec::new(),
            rationale: format!("{} {} as requested", change.change_type, change.target),
        };

        let plan = MutationPlan {
            plan_id: format!("plan_{}_{}", change.change_type, change.target),
            description: format!("basic {} operation for {}", change.change_type, change.target),
            steps: vec![step],
            estimated_impact: "medium".to_string(),
            rollback_plan: vec![MutationStep {
                step_id: "rollback_001".to_string(),
                operation: "restore".to_string(),
                target: change.target.clone(),
                content: json!({ "method": "restore_from_backup" }),
                dependencies: Vec::new(),
                rationale: "revert all changes to the previous state".to_string(),
            }],
        };

        MutationVerdict {
            envelope: VerdictEnvelope {
                agent_id: String::new(),
                confidence_score: 0.7,
                reasoning: "template-based mutation plan; detailed analysis requires the primary path"
                    .to_string(),
                fallback_mode: true,
            },
            success: true,
            mutation_plan: Some(plan),
            alternatives: Vec::new(),
            feasibility_score: 0.7,
            complexity_score: 0.5,
            risk_factors: vec!["changes require validation before application".to_string()],
            prerequisites: vec!["backup_current_state".to_string(), "validate_permissions".to_string()],
            validation_criteria: vec![
                "structure_integrity".to_string(),
                "content_validity".to_string(),
                "relationship_consistency".to_string(),
            ],
        }
    }
}

#[async_trait]
impl Agent for MutationAgent {
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

        let mut verdict: MutationVerdict = serde_json::from_str(&completion.content)
            .map_err(|e| AgentError::ModelClient(format!("malformed verdict json: {e}")))?;
        verdict.envelope.agent_id = self.agent_id.clone();
        verdict.envelope.fallback_mode = false;
        Ok(Verdict::Mutation(verdict))
    }

    async fn execute_fallback(&self, task: &AgentTask) -> Result<Verdict> {
        if task.operation != "generate_mutation" {
            return Err(AgentError::UnsupportedOperation {
                agent_id: self.agent_id.clone(),
                operation: task.operation.clone(),
            });
        }
        let change: ChangeRequest = task
            .input_data
            .get("change_request")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e: serde_json::Error| AgentError::InvalidInput(e.to_string()))?
            .unwrap_or(ChangeRequest {
                change_type: default_change_type(),
                target: "unknown".to_string(),
                content: Value::Null,
            });

        let mut verdict = Self::generate_deterministic(&change);
        verdict.envelope.agent_id = self.agent_id.clone();
        Ok(Verdict::Mutation(verdict))
    }
}
