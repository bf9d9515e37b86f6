//! Conflict agent: three-way merge and conflict classification for
//! concurrent changes to the same node.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::agent::Agent;
use crate::error::{AgentError, Result};
use crate::model_client::{ChatMessage, ChatRequest, ModelClient};
use crate::task::AgentTask;
use crate::verdict::{ConflictVerdict, ResolutionStrategy, Verdict, VerdictEnvelope};

const SYSTEM_PROMPT: &str = "You are a Conflict Resolution Agent. Given a base version, local \
changes, and remote changes to the same node, classify the conflict (content, structural, or \
concurrent_edit) and rank resolution strategies (accept_theirs, accept_mine, merge_fields, \
manual) by confidence. Respond with a JSON object matching the conflict verdict schema.";

#[derive(Debug, Deserialize)]
struct ConflictInput {
    base_version: Value,
    local_changes: Value,
    remote_changes: Value,
}

pub struct ConflictAgent {
    agent_id: String,
    model: Option<Arc<dyn ModelClient>>,
}

impl ConflictAgent {
    pub fn new(agent_id: impl Into<String>, model: Option<Arc<dyn ModelClient>>) -> Self {
        Self {
            agent_id: agent_id.into(),
            model,
        }
    }

    /// Field-level diff: which top-level keys each side touched relative to base.
    fn touched_fields(base: &Value, changed: &Value) -> Vec<String> {
        let (Value::Object(base), Value::Object(changed)) = (base, changed) else {
            return Vec::new();
        };
        changed
            .iter()
            .filter(|(k, v)| base.get(*k) != Some(*v))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn classify_and_resolve(input: &ConflictInput) -> ConflictVerdict {
        let local_fields = Self::touched_fields(&input.base_version, &input.local_changes);
        let remote_fields = Self::touched_fields(&input.base_version, &input.remote_changes);

        let overlapping: Vec<&String> = local_fields
            .iter()
            .filter(|f| remote_fields.contains(f))
            .collect();

        let (conflict_type, auto_resolvable) = if overlapping.is_empty() {
            ("structural", true)
        } else if overlapping.len() == 1 {
            ("content", false)
        } else {
            ("concurrent_edit", false)
        };

        let mut strategies = Vec::new();
        if auto_resolvable {
            strategies.push(ResolutionStrategy {
                strategy_type: "merge_fields".to_string(),
                description: "non-overlapping field changes merge cleanly".to_string(),
                confidence: 0.9,
            });
        } else {
            strategies.push(ResolutionStrategy {
                strategy_type: "merge_fields".to_string(),
                description: "attempt a field-level merge, deferring to remote on overlap"
                    .to_string(),
                confidence: 0.5,
            });
            strategies.push(ResolutionStrategy {
                strategy_type: "accept_theirs".to_string(),
                description: "take the remote side's version of the conflicting fields"
                    .to_string(),
                confidence: 0.4,
            });
            strategies.push(ResolutionStrategy {
                strategy_type: "accept_mine".to_string(),
                description: "keep the local side's version of the conflicting fields"
                    .to_string(),
                confidence: 0.4,
            });
            strategies.push(ResolutionStrategy {
                strategy_type: "manual".to_string(),
                description: "surface the conflict to a human reviewer".to_string(),
                confidence: 0.3,
            });
        }
        strategies.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());

        let recommended_strategy = strategies.first().map(|s| s.strategy_type.clone());

        ConflictVerdict {
            envelope: VerdictEnvelope {
                agent_id: String::new(),
                confidence_score: if auto_resolvable { 0.8 } else { 0.5 },
                reasoning: format!(
                    "{} conflict detected across {} overlapping field(s)",
                    conflict_type,
                    overlapping.len()
                ),
                fallback_mode: true,
            },
            conflict_type: conflict_type.to_string(),
            auto_resolvable,
            strategies,
            recommended_strategy,
        }
    }
}

#[async_trait]
impl Agent for ConflictAgent {
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

        let mut verdict: ConflictVerdict = serde_json::from_str(&completion.content)
            .map_err(|e| AgentError::ModelClient(format!("malformed verdict json: {e}")))?;
        verdict.envelope.agent_id = self.agent_id.clone();
        verdict.envelope.fallback_mode = false;
        Ok(Verdict::Conflict(verdict))
    }

    async fn execute_fallback(&self, task: &AgentTask) -> Result<Verdict> {
        if task.operation != "detect_conflicts" {
            return Err(AgentError::UnsupportedOperation {
                agent_id: self.agent_id.clone(),
                operation: task.operation.clone(),
            });
        }
        let input: ConflictInput = serde_json::from_value(task.input_data.clone())
            .map_err(|e| AgentError::InvalidInput(e.to_string()))?;

        let mut verdict = Self::classify_and_resolve(&input);
        verdict.envelope.agent_id = self.agent_id.clone();
        Ok(Verdict::Conflict(verdict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn non_overlapping_changes_are_structural_and_auto_resolvable() {
        let agent = ConflictAgent::new("conflict-1", None);
        let task = AgentTask::new(
            "t1",
            "p1",
            "conflict-1",
            "detect_conflicts",
            json!({
                "base_version": { "name": "auth", "status": "active" },
                "local_changes": { "name": "auth-v2", "status": "active" },
                "remote_changes": { "name": "auth", "status": "deprecated" },
            }),
        );
        let verdict = agent.execute(&task).await.unwrap();
        match verdict {
            Verdict::Conflict(v) => {
                assert_eq!(v.conflict_type, "structural");
                assert!(v.auto_resolvable);
            }
            _ => panic!("expected conflict verdict"),
        }
    }

    #[tokio::test]
    async fn overlapping_field_changes_require_manual_strategy_available() {
        let agent = ConflictAgent::new("conflict-1", None);
        let task = AgentTask::new(
            "t1",
            "p1",
            "conflict-1",
            "detect_conflicts",
            json!({
                "base_version": { "name": "auth" },
                "local_changes": { "name": "auth-local" },
                "remote_changes": { "name": "auth-remote" },
            }),
        );
        let verdict = agent.execute(&task).await.unwrap();
        match verdict {
            Verdict::Conflict(v) => {
                assert_eq!(v.conflict_type, "content");
                assert!(!v.auto_resolvable);
                assert!(v.strategies.iter().any(|s| s.strategy_type == "manual"));
            }
            _ => panic!("expected conflict verdict"),
        }
    }
}
