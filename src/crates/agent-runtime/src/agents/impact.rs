//! Impact agent: wraps `spec_graph`'s change-impact analysis.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::agent::Agent;
use crate::error::{AgentError, Result};
use crate::model_client::{ChatMessage, ChatRequest, ModelClient};
use crate::task::AgentTask;
use crate::verdict::{ImpactVerdict, Verdict, VerdictEnvelope};

const SYSTEM_PROMPT: &str = "You are a Change Impact Agent. Given a changed node and its graph, \
estimate the blast radius of the change and recommend how cautiously it should be rolled out. \
Respond with a JSON object: {affected_node_ids, impact_ratio, severity, recommendations, \
confidence_score, reasoning}.";

#[derive(Debug, Deserialize)]
struct ImpactInput {
    snapshot: spec_graph::GraphSnapshot,
    changed_node_id: String,
}

pub struct ImpactAgent {
    agent_id: String,
    model: Option<Arc<dyn ModelClient>>,
}

impl ImpactAgent {
    pub fn new(agent_id: impl Into<String>, model: Option<Arc<dyn ModelClient>>) -> Self {
        Self {
            agent_id: agent_id.into(),
            model,
        }
    }
}

#[async_trait]
impl Agent for ImpactAgent {
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

        let mut verdict: ImpactVerdict = serde_json::from_str(&completion.content)
            .map_err(|e| AgentError::ModelClient(format!("malformed verdict json: {e}")))?;
        verdict.envelope.agent_id = self.agent_id.clone();
        verdict.envelope.fallback_mode = false;
        Ok(Verdict::Impact(verdict))
    }

    async fn execute_fallback(&self, task: &AgentTask) -> Result<Verdict> {
        if task.operation != "analyze_change_impact" {
            return Err(AgentError::UnsupportedOperation {
                agent_id: self.agent_id.clone(),
                operation: task.operation.clone(),
            });
        }
        let input: ImpactInput = serde_json::from_value(task.input_data.clone())
            .map_err(|e| AgentError::InvalidInput(e.to_string()))?;

        let resolver = spec_graph::algorithms::DependencyResolver::from_snapshot(&input.snapshot);
        let report = resolver.analyze_change_impact(&input.changed_node_id);

        let verdict = ImpactVerdict {
            envelope: VerdictEnvelope {
                agent_id: self.agent_id.clone(),
                confidence_score: 0.75,
                reasoning: "reverse-adjacency blast radius analysis".to_string(),
                fallback_mode: true,
            },
            affected_node_ids: report.affected_node_ids,
            impact_ratio: report.impact_ratio,
            severity: report.severity,
            recommendations: report.recommendations,
        };
        Ok(Verdict::Impact(verdict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use spec_graph::{Edge, EdgeKind, GraphSnapshot, Node, NodeKind};

    #[tokio::test]
    async fn fallback_reports_high_severity_for_a_widely_depended_on_node() {
        let nodes = vec![
            Node::new("base", NodeKind::Module, "base"),
            Node::new("a", NodeKind::Module, "a"),
            Node::new("b", NodeKind::Module, "b"),
        ];
        let edges = vec![
            Edge::new("e1", "a", "base", EdgeKind::DependsOn),
            Edge::new("e2", "b", "base", EdgeKind::DependsOn),
        ];
        let snapshot = GraphSnapshot { nodes, edges };

        let agent = ImpactAgent::new("impact-1", None);
        let task = AgentTask::new(
            "t1",
            "p1",
            "impact-1",
            "analyze_change_impact",
            json!({ "snapshot": snapshot, "changed_node_id": "base" }),
        );
        let verdict = agent.execute(&task).await.unwrap();
        match verdict {
            Verdict::Impact(v) => {
                assert_eq!(v.affected_node_ids.len(), 2);
                assert_eq!(v.severity, "high");
            }
            _ => panic!("expected impact verdict"),
        }
    }
}
