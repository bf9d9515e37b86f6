//! Semantic agent: wraps `spec_graph`'s pluggable similarity search.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use spec_graph::semantic::SemanticIndex;

use crate::agent::Agent;
use crate::error::{AgentError, Result};
use crate::model_client::{ChatMessage, ChatRequest, ModelClient};
use crate::task::AgentTask;
use crate::verdict::{SemanticMatchResult, SemanticVerdict, Verdict, VerdictEnvelope};

const SYSTEM_PROMPT: &str = "You are a Semantic Search Agent. Given a query and a set of spec \
graph nodes, rank the nodes most relevant to the query and explain your ranking. Respond with a \
JSON object: {matches, confidence_score, reasoning}.";

#[derive(Debug, Deserialize)]
struct SemanticInput {
    snapshot: spec_graph::GraphSnapshot,
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    10
}

pub struct SemanticAgent {
    agent_id: String,
    model: Option<Arc<dyn ModelClient>>,
}

impl SemanticAgent {
    pub fn new(agent_id: impl Into<String>, model: Option<Arc<dyn ModelClient>>) -> Self {
        Self {
            agent_id: agent_id.into(),
            model,
        }
    }
}

#[async_trait]
impl Agent for SemanticAgent {
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

        let mut verdict: SemanticVerdict = serde_json::from_str(&completion.content)
            .map_err(|e| AgentError::ModelClient(format!("malformed verdict json: {e}")))?;
        verdict.envelope.agent_id = self.agent_id.clone();
        verdict.envelope.fallback_mode = false;
        Ok(Verdict::Semantic(verdict))
    }

    async fn execute_fallback(&self, task: &AgentTask) -> Result<Verdict> {
        if task.operation != "semantic_search" {
            return Err(AgentError::UnsupportedOperation {
                agent_id: self.agent_id.clone(),
                operation: task.operation.clone(),
            });
        }
        let input: SemanticInput = serde_json::from_value(task.input_data.clone())
            .map_err(|e| AgentError::InvalidInput(e.to_string()))?;

        let mut index = spec_graph::semantic::lexical_backend();
        index
            .reindex(&input.snapshot)
            .await
            .map_err(|e| AgentError::General(e.to_string()))?;
        let hits = index
            .search(&input.query, input.limit)
            .await
            .map_err(|e| AgentError::General(e.to_string()))?;

        let matches = hits
            .into_iter()
            .map(|m| SemanticMatchResult {
                node_id: m.node_id,
                score: m.score,
            })
            .collect();

        let verdict = SemanticVerdict {
            envelope: VerdictEnvelope {
                agent_id: self.agent_id.clone(),
                confidence_score: 0.7,
                reasoning: "deterministic TF-IDF/cosine lexical search".to_string(),
                fallback_mode: true,
            },
            matches,
        };
        Ok(Verdict::Semantic(verdict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use spec_graph::{GraphSnapshot, Node, NodeKind};

    #[tokio::test]
    async fn fallback_ranks_matching_node_first() {
        let mut auth = Node::new("auth", NodeKind::Module, "Authentication");
        auth.description = Some("login and session handling".to_string());
        let snapshot = GraphSnapshot {
            nodes: vec![auth],
            edges: vec![],
        };

        let agent = SemanticAgent::new("semantic-1", None);
        let task = AgentTask::new(
            "t1",
            "p1",
            "semantic-1",
            "semantic_search",
            json!({ "snapshot": snapshot, "query": "session login" }),
        );
        let verdict = agent.execute(&task).await.unwrap();
        match verdict {
            Verdict::Semantic(v) => {
                assert_eq!(v.matches[0].node_id, "auth");
            }
            _ => panic!("expected semantic verdict"),
        }
    }
}
