//! Task dispatch, agent selection, and verdict aggregation (spec §4.5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agent_runtime::{AgentTask, AgentType, Verdict};
use dashmap::DashMap;
use serde_json::json;
use spec_graph::GraphSnapshot;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::executor::retry::{retry_with_backoff, RetryConfig};
use crate::metrics::EngineMetrics;
use crate::{AgentHandle, MutationProposal, OrchestratorError, Result};

/// Tracks each registered agent's current in-flight task count so dispatch
/// can honor `max_concurrent_tasks` per agent (spec §4.5).
struct Slot {
    handle: AgentHandle,
    in_flight: AtomicU32,
}

/// Holds every registered agent and picks one per task by capability match,
/// free capacity, then priority (spec §4.5 dispatch rule).
pub struct Dispatcher {
    agents: DashMap<String, Arc<Slot>>,
    by_type: DashMap<AgentType, Vec<String>>,
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
}

impl Dispatcher {
    pub fn new(config: EngineConfig, metrics: Arc<EngineMetrics>) -> Self {
        Self {
            agents: DashMap::new(),
            by_type: DashMap::new(),
            config,
            metrics,
        }
    }

    pub fn register_agent(&self, handle: AgentHandle) {
        let agent_type = handle.registration.agent_type;
        let agent_id = handle.registration.agent_id.clone();
        self.agents.insert(
            agent_id.clone(),
            Arc::new(Slot {
                handle,
                in_flight: AtomicU32::new(0),
            }),
        );
        self.by_type.entry(agent_type).or_default().push(agent_id);
    }

    /// Picks the agent with free capacity and the highest `priority`, ties
    /// broken by lowest current in-flight count.
    fn select_agent(&self, agent_type: AgentType) -> Option<Arc<Slot>> {
        let candidates = self.by_type.get(&agent_type)?;
        candidates
            .iter()
            .filter_map(|id| self.agents.get(id).map(|s| s.clone()))
            .filter(|slot| {
                slot.in_flight.load(Ordering::Relaxed) < slot.handle.registration.max_concurrent_tasks
            })
            .max_by_key(|slot| {
                (
                    slot.handle.registration.priority,
                    -(slot.in_flight.load(Ordering::Relaxed) as i64),
                )
            })
    }

    /// Runs one capability against whichever agent is free for `agent_type`,
    /// honoring the per-task deadline and retrying transient failures.
    #[instrument(skip(self, input_data), fields(proposal_id, operation))]
    pub async fn dispatch_capability(
        &self,
        proposal_id: &str,
        agent_type: AgentType,
        operation: &str,
        input_data: serde_json::Value,
    ) -> Result<Verdict> {
        let slot = self.select_agent(agent_type).ok_or_else(|| {
            OrchestratorError::General(format!(
                "no agent with free capacity for type {:?}",
                agent_type
            ))
        })?;

        let task = AgentTask::new(
            Uuid::new_v4().to_string(),
            proposal_id.to_string(),
            slot.handle.registration.agent_id.clone(),
            operation.to_string(),
            input_data,
        );

        slot.in_flight.fetch_add(1, Ordering::Relaxed);
        let result = self.run_with_deadline_and_retry(&slot, task).await;
        slot.in_flight.fetch_sub(1, Ordering::Relaxed);

        let outcome = if result.is_ok() { "succeeded" } else { "failed" };
        self.metrics
            .record_agent_task(agent_type.as_str(), outcome);
        result
    }

    async fn run_with_deadline_and_retry(&self, slot: &Arc<Slot>, task: AgentTask) -> Result<Verdict> {
        let deadline = Duration::from_secs(self.config.agent_timeout_seconds);
        let retry_config = RetryConfig::new(self.config.retry_attempts);
        let agent = slot.handle.instance.clone();
        let agent_id = slot.handle.registration.agent_id.clone();

        retry_with_backoff(&retry_config, &format!("agent:{agent_id}"), move || {
            let agent = agent.clone();
            let task = task.clone();
            let agent_id = agent_id.clone();
            async move {
                match tokio::time::timeout(deadline, agent.execute(&task)).await {
                    Ok(Ok(verdict)) => Ok(verdict),
                    Ok(Err(err)) => Err(OrchestratorError::from(err)),
                    Err(_) => {
                        warn!(agent_id, task_id = %task.task_id, "agent task timed out");
                        Err(OrchestratorError::AgentTimeout {
                            agent_id,
                            task_id: task.task_id.clone(),
                            elapsed_ms: deadline.as_millis() as u64,
                        })
                    }
                }
            }
        })
        .await
    }

    /// Fans a proposal out to the validator, dependency, semantic, impact,
    /// and mutation-generator capabilities in parallel (spec §4.5); the
    /// conflict capability is dispatched separately, on demand, when a
    /// three-way merge is required (spec §4.9).
    pub async fn dispatch_proposal(
        &self,
        proposal: &MutationProposal,
        snapshot: &GraphSnapshot,
    ) -> Result<HashMap<String, Verdict>> {
        let proposal_payload = json!({
            "proposal": {
                "spec_id": proposal.spec_id,
                "reasoning": proposal.reasoning,
                "confidence": proposal.confidence,
                "content": proposal.proposed_changes,
            }
        });

        let (validator, dependency, semantic, impact, mutation) = tokio::join!(
            self.dispatch_capability(
                &proposal.proposal_id,
                AgentType::Validator,
                "validate_proposal",
                proposal_payload,
            ),
            self.dispatch_capability(
                &proposal.proposal_id,
                AgentType::Dependency,
                "analyze_dependencies",
                json!({ "snapshot": snapshot }),
            ),
            self.dispatch_capability(
                &proposal.proposal_id,
                AgentType::Semantic,
                "semantic_search",
                json!({ "snapshot": snapshot, "query": proposal.reasoning }),
            ),
            self.dispatch_capability(
                &proposal.proposal_id,
                AgentType::Impact,
                "analyze_change_impact",
                json!({ "snapshot": snapshot, "changed_node_id": proposal.spec_id }),
            ),
            self.dispatch_capability(
                &proposal.proposal_id,
                AgentType::Mutation,
                "generate_mutation",
                json!({ "change_request": {
                    "type": match proposal.operation_type {
                        crate::OperationType::Create => "create",
                        crate::OperationType::Update => "modify",
                        crate::OperationType::Delete => "delete",
                    },
                    "target": proposal.spec_id,
                    "content": proposal.proposed_changes,
                }}),
            ),
        );

        let mut verdicts = HashMap::new();
        verdicts.insert("validator".to_string(), validator?);
        verdicts.insert("dependency".to_string(), dependency?);
        verdicts.insert("semantic".to_string(), semantic?);
        verdicts.insert("impact".to_string(), impact?);
        verdicts.insert("mutation".to_string(), mutation?);
        Ok(verdicts)
    }

    /// A proposal is auto-apply-eligible iff none of its verdicts block
    /// auto-apply, every verdict clears `auto_approve_threshold`, and the
    /// risk taxonomy contains nothing of severity `high` (spec §4.5
    /// aggregation rule). `Verdict::blocks_auto_apply` already covers an
    /// invalid validator verdict and a critical circular dependency; impact
    /// severity is orchestrator-level because it isn't a per-verdict veto on
    /// its own, only in combination with the threshold.
    pub fn is_auto_apply_eligible(&self, verdicts: &HashMap<String, Verdict>) -> bool {
        verdicts.values().all(|v| {
            !v.blocks_auto_apply()
                && v.confidence_score() >= self.config.auto_approve_threshold
                && !matches!(v, Verdict::Impact(impact) if impact.severity == "high")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_runtime::agents::{
        DependencyAgent, ImpactAgent, MutationAgent, SemanticAgent, ValidatorAgent,
    };
    use spec_graph::{Edge, EdgeKind, Node, NodeKind};

    fn registration(id: &str, agent_type: AgentType) -> agent_runtime::AgentRegistration {
        agent_runtime::AgentRegistration::new(id, agent_type).with_max_concurrent_tasks(2)
    }

    fn dispatcher() -> Dispatcher {
        let dispatcher = Dispatcher::new(EngineConfig::default(), Arc::new(EngineMetrics::new().unwrap()));
        dispatcher.register_agent(AgentHandle {
            registration: registration("validator-1", AgentType::Validator),
            instance: Arc::new(ValidatorAgent::new("validator-1", None)),
        });
        dispatcher.register_agent(AgentHandle {
            registration: registration("dependency-1", AgentType::Dependency),
            instance: Arc::new(DependencyAgent::new("dependency-1", None)),
        });
        dispatcher.register_agent(AgentHandle {
            registration: registration("semantic-1", AgentType::Semantic),
            instance: Arc::new(SemanticAgent::new("semantic-1", None)),
        });
        dispatcher.register_agent(AgentHandle {
            registration: registration("impact-1", AgentType::Impact),
            instance: Arc::new(ImpactAgent::new("impact-1", None)),
        });
        dispatcher.register_agent(AgentHandle {
            registration: registration("mutation-1", AgentType::Mutation),
            instance: Arc::new(MutationAgent::new("mutation-1", None)),
        });
        dispatcher
    }

    fn snapshot() -> GraphSnapshot {
        let a = Node::new("a", NodeKind::Module, "a");
        let b = Node::new("b", NodeKind::Module, "b");
        let edge = Edge::new("e1", "a", "b", EdgeKind::DependsOn);
        GraphSnapshot {
            nodes: vec![a, b],
            edges: vec![edge],
        }
    }

    #[tokio::test]
    async fn dispatch_proposal_collects_one_verdict_per_capability() {
        let dispatcher = dispatcher();
        let proposal = crate::MutationProposal::new(
            "a",
            crate::OperationType::Update,
            "v1",
            json!({"content": "# Overview\nx\n# Implementation\ny"}),
            "user-1",
        )
        .with_reasoning("improve docs");

        let verdicts = dispatcher
            .dispatch_proposal(&proposal, &snapshot())
            .await
            .unwrap();

        assert_eq!(verdicts.len(), 5);
        assert!(verdicts.values().all(|v| v.is_fallback()));
    }

    #[tokio::test]
    async fn no_free_agent_of_the_required_type_is_a_general_error() {
        let dispatcher = Dispatcher::new(EngineConfig::default(), Arc::new(EngineMetrics::new().unwrap()));
        let err = dispatcher
            .dispatch_capability("p1", AgentType::Validator, "validate_proposal", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::General(_)));
    }
}
