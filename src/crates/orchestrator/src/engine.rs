//! Top-level engine: wires the graph repository, agent dispatcher, mutation
//! store, approval manager, and live channel hub into one constructed value
//! (spec §9 design note: replace global singletons with an explicit struct).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use agent_runtime::{AgentRegistration, AgentType, Verdict};
use serde_json::json;
use spec_graph::algorithms::DependencyResolver;
use spec_graph::{GraphRepository, InMemoryGraphRepository};
use tracing::{info, instrument};

use crate::approval::ApprovalManager;
use crate::channel_hub::LiveChannelHub;
use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::metrics::EngineMetrics;
use crate::mutation_store::MutationStore;
use crate::{
    ApprovalDecision, ApprovalPriority, MutationProposal, MutationResult, OrchestratorError,
    ProposalState, Result,
};

/// Everything the mutation engine needs, constructed once and passed
/// explicitly — no module-level statics anywhere in this crate.
pub struct Engine {
    pub config: EngineConfig,
    pub repository: Arc<dyn GraphRepository>,
    pub dispatcher: Arc<Dispatcher>,
    pub mutation_store: Arc<MutationStore>,
    pub approval_manager: Arc<ApprovalManager>,
    pub channel_hub: Arc<LiveChannelHub>,
    pub metrics: Arc<EngineMetrics>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let metrics = Arc::new(EngineMetrics::new().expect("metric names are static and valid"));
        let channel_hub = Arc::new(LiveChannelHub::new());
        let mutation_store = Arc::new(MutationStore::new());
        let approval_manager = Arc::new(ApprovalManager::new(
            channel_hub.clone(),
            metrics.clone(),
            mutation_store.clone(),
            config.approval_timeout_seconds,
        ));
        let dispatcher = Arc::new(Dispatcher::new(config.clone(), metrics.clone()));

        Self {
            config,
            repository: Arc::new(InMemoryGraphRepository::new()),
            dispatcher,
            mutation_store,
            approval_manager,
            channel_hub,
            metrics,
        }
    }

    pub fn register_agent(&self, registration: AgentRegistration, instance: Arc<dyn agent_runtime::Agent>) {
        self.dispatcher.register_agent(crate::AgentHandle {
            registration,
            instance,
        });
    }

    /// Submits a proposal, runs it through dispatch and aggregation, and
    /// either applies it directly or routes it to approval (spec §4.5–§4.9).
    #[instrument(skip(self, proposal), fields(proposal_id = %proposal.proposal_id))]
    pub async fn submit_proposal(&self, proposal: MutationProposal) -> Result<MutationResult> {
        let start = Instant::now();
        self.metrics.mutations_proposed_total.inc();
        self.mutation_store.insert(proposal.clone())?;
        self.mutation_store.transition(
            &proposal.proposal_id,
            ProposalState::Proposed,
            ProposalState::Validating,
            json!({}),
        )?;

        let snapshot = self.repository.snapshot().await?;
        let verdicts = match self.dispatcher.dispatch_proposal(&proposal, &snapshot).await {
            Ok(v) => v,
            Err(err) => {
                self.mutation_store.transition(
                    &proposal.proposal_id,
                    ProposalState::Validating,
                    ProposalState::Failed,
                    json!({ "error": err.to_string() }),
                )?;
                self.metrics.mutations_failed_total.inc();
                return Ok(MutationResult::failed(vec![err.to_string()]));
            }
        };

        if let Some(OrchestratorError::Dependency { .. }) = self.dependency_error(&verdicts) {
            self.mutation_store.transition(
                &proposal.proposal_id,
                ProposalState::Validating,
                ProposalState::Failed,
                json!({ "reason": "circular dependency" }),
            )?;
            self.metrics.mutations_failed_total.inc();
            return Ok(MutationResult::failed(vec![
                "circular dependency detected".to_string(),
            ]));
        }

        if self.dispatcher.is_auto_apply_eligible(&verdicts) {
            self.apply(&proposal, &verdicts, start).await
        } else {
            info!(proposal_id = %proposal.proposal_id, "routing to approval: verdicts did not clear auto-apply threshold");
            self.mutation_store.transition(
                &proposal.proposal_id,
                ProposalState::Validating,
                ProposalState::AwaitingApproval,
                json!({}),
            )?;
            let request = self
                .approval_manager
                .request_approval(&proposal, &proposal.requested_by, ApprovalPriority::Normal)
                .await?;
            info!(request_id = %request.request_id, "approval requested");
            Ok(MutationResult {
                mutation_id: request.request_id,
                status: "awaiting_approval".to_string(),
                applied_changes: serde_json::Value::Null,
                new_version: String::new(),
                validation_errors: Vec::new(),
                warnings: Vec::new(),
                execution_time_ms: start.elapsed().as_millis() as u64,
            })
        }
    }

    fn dependency_error(&self, verdicts: &HashMap<String, Verdict>) -> Option<OrchestratorError> {
        let Verdict::Dependency(dep) = verdicts.get("dependency")? else {
            return None;
        };
        if dep
            .circular_dependencies
            .iter()
            .any(|c| c.severity == "high")
        {
            Some(OrchestratorError::Dependency {
                cycles: dep.circular_dependencies.clone(),
            })
        } else {
            None
        }
    }

    async fn apply(
        &self,
        proposal: &MutationProposal,
        _verdicts: &HashMap<String, Verdict>,
        start: Instant,
    ) -> Result<MutationResult> {
        self.mutation_store.transition(
            &proposal.proposal_id,
            ProposalState::Validating,
            ProposalState::Applying,
            json!({}),
        )?;

        let outcome = self.apply_to_repository(proposal).await;

        match outcome {
            Ok(()) => {
                self.mutation_store.transition(
                    &proposal.proposal_id,
                    ProposalState::Applying,
                    ProposalState::Applied,
                    json!({}),
                )?;
                self.metrics.mutations_completed_total.inc();
                let result = MutationResult::success(
                    proposal.proposed_changes.clone(),
                    "v-next",
                    start.elapsed().as_millis() as u64,
                );
                self.channel_hub.send_to_user(
                    &proposal.requested_by,
                    None,
                    "mutation:result",
                    serde_json::to_value(&result).unwrap_or(serde_json::Value::Null),
                );
                Ok(result)
            }
            Err(err) => {
                self.mutation_store.transition(
                    &proposal.proposal_id,
                    ProposalState::Applying,
                    ProposalState::RolledBack,
                    json!({ "error": err.to_string() }),
                )?;
                self.metrics.mutations_failed_total.inc();
                Ok(MutationResult::failed(vec![err.to_string()]))
            }
        }
    }

    async fn apply_to_repository(&self, proposal: &MutationProposal) -> Result<()> {
        match proposal.operation_type {
            crate::OperationType::Update => {
                let patch: spec_graph::NodePatch =
                    serde_json::from_value(proposal.proposed_changes.clone())?;
                self.repository.patch_node(&proposal.spec_id, patch).await?;
            }
            crate::OperationType::Delete => {
                self.repository.delete_node(&proposal.spec_id, true).await?;
            }
            crate::OperationType::Create => {
                let payload: NewNodePayload =
                    serde_json::from_value(proposal.proposed_changes.clone())?;
                let mut node = spec_graph::Node::new(&proposal.spec_id, payload.kind, payload.name);
                node.description = payload.description;
                node.content = payload.content;
                node.metadata = payload.metadata;
                self.repository.upsert_node(node).await?;
            }
        }
        Ok(())
    }

    /// Resolve a pending approval, completing the proposal's lifecycle.
    pub async fn resolve_approval(
        &self,
        proposal_id: &str,
        decision: ApprovalDecision,
        response: crate::ApprovalResponse,
    ) -> Result<MutationResult> {
        let result = self.approval_manager.handle_response(response).await?;
        let (proposal, state) = self
            .mutation_store
            .get(proposal_id)
            .ok_or_else(|| OrchestratorError::General(format!("unknown proposal {proposal_id}")))?;

        match decision {
            ApprovalDecision::Approved | ApprovalDecision::Modified => {
                if state == ProposalState::AwaitingApproval {
                    self.mutation_store.transition(
                        proposal_id,
                        ProposalState::AwaitingApproval,
                        ProposalState::Applying,
                        json!({}),
                    )?;
                    self.apply_to_repository(&proposal).await?;
                    self.mutation_store.transition(
                        proposal_id,
                        ProposalState::Applying,
                        ProposalState::Applied,
                        json!({}),
                    )?;
                    self.metrics.mutations_completed_total.inc();
                }
            }
            ApprovalDecision::Rejected => {
                if state == ProposalState::AwaitingApproval {
                    self.mutation_store.transition(
                        proposal_id,
                        ProposalState::AwaitingApproval,
                        ProposalState::Failed,
                        json!({}),
                    )?;
                    self.metrics.mutations_failed_total.inc();
                }
            }
        }
        Ok(result)
    }

    /// Build a dependency resolver over the repository's full current state.
    pub async fn dependency_resolver(&self) -> Result<DependencyResolver> {
        let snapshot = self.repository.snapshot().await?;
        Ok(DependencyResolver::from_snapshot(&snapshot))
    }
}

/// Fields a `create` proposal's `proposed_changes` must supply; `id` comes
/// from the proposal's `spec_id` instead of being duplicated in the payload.
#[derive(Debug, serde::Deserialize)]
struct NewNodePayload {
    kind: spec_graph::NodeKind,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// The default set of agent types the engine dispatches to (spec §4.5).
pub const REQUIRED_AGENT_TYPES: &[AgentType] = &[
    AgentType::Validator,
    AgentType::Dependency,
    AgentType::Semantic,
    AgentType::Impact,
    AgentType::Mutation,
];
