//! Multi-agent mutation orchestrator.
//!
//! Accepts a [`MutationProposal`] against a spec graph, fans it out to the
//! capability agents in `agent-runtime`, aggregates their verdicts, and
//! either applies the change directly or routes it through the approval
//! protocol. See [`engine::Engine`] for the top-level wiring.

pub mod approval;
pub mod channel_hub;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod executor;
pub mod metrics;
pub mod mutation_store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// The closed error taxonomy surfaced across the mutation engine (spec §7).
///
/// `General` exists for leaf errors that don't warrant their own variant yet
/// (config/IO plumbing); [`executor::retry::classify_error`] pattern-matches
/// on its message to decide whether a failure is worth retrying.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("dependency error: {} circular dependency(ies) detected", .cycles.len())]
    Dependency {
        cycles: Vec<spec_graph::algorithms::CircularDependency>,
    },

    #[error("conflict error: {0}")]
    Conflict(String),

    #[error("agent {agent_id} timed out after {elapsed_ms}ms on task {task_id}")]
    AgentTimeout {
        agent_id: String,
        task_id: String,
        elapsed_ms: u64,
    },

    #[error("approval error: {0}")]
    Approval(String),

    #[error("mutation error applying proposal {proposal_id}: {reason}")]
    Mutation { proposal_id: String, reason: String },

    #[error("{0}")]
    General(String),

    #[error("graph error: {0}")]
    Graph(#[from] spec_graph::GraphError),

    #[error("agent runtime error: {0}")]
    Agent(#[from] agent_runtime::AgentError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Kind of change a proposal wants to make to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Create,
    Update,
    Delete,
}

/// Lifecycle state of a [`MutationProposal`] (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalState {
    Proposed,
    Validating,
    AwaitingApproval,
    Applying,
    Applied,
    Failed,
    RolledBack,
    Cancelled,
}

impl ProposalState {
    /// Whether this state is a terminal point in the lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalState::Applied
                | ProposalState::Failed
                | ProposalState::RolledBack
                | ProposalState::Cancelled
        )
    }

    /// Valid next states from this state. A single-writer ledger
    /// ([`mutation_store::MutationStore`]) rejects anything not in this set.
    pub fn allowed_transitions(&self) -> &'static [ProposalState] {
        use ProposalState::*;
        match self {
            Proposed => &[Validating, Cancelled],
            Validating => &[AwaitingApproval, Applying, Failed, Cancelled],
            AwaitingApproval => &[Applying, Failed, Cancelled],
            Applying => &[Applied, Failed, RolledBack],
            Applied | Failed | RolledBack | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: ProposalState) -> bool {
        self.allowed_transitions().contains(&next)
    }
}

impl std::fmt::Display for ProposalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProposalState::Proposed => "proposed",
            ProposalState::Validating => "validating",
            ProposalState::AwaitingApproval => "awaiting_approval",
            ProposalState::Applying => "applying",
            ProposalState::Applied => "applied",
            ProposalState::Failed => "failed",
            ProposalState::RolledBack => "rolled_back",
            ProposalState::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// A request to change the spec graph, subject to agent review and possibly
/// human approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationProposal {
    pub proposal_id: String,
    pub spec_id: String,
    pub operation_type: OperationType,
    pub current_version: String,
    pub proposed_changes: Value,
    pub reasoning: String,
    pub confidence: f64,
    #[serde(default)]
    pub impact_analysis: Value,
    pub requested_by: String,
    pub created_at: DateTime<Utc>,
}

impl MutationProposal {
    pub fn new(
        spec_id: impl Into<String>,
        operation_type: OperationType,
        current_version: impl Into<String>,
        proposed_changes: Value,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            proposal_id: Uuid::new_v4().to_string(),
            spec_id: spec_id.into(),
            operation_type,
            current_version: current_version.into(),
            proposed_changes,
            reasoning: String::new(),
            confidence: 0.0,
            impact_analysis: Value::Null,
            requested_by: requested_by.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }
}

/// Outcome of running a proposal through to completion, delivered to the
/// requester as a `mutation:result` event (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResult {
    pub mutation_id: String,
    pub status: String,
    pub applied_changes: Value,
    pub new_version: String,
    pub validation_errors: Vec<String>,
    pub warnings: Vec<String>,
    pub execution_time_ms: u64,
}

impl MutationResult {
    pub fn success(applied_changes: Value, new_version: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            mutation_id: Uuid::new_v4().to_string(),
            status: "success".to_string(),
            applied_changes,
            new_version: new_version.into(),
            validation_errors: Vec::new(),
            warnings: Vec::new(),
            execution_time_ms: elapsed_ms,
        }
    }

    pub fn failed(validation_errors: Vec<String>) -> Self {
        Self {
            mutation_id: Uuid::new_v4().to_string(),
            status: "failed".to_string(),
            applied_changes: Value::Null,
            new_version: String::new(),
            validation_errors,
            warnings: Vec::new(),
            execution_time_ms: 0,
        }
    }
}

/// Priority hint attached to an [`ApprovalRequest`]; affects UI ordering only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalPriority {
    Critical,
    High,
    Normal,
    Low,
}

/// A channel a human approver can be reached on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalChannel {
    LiveEditor,
    LiveWeb,
    Auto,
}

/// A pending request for human sign-off on a risky proposal (spec §3, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub request_id: String,
    pub proposal_id: String,
    pub user_id: String,
    pub spec_id: String,
    pub current_content: Value,
    pub proposed_content: Value,
    pub diff: Value,
    pub reasoning: String,
    pub confidence: f64,
    pub priority: ApprovalPriority,
    pub preferred_channel: ApprovalChannel,
    pub fallback_channels: Vec<ApprovalChannel>,
    pub timeout_seconds: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A human's (or the system's, on timeout) decision on an [`ApprovalRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
    Modified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub request_id: String,
    pub decision: ApprovalDecision,
    pub modified_content: Option<Value>,
    pub responded_via: String,
    pub user_notes: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Metadata describing which agent should run a given `AgentTask` and how
/// many it can run at once, keyed in the orchestrator's dispatch table.
#[derive(Clone)]
pub struct AgentHandle {
    pub registration: agent_runtime::AgentRegistration,
    pub instance: std::sync::Arc<dyn agent_runtime::Agent>,
}

/// Everything the orchestrator knows about one in-flight proposal.
#[derive(Debug, Clone)]
pub struct ProposalContext {
    pub proposal: MutationProposal,
    pub state: ProposalState,
    pub verdicts: HashMap<String, agent_runtime::Verdict>,
}

impl ProposalContext {
    pub fn new(proposal: MutationProposal) -> Self {
        Self {
            proposal,
            state: ProposalState::Proposed,
            verdicts: HashMap::new(),
        }
    }
}
