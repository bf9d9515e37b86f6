//! Human-approval protocol (spec §4.7), grounded on the original
//! `ApprovalManager`: channel selection, timeout-driven escalation, a
//! pending-request ledger, and result notification.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::channel_hub::{ClientType, LiveChannelHub};
use crate::metrics::EngineMetrics;
use crate::mutation_store::MutationStore;
use crate::{
    ApprovalChannel, ApprovalDecision, ApprovalPriority, ApprovalRequest, ApprovalResponse,
    MutationProposal, MutationResult, OrchestratorError, ProposalState, Result,
};

/// At most one in-flight approval per proposal; the protocol and the hub
/// together implement the duplicate-issuance-is-a-no-op rule (spec §4.7).
pub struct ApprovalManager {
    hub: Arc<LiveChannelHub>,
    metrics: Arc<EngineMetrics>,
    mutation_store: Arc<MutationStore>,
    pending: DashMap<String, ApprovalRequest>,
    by_proposal: DashMap<String, String>,
    responses: DashMap<String, ApprovalResponse>,
    timeout_handles: DashMap<String, JoinHandle<()>>,
    default_timeout_seconds: u64,
}

impl ApprovalManager {
    pub fn new(
        hub: Arc<LiveChannelHub>,
        metrics: Arc<EngineMetrics>,
        mutation_store: Arc<MutationStore>,
        default_timeout_seconds: u64,
    ) -> Self {
        Self {
            hub,
            metrics,
            mutation_store,
            pending: DashMap::new(),
            by_proposal: DashMap::new(),
            responses: DashMap::new(),
            timeout_handles: DashMap::new(),
            default_timeout_seconds,
        }
    }

    async fn select_channel(&self, user_id: &str) -> ApprovalChannel {
        if self.hub.is_connected(user_id, Some(ClientType::Editor)) {
            ApprovalChannel::LiveEditor
        } else if self.hub.is_connected(user_id, Some(ClientType::Web)) {
            ApprovalChannel::LiveWeb
        } else {
            ApprovalChannel::Auto
        }
    }

    fn generate_diff(&self, _proposal: &MutationProposal) -> Value {
        json!({"additions": [], "deletions": [], "modifications": []})
    }

    /// Request human approval for a proposal. If one is already pending for
    /// this `proposal_id`, returns the existing request instead of issuing a
    /// second one (spec §4.7 concurrency rule).
    pub async fn request_approval(
        self: &Arc<Self>,
        proposal: &MutationProposal,
        user_id: &str,
        priority: ApprovalPriority,
    ) -> Result<ApprovalRequest> {
        if let Some(existing_id) = self.by_proposal.get(&proposal.proposal_id) {
            if let Some(existing) = self.pending.get(existing_id.value()) {
                return Ok(existing.clone());
            }
        }

        let channel = self.select_channel(user_id).await;
        let timeout_seconds = self.default_timeout_seconds;
        let now = Utc::now();
        let request = ApprovalRequest {
            request_id: Uuid::new_v4().to_string(),
            proposal_id: proposal.proposal_id.clone(),
            user_id: user_id.to_string(),
            spec_id: proposal.spec_id.clone(),
            current_content: json!(proposal.current_version),
            proposed_content: proposal.proposed_changes.clone(),
            diff: self.generate_diff(proposal),
            reasoning: proposal.reasoning.clone(),
            confidence: proposal.confidence,
            priority,
            preferred_channel: channel,
            fallback_channels: vec![ApprovalChannel::LiveWeb, ApprovalChannel::Auto],
            timeout_seconds,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(timeout_seconds as i64),
        };

        self.route_approval(&request).await;

        self.pending.insert(request.request_id.clone(), request.clone());
        self.by_proposal
            .insert(proposal.proposal_id.clone(), request.request_id.clone());
        self.metrics.pending_approvals.inc();

        let manager = Arc::clone(self);
        let request_id = request.request_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(timeout_seconds)).await;
            manager.handle_timeout(&request_id).await;
        });
        self.timeout_handles.insert(request.request_id.clone(), handle);

        Ok(request)
    }

    async fn route_approval(&self, request: &ApprovalRequest) {
        let client_type = match request.preferred_channel {
            ApprovalChannel::LiveEditor => Some(ClientType::Editor),
            ApprovalChannel::LiveWeb => Some(ClientType::Web),
            ApprovalChannel::Auto => None,
        };
        if let Some(client_type) = client_type {
            self.hub.send_to_user(
                &request.user_id,
                Some(client_type),
                "approval:request",
                serde_json::to_value(request).unwrap_or(Value::Null),
            );
        }
        self.hub.send_to_user(
            &request.user_id,
            None,
            "notification",
            json!({
                "title": "Approval Required",
                "message": format!("Mutation for {} needs review", request.spec_id),
                "priority": request.priority,
            }),
        );
    }

    /// Ingest a human's decision, cancelling the scheduled timeout and
    /// resolving the proposal's fate (spec §4.7 step 5).
    pub async fn handle_response(&self, response: ApprovalResponse) -> Result<MutationResult> {
        let Some((_, request)) = self.pending.remove(&response.request_id) else {
            return Err(OrchestratorError::Approval(format!(
                "response to unknown approval request {}",
                response.request_id
            )));
        };
        self.by_proposal.remove(&request.proposal_id);
        self.metrics.pending_approvals.dec();
        if let Some((_, handle)) = self.timeout_handles.remove(&response.request_id) {
            handle.abort();
        }

        let result = match response.decision {
            ApprovalDecision::Approved | ApprovalDecision::Modified => {
                MutationResult::success(request.proposed_content.clone(), "v-next", 0)
            }
            ApprovalDecision::Rejected => MutationResult::failed(vec![]),
        };

        self.responses.insert(response.request_id.clone(), response);
        self.notify_result(&request.user_id, &result).await;
        Ok(result)
    }

    /// Fired when no response arrives within `timeout_seconds`. Synthesizes
    /// a system-issued rejection and marks the proposal `failed` directly
    /// (spec §4.7 step 4), since this path fires from a spawned task rather
    /// than through `Engine::resolve_approval`.
    pub async fn handle_timeout(&self, request_id: &str) {
        let Some((_, request)) = self.pending.remove(request_id) else {
            return;
        };
        self.by_proposal.remove(&request.proposal_id);
        self.metrics.pending_approvals.dec();
        self.timeout_handles.remove(request_id);

        let response = ApprovalResponse {
            request_id: request_id.to_string(),
            decision: ApprovalDecision::Rejected,
            modified_content: None,
            responded_via: "system".to_string(),
            user_notes: Some("Approval timeout".to_string()),
            timestamp: Utc::now(),
        };
        self.responses.insert(request_id.to_string(), response);

        if self
            .mutation_store
            .transition(
                &request.proposal_id,
                ProposalState::AwaitingApproval,
                ProposalState::Failed,
                json!({ "error": "Approval timeout" }),
            )
            .is_ok()
        {
            self.metrics.mutations_failed_total.inc();
        }

        let result = MutationResult::failed(vec!["Approval timeout".to_string()]);
        warn!(request_id, proposal_id = %request.proposal_id, "approval request timed out");
        self.notify_result(&request.user_id, &result).await;
    }

    async fn notify_result(&self, user_id: &str, result: &MutationResult) {
        info!(user_id, status = %result.status, "delivering mutation result");
        self.hub.send_to_user(
            user_id,
            None,
            "mutation:result",
            serde_json::to_value(result).unwrap_or(Value::Null),
        );
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OperationType;

    fn proposal() -> MutationProposal {
        MutationProposal::new(
            "spec-1",
            OperationType::Update,
            "v1",
            json!({"description": "new text"}),
            "user-1",
        )
    }

    fn manager(metrics: Arc<EngineMetrics>, timeout_seconds: u64) -> Arc<ApprovalManager> {
        Arc::new(ApprovalManager::new(
            Arc::new(LiveChannelHub::new()),
            metrics,
            Arc::new(MutationStore::new()),
            timeout_seconds,
        ))
    }

    #[tokio::test]
    async fn duplicate_request_for_same_proposal_returns_existing() {
        let metrics = Arc::new(EngineMetrics::new().unwrap());
        let manager = manager(metrics, 300);
        let p = proposal();

        let first = manager
            .request_approval(&p, "user-1", ApprovalPriority::Normal)
            .await
            .unwrap();
        let second = manager
            .request_approval(&p, "user-1", ApprovalPriority::Normal)
            .await
            .unwrap();

        assert_eq!(first.request_id, second.request_id);
        assert_eq!(manager.pending_count(), 1);
    }

    #[tokio::test]
    async fn approved_response_resolves_to_success() {
        let metrics = Arc::new(EngineMetrics::new().unwrap());
        let manager = manager(metrics, 300);
        let p = proposal();

        let request = manager
            .request_approval(&p, "user-1", ApprovalPriority::High)
            .await
            .unwrap();

        let result = manager
            .handle_response(ApprovalResponse {
                request_id: request.request_id.clone(),
                decision: ApprovalDecision::Approved,
                modified_content: None,
                responded_via: "live-editor".to_string(),
                user_notes: None,
                timestamp: Utc::now(),
            })
            .await
            .unwrap();

        assert_eq!(result.status, "success");
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test]
    async fn rejected_response_resolves_to_failure() {
        let metrics = Arc::new(EngineMetrics::new().unwrap());
        let manager = manager(metrics, 300);
        let p = proposal();

        let request = manager
            .request_approval(&p, "user-1", ApprovalPriority::Normal)
            .await
            .unwrap();

        let result = manager
            .handle_response(ApprovalResponse {
                request_id: request.request_id,
                decision: ApprovalDecision::Rejected,
                modified_content: None,
                responded_via: "live-web".to_string(),
                user_notes: None,
                timestamp: Utc::now(),
            })
            .await
            .unwrap();

        assert_eq!(result.status, "failed");
    }

    #[tokio::test]
    async fn response_to_unknown_request_is_an_approval_error() {
        let metrics = Arc::new(EngineMetrics::new().unwrap());
        let manager = manager(metrics, 300);

        let err = manager
            .handle_response(ApprovalResponse {
                request_id: "does-not-exist".to_string(),
                decision: ApprovalDecision::Approved,
                modified_content: None,
                responded_via: "live-editor".to_string(),
                user_notes: None,
                timestamp: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Approval(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out_with_the_expected_reason() {
        let metrics = Arc::new(EngineMetrics::new().unwrap());
        let hub = Arc::new(LiveChannelHub::new());
        let mutation_store = Arc::new(MutationStore::new());
        let manager = Arc::new(ApprovalManager::new(hub, metrics, mutation_store.clone(), 5));
        let p = proposal();
        let proposal_id = p.proposal_id.clone();
        mutation_store.insert(p.clone()).unwrap();
        mutation_store
            .transition(&proposal_id, ProposalState::Proposed, ProposalState::Validating, json!({}))
            .unwrap();
        mutation_store
            .transition(
                &proposal_id,
                ProposalState::Validating,
                ProposalState::AwaitingApproval,
                json!({}),
            )
            .unwrap();

        let request = manager
            .request_approval(&p, "user-1", ApprovalPriority::Normal)
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        // Let the spawned timeout task run.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(1)).await;
        tokio::task::yield_now().await;

        assert_eq!(manager.pending_count(), 0);
        let response = manager.responses.get(&request.request_id).unwrap();
        assert_eq!(response.user_notes.as_deref(), Some("Approval timeout"));
        let (_, state) = mutation_store.get(&proposal_id).unwrap();
        assert_eq!(state, ProposalState::Failed);
    }
}
