//! End-to-end engine scenarios, one per named case in the design notes:
//! auto-apply, approval-required, approval timeout, circular dependency
//! detection, cascade delete, and agent fallback routing.

use std::sync::Arc;
use std::time::Duration;

use agent_runtime::task::AgentTask;
use agent_runtime::verdict::{
    DependencyVerdict, ImpactVerdict, MutationVerdict, SemanticVerdict, ValidatorVerdict,
    VerdictEnvelope,
};
use agent_runtime::{Agent, AgentError, AgentRegistration, AgentType, Verdict};
use async_trait::async_trait;
use orchestrator::config::EngineConfig;
use orchestrator::engine::Engine;
use orchestrator::{
    ApprovalDecision, ApprovalResponse, MutationProposal, OperationType, ProposalState,
};
use serde_json::json;
use spec_graph::{Edge, EdgeKind, GraphRepository, Node, NodeKind};

/// Always returns the same verdict from the primary path.
struct FixedAgent {
    id: String,
    verdict: Verdict,
}

#[async_trait]
impl Agent for FixedAgent {
    fn agent_id(&self) -> &str {
        &self.id
    }

    async fn execute_primary(&self, _task: &AgentTask) -> agent_runtime::Result<Verdict> {
        Ok(self.verdict.clone())
    }

    async fn execute_fallback(&self, _task: &AgentTask) -> agent_runtime::Result<Verdict> {
        Ok(self.verdict.clone())
    }
}

/// Always fails its primary path, forcing the fallback verdict.
struct FallbackOnlyAgent {
    id: String,
    fallback_verdict: Verdict,
}

#[async_trait]
impl Agent for FallbackOnlyAgent {
    fn agent_id(&self) -> &str {
        &self.id
    }

    async fn execute_primary(&self, _task: &AgentTask) -> agent_runtime::Result<Verdict> {
        Err(AgentError::ModelClient("primary model unavailable".to_string()))
    }

    async fn execute_fallback(&self, _task: &AgentTask) -> agent_runtime::Result<Verdict> {
        Ok(self.fallback_verdict.clone())
    }
}

fn envelope(agent_id: &str, confidence: f64, fallback_mode: bool) -> VerdictEnvelope {
    VerdictEnvelope {
        agent_id: agent_id.to_string(),
        confidence_score: confidence,
        reasoning: "test fixture".to_string(),
        fallback_mode,
    }
}

fn validator_verdict(confidence: f64, is_valid: bool) -> Verdict {
    Verdict::Validator(ValidatorVerdict {
        envelope: envelope("validator-1", confidence, false),
        is_valid,
        errors: Vec::new(),
        warnings: Vec::new(),
        suggestions: Vec::new(),
    })
}

fn dependency_verdict(confidence: f64) -> Verdict {
    Verdict::Dependency(DependencyVerdict {
        envelope: envelope("dependency-1", confidence, false),
        is_valid: true,
        circular_dependencies: Vec::new(),
        resolution_suggestions: Vec::new(),
    })
}

fn impact_verdict(confidence: f64, severity: &str) -> Verdict {
    Verdict::Impact(ImpactVerdict {
        envelope: envelope("impact-1", confidence, false),
        affected_node_ids: Vec::new(),
        impact_ratio: if severity == "high" { 0.9 } else { 0.1 },
        severity: severity.to_string(),
        recommendations: Vec::new(),
    })
}

fn semantic_verdict(confidence: f64) -> Verdict {
    Verdict::Semantic(SemanticVerdict {
        envelope: envelope("semantic-1", confidence, false),
        matches: Vec::new(),
    })
}

fn mutation_verdict(confidence: f64) -> Verdict {
    Verdict::Mutation(MutationVerdict {
        envelope: envelope("mutation-1", confidence, false),
        success: true,
        mutation_plan: None,
        alternatives: Vec::new(),
        feasibility_score: confidence,
        complexity_score: 0.1,
        risk_factors: Vec::new(),
        prerequisites: Vec::new(),
        validation_criteria: Vec::new(),
    })
}

fn register_fixed(engine: &Engine, agent_type: AgentType, id: &str, verdict: Verdict) {
    engine.register_agent(
        AgentRegistration::new(id, agent_type),
        Arc::new(FixedAgent {
            id: id.to_string(),
            verdict,
        }),
    );
}

async fn engine_with_node(config: EngineConfig) -> Engine {
    let engine = Engine::new(config);
    let node = Node::new("n1", NodeKind::Module, "n1");
    engine.repository.upsert_node(node).await.unwrap();
    engine
}

fn update_proposal() -> MutationProposal {
    MutationProposal::new(
        "n1",
        OperationType::Update,
        "v1",
        json!({"description": "clarify the overview section"}),
        "user-1",
    )
    .with_reasoning("tidy up the description")
}

/// S1: every verdict clears the auto-approve threshold, so the proposal
/// applies directly with no approval round trip.
#[tokio::test]
async fn s1_high_confidence_verdicts_auto_apply() {
    let engine = engine_with_node(EngineConfig::default()).await;
    register_fixed(&engine, AgentType::Validator, "validator-1", validator_verdict(0.95, true));
    register_fixed(&engine, AgentType::Dependency, "dependency-1", dependency_verdict(0.9));
    register_fixed(&engine, AgentType::Semantic, "semantic-1", semantic_verdict(0.9));
    register_fixed(&engine, AgentType::Impact, "impact-1", impact_verdict(0.9, "low"));
    register_fixed(&engine, AgentType::Mutation, "mutation-1", mutation_verdict(0.9));

    let result = engine.submit_proposal(update_proposal()).await.unwrap();

    assert_eq!(result.status, "success");
    assert_eq!(engine.approval_manager.pending_count(), 0);
    assert_eq!(engine.metrics.mutations_completed_total.get(), 1);

    let node = engine.repository.get_node("n1").await.unwrap();
    assert_eq!(node.description.as_deref(), Some("clarify the overview section"));
}

/// S2: a high-severity impact verdict routes to approval; approving it
/// completes the mutation.
#[tokio::test]
async fn s2_high_impact_severity_requires_approval_then_applies() {
    let engine = engine_with_node(EngineConfig::default()).await;
    register_fixed(&engine, AgentType::Validator, "validator-1", validator_verdict(0.95, true));
    register_fixed(&engine, AgentType::Dependency, "dependency-1", dependency_verdict(0.9));
    register_fixed(&engine, AgentType::Semantic, "semantic-1", semantic_verdict(0.9));
    register_fixed(&engine, AgentType::Impact, "impact-1", impact_verdict(0.9, "high"));
    register_fixed(&engine, AgentType::Mutation, "mutation-1", mutation_verdict(0.9));

    let proposal = update_proposal();
    let proposal_id = proposal.proposal_id.clone();
    let submitted = engine.submit_proposal(proposal).await.unwrap();

    assert_eq!(submitted.status, "awaiting_approval");
    assert_eq!(engine.metrics.pending_approvals.get(), 1);

    let result = engine
        .resolve_approval(
            &proposal_id,
            ApprovalDecision::Approved,
            ApprovalResponse {
                request_id: submitted.mutation_id,
                decision: ApprovalDecision::Approved,
                modified_content: None,
                responded_via: "live-editor".to_string(),
                user_notes: None,
                timestamp: chrono::Utc::now(),
            },
        )
        .await
        .unwrap();

    assert_eq!(result.status, "success");
    assert_eq!(engine.metrics.pending_approvals.get(), 0);
    let (_, state) = engine.mutation_store.get(&proposal_id).unwrap();
    assert_eq!(state, ProposalState::Applied);
}

/// S3: an approval nobody answers resolves to a system-issued rejection once
/// the timeout elapses.
#[tokio::test(start_paused = true)]
async fn s3_unanswered_approval_times_out_as_failure() {
    let engine = engine_with_node(EngineConfig::default().with_approval_timeout_seconds(5)).await;
    register_fixed(&engine, AgentType::Validator, "validator-1", validator_verdict(0.95, true));
    register_fixed(&engine, AgentType::Dependency, "dependency-1", dependency_verdict(0.9));
    register_fixed(&engine, AgentType::Semantic, "semantic-1", semantic_verdict(0.9));
    register_fixed(&engine, AgentType::Impact, "impact-1", impact_verdict(0.9, "high"));
    register_fixed(&engine, AgentType::Mutation, "mutation-1", mutation_verdict(0.9));

    let proposal = update_proposal();
    let proposal_id = proposal.proposal_id.clone();
    let submitted = engine.submit_proposal(proposal).await.unwrap();
    assert_eq!(submitted.status, "awaiting_approval");

    tokio::time::advance(Duration::from_secs(6)).await;
    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_millis(1)).await;
    tokio::task::yield_now().await;

    assert_eq!(engine.approval_manager.pending_count(), 0);
    assert_eq!(engine.metrics.pending_approvals.get(), 0);
    let (_, state) = engine.mutation_store.get(&proposal_id).unwrap();
    assert_eq!(state, ProposalState::Failed);
}

/// S4: a two-node cycle is detected as a high-severity circular dependency
/// and blocks topological ordering.
#[tokio::test]
async fn s4_two_node_cycle_is_unorderable_and_high_severity() {
    let engine = Engine::new(EngineConfig::default());
    engine.repository.upsert_node(Node::new("a", NodeKind::Module, "a")).await.unwrap();
    engine.repository.upsert_node(Node::new("b", NodeKind::Module, "b")).await.unwrap();
    engine
        .repository
        .upsert_edge(Edge::new("e1", "a", "b", EdgeKind::DependsOn))
        .await
        .unwrap();
    engine
        .repository
        .upsert_edge(Edge::new("e2", "b", "a", EdgeKind::DependsOn))
        .await
        .unwrap();

    let resolver = engine.dependency_resolver().await.unwrap();
    let cycles = resolver.detect_circular_dependencies();

    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].severity, "high");
    assert!(resolver.resolve_dependencies().is_none());
}

/// S5: deleting a node with cascade removes its dependent edge atomically
/// and leaves unrelated nodes untouched.
#[tokio::test]
async fn s5_cascade_delete_removes_node_and_dependent_edge() {
    let engine = Engine::new(EngineConfig::default());
    engine.repository.upsert_node(Node::new("a", NodeKind::Module, "a")).await.unwrap();
    engine.repository.upsert_node(Node::new("b", NodeKind::Module, "b")).await.unwrap();
    engine
        .repository
        .upsert_edge(Edge::new("e1", "a", "b", EdgeKind::DependsOn))
        .await
        .unwrap();

    engine.repository.delete_node("a", true).await.unwrap();

    assert!(engine.repository.get_node("a").await.is_err());
    assert!(engine.repository.get_edge("e1").await.is_err());
    assert!(engine.repository.get_node("b").await.is_ok());

    let remaining = engine
        .repository
        .query_edges(Some(EdgeKind::DependsOn), &spec_graph::QueryFilters::new())
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

/// S6: a validator whose primary path fails falls back to a 0.7-confidence
/// verdict, which is below the 0.85 auto-approve threshold, so the proposal
/// routes to approval instead of applying automatically.
#[tokio::test]
async fn s6_low_confidence_fallback_verdict_routes_to_approval() {
    let engine = engine_with_node(EngineConfig::default()).await;
    engine.register_agent(
        AgentRegistration::new("validator-1", AgentType::Validator),
        Arc::new(FallbackOnlyAgent {
            id: "validator-1".to_string(),
            fallback_verdict: validator_verdict(0.7, true),
        }),
    );
    register_fixed(&engine, AgentType::Dependency, "dependency-1", dependency_verdict(0.9));
    register_fixed(&engine, AgentType::Semantic, "semantic-1", semantic_verdict(0.9));
    register_fixed(&engine, AgentType::Impact, "impact-1", impact_verdict(0.9, "low"));
    register_fixed(&engine, AgentType::Mutation, "mutation-1", mutation_verdict(0.9));

    let result = engine.submit_proposal(update_proposal()).await.unwrap();

    assert_eq!(result.status, "awaiting_approval");
    assert_eq!(engine.metrics.pending_approvals.get(), 1);
}
