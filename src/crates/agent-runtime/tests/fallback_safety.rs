//! Every agent must produce a valid verdict when no model client is
//! configured, and mark that verdict as `fallback_mode: true`.

use agent_runtime::agents::{
    ConflictAgent, DependencyAgent, ImpactAgent, MutationAgent, SemanticAgent, ValidatorAgent,
};
use agent_runtime::{Agent, AgentTask, Verdict};
use serde_json::json;
use spec_graph::{Edge, EdgeKind, GraphSnapshot, Node, NodeKind};

fn snapshot() -> GraphSnapshot {
    let nodes = vec![
        Node::new("a", NodeKind::Module, "a"),
        Node::new("b", NodeKind::Module, "b"),
    ];
    let edges = vec![Edge::new("e1", "a", "b", EdgeKind::DependsOn)];
    GraphSnapshot { nodes, edges }
}

#[tokio::test]
async fn validator_falls_back_without_a_model_client() {
    let agent = ValidatorAgent::new("validator-1", None);
    let task = AgentTask::new(
        "t1",
        "p1",
        "validator-1",
        "validate_spec",
        json!({ "content": "no structure here" }),
    );
    let verdict = agent.execute(&task).await.unwrap();
    assert!(verdict.is_fallback());
    assert!(matches!(verdict, Verdict::Validator(_)));
}

#[tokio::test]
async fn dependency_agent_falls_back_without_a_model_client() {
    let agent = DependencyAgent::new("dependency-1", None);
    let task = AgentTask::new(
        "t1",
        "p1",
        "dependency-1",
        "analyze_dependencies",
        json!({ "snapshot": snapshot() }),
    );
    let verdict = agent.execute(&task).await.unwrap();
    assert!(verdict.is_fallback());
}

#[tokio::test]
async fn mutation_agent_falls_back_without_a_model_client() {
    let agent = MutationAgent::new("mutation-1", None);
    let task = AgentTask::new(
        "t1",
        "p1",
        "mutation-1",
        "generate_mutation",
        json!({ "change_request": { "type": "modify", "target": "a" } }),
    );
    let verdict = agent.execute(&task).await.unwrap();
    assert!(verdict.is_fallback());
}

#[tokio::test]
async fn impact_agent_falls_back_without_a_model_client() {
    let agent = ImpactAgent::new("impact-1", None);
    let task = AgentTask::new(
        "t1",
        "p1",
        "impact-1",
        "analyze_change_impact",
        json!({ "snapshot": snapshot(), "changed_node_id": "b" }),
    );
    let verdict = agent.execute(&task).await.unwrap();
    assert!(verdict.is_fallback());
}

#[tokio::test]
async fn semantic_agent_falls_back_without_a_model_client() {
    let agent = SemanticAgent::new("semantic-1", None);
    let task = AgentTask::new(
        "t1",
        "p1",
        "semantic-1",
        "semantic_search",
        json!({ "snapshot": snapshot(), "query": "a" }),
    );
    let verdict = agent.execute(&task).await.unwrap();
    assert!(verdict.is_fallback());
}

#[tokio::test]
async fn conflict_agent_falls_back_without_a_model_client() {
    let agent = ConflictAgent::new("conflict-1", None);
    let task = AgentTask::new(
        "t1",
        "p1",
        "conflict-1",
        "detect_conflicts",
        json!({
            "base_version": { "name": "a" },
            "local_changes": { "name": "a2" },
            "remote_changes": { "name": "a3" },
        }),
    );
    let verdict = agent.execute(&task).await.unwrap();
    assert!(verdict.is_fallback());
}

#[tokio::test]
async fn unsupported_operation_is_rejected_even_by_fallback() {
    let agent = ValidatorAgent::new("validator-1", None);
    let task = AgentTask::new("t1", "p1", "validator-1", "not_a_real_operation", json!({}));
    let err = agent.execute(&task).await.unwrap_err();
    assert!(matches!(err, agent_runtime::AgentError::UnsupportedOperation { .. }));
}
