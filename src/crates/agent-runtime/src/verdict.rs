//! Structured verdict types, one per agent type, plus the common envelope
//! every agent wraps its verdict in.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields every verdict carries regardless of agent type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictEnvelope {
    pub agent_id: String,
    pub confidence_score: f64,
    pub reasoning: String,
    /// Set when the primary (model-delegating) path failed and the
    /// deterministic fallback produced this verdict instead.
    #[serde(default)]
    pub fallback_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorVerdict {
    #[serde(flatten)]
    pub envelope: VerdictEnvelope,
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyVerdict {
    #[serde(flatten)]
    pub envelope: VerdictEnvelope,
    pub is_valid: bool,
    pub circular_dependencies: Vec<spec_graph::algorithms::CircularDependency>,
    pub resolution_suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationStep {
    pub step_id: String,
    pub operation: String,
    pub target: String,
    pub content: Value,
    pub dependencies: Vec<String>,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationPlan {
    pub plan_id: String,
    pub description: String,
    pub steps: Vec<MutationStep>,
    pub estimated_impact: String,
    pub rollback_plan: Vec<MutationStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationVerdict {
    #[serde(flatten)]
    pub envelope: VerdictEnvelope,
    pub success: bool,
    pub mutation_plan: Option<MutationPlan>,
    pub alternatives: Vec<MutationPlan>,
    pub feasibility_score: f64,
    pub complexity_score: f64,
    pub risk_factors: Vec<String>,
    pub prerequisites: Vec<String>,
    pub validation_criteria: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactVerdict {
    #[serde(flatten)]
    pub envelope: VerdictEnvelope,
    pub affected_node_ids: Vec<String>,
    pub impact_ratio: f64,
    pub severity: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticMatchResult {
    pub node_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticVerdict {
    #[serde(flatten)]
    pub envelope: VerdictEnvelope,
    pub matches: Vec<SemanticMatchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionStrategy {
    pub strategy_type: String,
    pub description: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictVerdict {
    #[serde(flatten)]
    pub envelope: VerdictEnvelope,
    pub conflict_type: String,
    pub auto_resolvable: bool,
    pub strategies: Vec<ResolutionStrategy>,
    pub recommended_strategy: Option<String>,
}

/// Any of the per-agent-type verdicts, for callers (the orchestrator's
/// aggregation step) that need to hold a task's result without knowing its
/// concrete agent type ahead of time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "verdict_type", rename_all = "snake_case")]
pub enum Verdict {
    Validator(ValidatorVerdict),
    Dependency(DependencyVerdict),
    Mutation(MutationVerdict),
    Impact(ImpactVerdict),
    Semantic(SemanticVerdict),
    Conflict(ConflictVerdict),
}

impl Verdict {
    pub fn envelope(&self) -> &VerdictEnvelope {
        match self {
            Verdict::Validator(v) => &v.envelope,
            Verdict::Dependency(v) => &v.envelope,
            Verdict::Mutation(v) => &v.envelope,
            Verdict::Impact(v) => &v.envelope,
            Verdict::Semantic(v) => &v.envelope,
            Verdict::Conflict(v) => &v.envelope,
        }
    }

    pub fn confidence_score(&self) -> f64 {
        self.envelope().confidence_score
    }

    pub fn is_fallback(&self) -> bool {
        self.envelope().fallback_mode
    }

    /// Whether this verdict, on its own, blocks auto-apply: an invalid
    /// validator verdict or a critical circular dependency.
    pub fn blocks_auto_apply(&self) -> bool {
        match self {
            Verdict::Validator(v) => !v.is_valid,
            Verdict::Dependency(v) => {
                !v.is_valid
                    || v.circular_dependencies
                        .iter()
                        .any(|c| c.severity == "high")
            }
            _ => false,
        }
    }
}
