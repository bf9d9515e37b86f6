//! Prometheus metrics for the mutation engine (spec §10), grounded on the
//! registry/streaming crates' metrics modules: explicit registry, no global
//! statics, constructed once and threaded through [`crate::engine::Engine`].

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// Metrics surfaced by the engine: pending-approval and connection gauges,
/// plus mutation/agent-task counters (spec §8 scenarios reference these by
/// name).
#[derive(Clone)]
pub struct EngineMetrics {
    pub registry: Registry,

    /// Proposals currently awaiting human approval.
    pub pending_approvals: IntGauge,
    /// Live channel sessions currently open.
    pub active_connections: IntGauge,

    pub mutations_proposed_total: IntCounter,
    pub mutations_completed_total: IntCounter,
    pub mutations_failed_total: IntCounter,

    /// Agent task outcomes by agent type and result (succeeded/failed/timed_out).
    pub agent_tasks_total: IntCounterVec,
}

impl EngineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let pending_approvals = IntGauge::new(
            "mutation_engine_pending_approvals",
            "Proposals currently awaiting human approval",
        )?;
        let active_connections = IntGauge::new(
            "mutation_engine_active_connections",
            "Live channel sessions currently open",
        )?;
        let mutations_proposed_total = IntCounter::new(
            "mutation_engine_mutations_proposed_total",
            "Mutation proposals submitted",
        )?;
        let mutations_completed_total = IntCounter::new(
            "mutation_engine_mutations_completed_total",
            "Mutation proposals applied successfully",
        )?;
        let mutations_failed_total = IntCounter::new(
            "mutation_engine_mutations_failed_total",
            "Mutation proposals that ended in failure",
        )?;
        let agent_tasks_total = IntCounterVec::new(
            Opts::new("mutation_engine_agent_tasks_total", "Agent task outcomes"),
            &["agent_type", "outcome"],
        )?;

        registry.register(Box::new(pending_approvals.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;
        registry.register(Box::new(mutations_proposed_total.clone()))?;
        registry.register(Box::new(mutations_completed_total.clone()))?;
        registry.register(Box::new(mutations_failed_total.clone()))?;
        registry.register(Box::new(agent_tasks_total.clone()))?;

        Ok(Self {
            registry,
            pending_approvals,
            active_connections,
            mutations_proposed_total,
            mutations_completed_total,
            mutations_failed_total,
            agent_tasks_total,
        })
    }

    pub fn record_agent_task(&self, agent_type: &str, outcome: &str) {
        self.agent_tasks_total
            .with_label_values(&[agent_type, outcome])
            .inc();
    }

    /// Render the registry as Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        use prometheus::{Encoder, TextEncoder};
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
