//! Append-only proposal lifecycle ledger (spec §4.6).
//!
//! Only the component currently owning a proposal may transition it; the
//! store is the single source of truth for "who owns what state" so the
//! SQL/REST layer (out of scope here) can't silently diverge from it, per
//! the "treat the ledger as authoritative" decision in the design notes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;

use crate::{MutationProposal, OrchestratorError, ProposalState, Result};

/// One entry in a proposal's transition history.
#[derive(Debug, Clone)]
pub struct Transition {
    pub from: ProposalState,
    pub to: ProposalState,
    pub payload: Value,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Record {
    proposal: MutationProposal,
    state: ProposalState,
    history: Vec<Transition>,
}

/// Filters for [`MutationStore::list`].
#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    pub state: Option<ProposalState>,
    pub spec_id: Option<String>,
}

/// Lifecycle ledger for mutation proposals. The in-memory implementation
/// serializes transitions per proposal with a per-entry lock, mirroring the
/// graph repository's per-node write serialization (spec §5).
pub struct MutationStore {
    records: DashMap<String, Mutex<Record>>,
}

impl Default for MutationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Register a freshly-submitted proposal in the `proposed` state.
    pub fn insert(&self, proposal: MutationProposal) -> Result<()> {
        if self.records.contains_key(&proposal.proposal_id) {
            return Err(OrchestratorError::Conflict(format!(
                "proposal {} already exists",
                proposal.proposal_id
            )));
        }
        let id = proposal.proposal_id.clone();
        self.records.insert(
            id,
            Mutex::new(Record {
                proposal,
                state: ProposalState::Proposed,
                history: Vec::new(),
            }),
        );
        Ok(())
    }

    pub fn get(&self, proposal_id: &str) -> Option<(MutationProposal, ProposalState)> {
        self.records
            .get(proposal_id)
            .map(|entry| {
                let record = entry.lock();
                (record.proposal.clone(), record.state)
            })
    }

    pub fn list(&self, filters: &ListFilters) -> Vec<(MutationProposal, ProposalState)> {
        self.records
            .iter()
            .filter_map(|entry| {
                let record = entry.lock();
                if let Some(state) = filters.state {
                    if record.state != state {
                        return None;
                    }
                }
                if let Some(spec_id) = &filters.spec_id {
                    if &record.proposal.spec_id != spec_id {
                        return None;
                    }
                }
                Some((record.proposal.clone(), record.state))
            })
            .collect()
    }

    /// Transition a proposal from `from` to `to`, failing with
    /// [`OrchestratorError::Conflict`] if `from` does not match the current
    /// state (a concurrent writer already moved it) or if the transition
    /// isn't in [`ProposalState::allowed_transitions`].
    pub fn transition(
        &self,
        proposal_id: &str,
        from: ProposalState,
        to: ProposalState,
        payload: Value,
    ) -> Result<()> {
        let entry = self.records.get(proposal_id).ok_or_else(|| {
            OrchestratorError::Conflict(format!("unknown proposal {proposal_id}"))
        })?;
        let mut record = entry.lock();

        if record.state != from {
            return Err(OrchestratorError::Conflict(format!(
                "proposal {proposal_id} is in state {} but caller expected {}",
                record.state, from
            )));
        }
        if !from.can_transition_to(to) {
            return Err(OrchestratorError::Conflict(format!(
                "illegal transition for proposal {proposal_id}: {from} -> {to}"
            )));
        }

        record.history.push(Transition {
            from,
            to,
            payload,
            at: Utc::now(),
        });
        record.state = to;
        Ok(())
    }

    pub fn history(&self, proposal_id: &str) -> Vec<Transition> {
        self.records
            .get(proposal_id)
            .map(|entry| entry.lock().history.clone())
            .unwrap_or_default()
    }

    /// Snapshot of every proposal's current state, for operator visibility.
    pub fn state_counts(&self) -> HashMap<ProposalState, usize> {
        let mut counts = HashMap::new();
        for entry in self.records.iter() {
            *counts.entry(entry.lock().state).or_insert(0) += 1;
        }
        counts
    }
}
