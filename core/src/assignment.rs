//! Auto-assignment of high-priority complaints to the least-busy agent.
//!
//! Load is recomputed from the complaint table on every call; nothing is
//! cached between intakes. Two concurrent high-priority intakes can read the
//! same loads and pick the same agent. That imbalance is transient and is
//! accepted: serializing all high-priority intake behind one lock would cost
//! more than the skew.

use crate::{
    directory::{Agent, AgentDirectory, Role},
    error::DeskResult,
    types::AgentId,
};
use serde::Serialize;

/// Priority at or above which intake tries to auto-assign.
pub const HIGH_PRIORITY_THRESHOLD: u8 = 4;

pub fn qualifies_for_auto_assignment(priority_score: u8) -> bool {
    priority_score >= HIGH_PRIORITY_THRESHOLD
}

/// An agent and the number of active (Pending/InProgress) complaints they hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentLoad {
    pub agent_id: AgentId,
    pub name: String,
    pub active: i64,
}

pub trait AgentLoadIndex {
    /// Active complaint count for each of `agents`, in the same order.
    fn active_loads(&self, org_id: &str, agents: &[Agent]) -> DeskResult<Vec<AgentLoad>>;
}

/// The entry with the strictly smallest load. Ties keep the earliest entry.
pub fn least_loaded(loads: &[AgentLoad]) -> Option<&AgentLoad> {
    loads.iter().fold(None, |best: Option<&AgentLoad>, candidate| match best {
        Some(current) if current.active <= candidate.active => Some(current),
        _ => Some(candidate),
    })
}

/// Pick an agent for a newly classified complaint, or `None` when the
/// priority is below threshold or the organization has no agents.
pub fn select_agent(
    org_id: &str,
    priority_score: u8,
    directory: &dyn AgentDirectory,
    load_index: &dyn AgentLoadIndex,
) -> DeskResult<Option<AgentLoad>> {
    if !qualifies_for_auto_assignment(priority_score) {
        return Ok(None);
    }

    let candidates = directory.find_agents_by_role(org_id, Role::Agent)?;
    if candidates.is_empty() {
        log::debug!("org={org_id} assignment: no agents available, leaving unassigned");
        return Ok(None);
    }

    let loads = load_index.active_loads(org_id, &candidates)?;
    log::debug!(
        "org={org_id} assignment: scanned {} agents, loads={:?}",
        loads.len(),
        loads.iter().map(|l| l.active).collect::<Vec<_>>()
    );
    Ok(least_loaded(&loads).cloned())
}
