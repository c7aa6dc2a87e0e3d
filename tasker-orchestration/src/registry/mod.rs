//! Agent Registry & Health Monitor (spec §4.2).
//!
//! The registry tracks every spawned worker; the monitor is the only
//! component permitted to mutate agent liveness or unclaim another agent's
//! task (spec §4.2). Split the way the teacher splits a passive data holder
//! from the active periodic evaluator in `health/db_status.rs`.

pub mod health_monitor;

use std::collections::HashSet;

use dashmap::DashMap;
use tasker_shared::types::{Agent, AgentStatus, AgentType};
use tasker_shared::TaskerResult;
use uuid::Uuid;

pub use health_monitor::HealthMonitor;

#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: DashMap<Uuid, Agent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, agent_type: AgentType, capabilities: HashSet<String>) -> Uuid {
        let agent = Agent::new(agent_type, capabilities);
        let id = agent.id;
        self.agents.insert(id, agent);
        tracing::info!(agent_id = %id, agent_type = %agent_type, "agent registered");
        id
    }

    /// Registers an agent under an id chosen by the caller rather than
    /// minting a fresh one, so a `WorkerFactory` can record the id of a
    /// `SpecialistWorker` it actually spawned and is actually able to run
    /// (spec §4.2 "register" - same bookkeeping, caller-supplied identity).
    pub fn register_existing(&self, id: Uuid, agent_type: AgentType, capabilities: HashSet<String>) {
        let mut agent = Agent::new(agent_type, capabilities);
        agent.id = id;
        self.agents.insert(id, agent);
        tracing::info!(agent_id = %id, agent_type = %agent_type, "agent registered");
    }

    pub fn heartbeat(&self, id: Uuid) -> TaskerResult<()> {
        let mut entry = self.agents.get_mut(&id).ok_or_else(|| not_registered(id))?;
        entry.heartbeat();
        Ok(())
    }

    pub fn update_status(&self, id: Uuid, status: AgentStatus) -> TaskerResult<()> {
        let mut entry = self.agents.get_mut(&id).ok_or_else(|| not_registered(id))?;
        entry.status = status;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<Agent> {
        self.agents.get(&id).map(|a| a.value().clone())
    }

    pub fn all(&self) -> Vec<Agent> {
        self.agents.iter().map(|e| e.value().clone()).collect()
    }

    /// Workers whose last heartbeat predates `threshold` and whose status
    /// is not already offline (spec §4.2 `detect_stale`).
    pub fn detect_stale(&self, threshold: chrono::Duration) -> Vec<Agent> {
        self.agents
            .iter()
            .filter(|e| e.value().is_stale(threshold))
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn record_decision(
        &self,
        id: Uuid,
        latency_ms: f64,
        succeeded: bool,
        confidence: f64,
    ) -> TaskerResult<()> {
        let mut entry = self.agents.get_mut(&id).ok_or_else(|| not_registered(id))?;
        entry.metrics.record_decision(latency_ms, succeeded, confidence);
        Ok(())
    }

    pub fn set_current_task(&self, id: Uuid, task_id: Option<Uuid>) -> TaskerResult<()> {
        let mut entry = self.agents.get_mut(&id).ok_or_else(|| not_registered(id))?;
        entry.current_task = task_id;
        Ok(())
    }

    pub fn increment_restart_count(&self, id: Uuid) -> TaskerResult<u32> {
        let mut entry = self.agents.get_mut(&id).ok_or_else(|| not_registered(id))?;
        entry.restart_count += 1;
        Ok(entry.restart_count)
    }
}

fn not_registered(id: Uuid) -> tasker_shared::TaskerError {
    tasker_shared::TaskerError::AgentDead {
        agent_id: id.to_string(),
        reason: "not registered".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_heartbeat_roundtrip() {
        let registry = AgentRegistry::new();
        let id = registry.register(AgentType::Research, HashSet::new());
        assert!(registry.heartbeat(id).is_ok());
        let agent = registry.get(id).unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
    }

    #[test]
    fn detect_stale_excludes_offline_agents() {
        let registry = AgentRegistry::new();
        let id = registry.register(AgentType::Research, HashSet::new());
        registry.update_status(id, AgentStatus::Offline).unwrap();
        let stale = registry.detect_stale(chrono::Duration::seconds(-1));
        assert!(stale.is_empty());
    }
}
