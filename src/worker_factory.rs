//! Illustrative `WorkerFactory` (spec §4.5 step 4c): wires an
//! `EchoWorker`-backed `SpecialistWorker` per agent type into the shared
//! `AgentRegistry` the orchestrator already holds, so "find-or-spawn an
//! idle agent of that type" produces an agent that actually polls and
//! claims its own work (spec §4.4) instead of a registry-only
//! placeholder the orchestrator could never run.
//!
//! Per-specialist domain logic is explicitly out of scope for the kernel
//! (spec §1); a real deployment swaps `EchoWorker` here for its own
//! `TaskExecutor` implementations without touching the orchestrator.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tasker_orchestration::{capability_hint_for_agent_type, AgentRegistry, WorkerFactory};
use tasker_shared::store::TaskStoreContract;
use tasker_shared::types::AgentType;
use tasker_worker::{EchoWorker, SpecialistWorker, WorkerConfig};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct EchoWorkerFactory {
    registry: Arc<AgentRegistry>,
    store: Arc<dyn TaskStoreContract>,
    poll_interval: Duration,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl EchoWorkerFactory {
    pub fn new(registry: Arc<AgentRegistry>, store: Arc<dyn TaskStoreContract>, poll_interval: Duration) -> Self {
        Self { registry, store, poll_interval, handles: Mutex::new(Vec::new()) }
    }

    /// Aborts every worker this factory has spawned so far.
    pub fn shutdown(&self) {
        for handle in self.handles.lock().unwrap().drain(..) {
            handle.abort();
        }
    }
}

impl WorkerFactory for EchoWorkerFactory {
    fn spawn(&self, agent_type: AgentType) -> Uuid {
        let capability = format!("capability:{}", capability_hint_for_agent_type(agent_type));
        let capabilities = HashSet::from([capability]);
        let worker = Arc::new(SpecialistWorker::new(
            agent_type,
            EchoWorker::new(capabilities.clone()),
            self.store.clone(),
            WorkerConfig { poll_interval: self.poll_interval, ..WorkerConfig::default() },
        ));
        let id = worker.id();
        self.registry.register_existing(id, agent_type, capabilities);
        let (poll_handle, _heartbeat_handle) = worker.spawn();
        self.handles.lock().unwrap().push(poll_handle);
        id
    }
}
