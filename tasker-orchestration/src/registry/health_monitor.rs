//! Periodic health evaluator (spec §4.2).
//!
//! Runs on a fixed tick, detecting stale agents, stuck tasks, and retryable
//! failures, then applying the one fixed recovery policy for each. This is
//! the only component permitted to force-fail another agent's task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use tasker_shared::store::TaskStoreContract;
use tasker_shared::types::AgentStatus;
use tasker_shared::TaskerResult;

use super::AgentRegistry;
use crate::orchestrator::WorkerFactory;

const MAX_RESPAWN_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_secs(10);
const MAX_RETRIES: u32 = 3;

/// Tracks respawn backoff state per agent so repeated stale detections
/// escalate the wait instead of hammering a dead process.
#[derive(Debug, Default)]
struct RespawnState {
    attempts: u32,
}

pub struct HealthMonitor {
    registry: Arc<AgentRegistry>,
    store: Arc<dyn TaskStoreContract>,
    stale_threshold: chrono::Duration,
    stuck_threshold: chrono::Duration,
    tick_interval: Duration,
    respawn_state: Mutex<HashMap<Uuid, RespawnState>>,
    worker_factory: Option<Arc<dyn WorkerFactory>>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<AgentRegistry>,
        store: Arc<dyn TaskStoreContract>,
        stale_threshold: chrono::Duration,
        stuck_threshold: chrono::Duration,
        tick_interval: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            stale_threshold,
            stuck_threshold,
            tick_interval,
            respawn_state: Mutex::new(HashMap::new()),
            worker_factory: None,
        }
    }

    /// Gives the monitor a way to actually bring up a replacement agent
    /// for one it declares stale (spec §4.2 "attempt respawn"), rather
    /// than only recording backoff state. Without a factory, recovery is
    /// limited to marking the agent offline, requeuing its task, and
    /// counting the attempt - no new worker is created.
    pub fn with_worker_factory(mut self, factory: Arc<dyn WorkerFactory>) -> Self {
        self.worker_factory = Some(factory);
        self
    }

    /// Spawn the periodic tick loop. The returned handle can be aborted on
    /// shutdown.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.tick_interval);
            loop {
                interval.tick().await;
                if let Err(err) = self.run_once().await {
                    warn!(error = %err, "health monitor tick failed");
                }
            }
        })
    }

    /// One evaluation pass: detect_stale, detect_stuck, detect_retryable,
    /// then apply the fixed recovery policy to each (spec §4.2).
    pub async fn run_once(&self) -> TaskerResult<()> {
        for agent in self.registry.detect_stale(self.stale_threshold) {
            self.recover_stale_agent(agent.id).await?;
        }

        for task in self.store.tasks_in_progress_older_than(self.stuck_threshold).await? {
            warn!(task_id = %task.id, "stuck task detected, failing and requeuing");
            self.store
                .force_fail_and_requeue(task.id, "stuck: exceeded stuck_threshold_seconds".into())
                .await?;
            self.store.retry(task.id).await?;
        }

        for task in self.store.retryable_failed_tasks(MAX_RETRIES).await? {
            info!(task_id = %task.id, retry_count = task.retry_count, "retrying failed task");
            self.store.retry(task.id).await?;
        }

        Ok(())
    }

    async fn recover_stale_agent(&self, agent_id: Uuid) -> TaskerResult<()> {
        warn!(agent_id = %agent_id, "stale heartbeat, marking agent offline");
        self.registry.update_status(agent_id, AgentStatus::Offline)?;

        let agent_type = self.registry.get(agent_id).map(|agent| agent.agent_type);

        if let Some(agent) = self.registry.get(agent_id) {
            if let Some(task_id) = agent.current_task {
                self.store
                    .force_fail_and_requeue(task_id, "owning agent went offline (stale heartbeat)".into())
                    .await?;
                self.store.retry(task_id).await?;
            }
        }

        let mut states = self.respawn_state.lock().await;
        let state = states.entry(agent_id).or_default();
        if state.attempts >= MAX_RESPAWN_ATTEMPTS {
            warn!(agent_id = %agent_id, attempts = state.attempts, "respawn attempts exhausted");
            return Ok(());
        }

        let backoff = BASE_BACKOFF * 2u32.pow(state.attempts);
        state.attempts += 1;
        let attempt = state.attempts;
        drop(states);

        self.registry.increment_restart_count(agent_id)?;

        match (&self.worker_factory, agent_type) {
            (Some(factory), Some(agent_type)) => {
                info!(agent_id = %agent_id, attempt, backoff_secs = backoff.as_secs(), "respawning replacement agent after backoff");
                let factory = factory.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(backoff).await;
                    let new_id = factory.spawn(agent_type);
                    info!(old_agent_id = %agent_id, new_agent_id = %new_id, attempt, "replacement agent spawned");
                });
            }
            _ => {
                info!(
                    agent_id = %agent_id,
                    attempt,
                    backoff_secs = backoff.as_secs(),
                    "no worker factory configured, recording backoff only"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tasker_shared::store::InMemoryTaskStore;
    use tasker_shared::types::{AgentType, Task, TaskStatus};

    fn monitor() -> (Arc<AgentRegistry>, Arc<InMemoryTaskStore>, HealthMonitor) {
        let registry = Arc::new(AgentRegistry::new());
        let store = Arc::new(InMemoryTaskStore::new());
        let monitor = HealthMonitor::new(
            registry.clone(),
            store.clone(),
            chrono::Duration::seconds(60),
            chrono::Duration::seconds(300),
            Duration::from_secs(10),
        );
        (registry, store, monitor)
    }

    #[tokio::test]
    async fn stuck_task_is_failed_and_requeued() {
        let (_registry, store, monitor) = monitor();
        let mut task = Task::new("stuck", "d");
        task.status = TaskStatus::InProgress;
        task.progress_percent = 40;
        task.claimed_at = Some(chrono::Utc::now() - chrono::Duration::seconds(600));
        let task_id = task.id;
        store.create_task(task).await.unwrap();

        monitor.run_once().await.unwrap();

        let reloaded = store.get_task(task_id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Pending);
        assert_eq!(reloaded.retry_count, 1);
    }

    #[tokio::test]
    async fn retryable_failed_task_resets_to_pending() {
        let (_registry, store, monitor) = monitor();
        let mut task = Task::new("failed", "d");
        task.status = TaskStatus::Failed;
        let task_id = task.id;
        store.create_task(task).await.unwrap();

        monitor.run_once().await.unwrap();

        let reloaded = store.get_task(task_id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Pending);
        assert_eq!(reloaded.retry_count, 1);
    }

    #[tokio::test]
    async fn recover_stale_agent_marks_offline_and_requeues_current_task() {
        let (registry, store, monitor) = monitor();
        let id = registry.register(AgentType::Research, HashSet::new());

        let mut task = Task::new("owned", "d");
        task.status = TaskStatus::InProgress;
        task.assigned_agent = Some(id);
        let task_id = task.id;
        store.create_task(task).await.unwrap();
        registry.set_current_task(id, Some(task_id)).unwrap();

        monitor.recover_stale_agent(id).await.unwrap();

        let agent = registry.get(id).unwrap();
        assert_eq!(agent.status, AgentStatus::Offline);
        assert_eq!(agent.restart_count, 1);

        let reloaded = store.get_task(task_id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Pending);
    }
}
