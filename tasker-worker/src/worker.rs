//! The generic poll -> claim -> execute -> report loop (spec §4.4).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use tasker_shared::messaging::MessageBus;
use tasker_shared::store::TaskStoreContract;
use tasker_shared::types::{Agent, AgentMetrics, AgentStatus, AgentType, Message, MessageKind, Task};
use tasker_shared::TaskerResult;

/// Plugged-in domain behavior for a concrete agent type. The loop around
/// this is identical for every specialist; only `execute` varies (spec
/// §4.4 "concrete per-type behavior is a plug-in").
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Tags this executor can claim work for (spec §3 "capability:X").
    fn capabilities(&self) -> HashSet<String>;

    /// Runs `task` to completion or returns an error describing why it
    /// failed. The loop interprets `Ok` as success and `Err` as failure -
    /// neither retries nor backs off, that's the health monitor's job.
    async fn execute(&self, task: &Task) -> TaskerResult<()>;
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    /// Upper bound on tasks claimed per poll tick.
    pub batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(30),
            batch_size: 1,
        }
    }
}

/// Drives one `TaskExecutor` through the claim loop and keeps its own
/// rolling `AgentMetrics` up to date as tasks finish (spec §4.4 step 6).
pub struct SpecialistWorker<E: TaskExecutor> {
    id: Uuid,
    agent: Mutex<Agent>,
    executor: E,
    store: Arc<dyn TaskStoreContract>,
    bus: Option<Arc<MessageBus>>,
    config: WorkerConfig,
}

impl<E: TaskExecutor> SpecialistWorker<E> {
    pub fn new(agent_type: AgentType, executor: E, store: Arc<dyn TaskStoreContract>, config: WorkerConfig) -> Self {
        let agent = Agent::new(agent_type, executor.capabilities());
        let id = agent.id;
        Self { id, agent: Mutex::new(agent), executor, store, bus: None, config }
    }

    pub fn with_bus(mut self, bus: Arc<MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// This worker's agent id, fixed at construction - available
    /// synchronously (unlike `agent_id`) so a `WorkerFactory` can record
    /// it in a registry right after spawning, without awaiting the
    /// worker's own state lock.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn agent_id(&self) -> Uuid {
        self.agent.lock().await.id
    }

    pub async fn metrics(&self) -> AgentMetrics {
        self.agent.lock().await.metrics.clone()
    }

    /// Runs the claim loop until cancelled. Returns the spawned heartbeat
    /// handle alongside the poll loop's own handle so a caller can abort
    /// both together.
    pub fn spawn(self: Arc<Self>) -> (JoinHandle<()>, Option<JoinHandle<()>>) {
        let heartbeat_handle = self.bus.clone().map(|_| {
            let worker = self.clone();
            tokio::spawn(async move { worker.heartbeat_loop().await })
        });

        let poll_handle = {
            let worker = self.clone();
            tokio::spawn(async move { worker.poll_loop().await })
        };

        (poll_handle, heartbeat_handle)
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        let Some(bus) = self.bus.clone() else { return };
        let mut interval = tokio::time::interval(self.config.heartbeat_interval);
        loop {
            interval.tick().await;
            let mut agent = self.agent.lock().await;
            agent.heartbeat();
            let message = Message::new(agent.id.to_string(), "registry".to_string(), MessageKind::Heartbeat)
                .with_payload(std::collections::HashMap::from([(
                    "agent_id".to_string(),
                    serde_json::json!(agent.id),
                )]));
            drop(agent);
            if let Err(err) = bus.publish(message).await {
                warn!(error = %err, "failed to publish heartbeat");
            }
        }
    }

    async fn poll_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        loop {
            interval.tick().await;
            if let Err(err) = self.poll_once().await {
                warn!(error = %err, "worker poll tick failed");
            }
        }
    }

    /// One claim-execute-report cycle, exposed separately from
    /// `poll_loop` so tests can drive it deterministically instead of
    /// racing a timer.
    pub async fn poll_once(&self) -> TaskerResult<()> {
        let capabilities = self.executor.capabilities();
        let candidates = self.store.get_available_tasks(&capabilities, self.config.batch_size).await?;

        for task in candidates {
            let agent_id = self.agent_id().await;
            let Some(claimed) = self.store.claim(agent_id, task.id).await? else {
                continue;
            };
            self.set_busy(claimed.id).await;
            self.run_one(claimed).await?;
            self.set_idle().await;
        }
        Ok(())
    }

    async fn run_one(&self, task: Task) -> TaskerResult<()> {
        let started = std::time::Instant::now();
        let agent_id = self.agent_id().await;
        let result = self.executor.execute(&task).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(()) => {
                self.store.complete(agent_id, task.id).await?;
                self.record_decision(latency_ms, true, 1.0).await;
                info!(task_id = %task.id, agent_id = %agent_id, "task completed");
            }
            Err(err) => {
                self.store.fail(agent_id, task.id, err.to_string()).await?;
                self.record_decision(latency_ms, false, 0.0).await;
                warn!(task_id = %task.id, agent_id = %agent_id, error = %err, "task failed");
            }
        }
        Ok(())
    }

    async fn record_decision(&self, latency_ms: f64, succeeded: bool, confidence: f64) {
        self.agent.lock().await.metrics.record_decision(latency_ms, succeeded, confidence);
    }

    async fn set_busy(&self, task_id: Uuid) {
        let mut agent = self.agent.lock().await;
        agent.status = AgentStatus::Busy;
        agent.current_task = Some(task_id);
    }

    async fn set_idle(&self) {
        let mut agent = self.agent.lock().await;
        agent.status = AgentStatus::Idle;
        agent.current_task = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasker_shared::store::InMemoryTaskStore;

    struct AlwaysSucceeds;

    #[async_trait]
    impl TaskExecutor for AlwaysSucceeds {
        fn capabilities(&self) -> HashSet<String> {
            HashSet::from(["capability:executor".to_string()])
        }

        async fn execute(&self, _task: &Task) -> TaskerResult<()> {
            Ok(())
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl TaskExecutor for AlwaysFails {
        fn capabilities(&self) -> HashSet<String> {
            HashSet::from(["capability:executor".to_string()])
        }

        async fn execute(&self, _task: &Task) -> TaskerResult<()> {
            Err(tasker_shared::TaskerError::FatalTask { task_id: Uuid::nil(), reason: "boom".to_string() })
        }
    }

    fn task_needing_executor() -> Task {
        let mut task = Task::new("t", "d");
        task.tags.insert("capability:executor".to_string());
        task
    }

    #[tokio::test]
    async fn claims_executes_and_completes_a_matching_task() {
        let store = Arc::new(InMemoryTaskStore::new());
        store.create_task(task_needing_executor()).await.unwrap();

        let worker =
            SpecialistWorker::new(AgentType::Executor, AlwaysSucceeds, store.clone(), WorkerConfig::default());
        worker.poll_once().await.unwrap();

        let metrics = worker.metrics().await;
        assert_eq!(metrics.decisions_made, 1);
        assert_eq!(metrics.successes, 1);
    }

    #[tokio::test]
    async fn a_failing_executor_fails_the_task_and_records_an_error() {
        let store = Arc::new(InMemoryTaskStore::new());
        let created = store.create_task(task_needing_executor()).await.unwrap();

        let worker = SpecialistWorker::new(AgentType::Executor, AlwaysFails, store.clone(), WorkerConfig::default());
        worker.poll_once().await.unwrap();

        let metrics = worker.metrics().await;
        assert_eq!(metrics.errors, 1);
        let task = store.get_task(created.id).await.unwrap().unwrap();
        assert_eq!(task.status, tasker_shared::types::TaskStatus::Failed);
    }

    #[tokio::test]
    async fn agent_returns_to_idle_after_finishing_a_task() {
        let store = Arc::new(InMemoryTaskStore::new());
        store.create_task(task_needing_executor()).await.unwrap();

        let worker =
            SpecialistWorker::new(AgentType::Executor, AlwaysSucceeds, store.clone(), WorkerConfig::default());
        worker.poll_once().await.unwrap();

        let agent = worker.agent.lock().await;
        assert_eq!(agent.status, AgentStatus::Idle);
        assert_eq!(agent.current_task, None);
    }
}
