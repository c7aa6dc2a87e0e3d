//! Orchestrator (spec §4.5): the top-level driver tying the Planner,
//! Agent Registry, Health Monitor, and Task Store Contract together.
//!
//! `orchestrate` decomposes a parent task, materializes its plan steps as
//! claimable subtasks, then runs an assign-work loop bounded by
//! `max_concurrent_agents` until every subtask reaches a terminal state or
//! any one of them fails outright - matching the upstream orchestrator's
//! fail-fast completion check rather than waiting out every last subtask
//! once one has already gone wrong.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use tasker_shared::store::TaskStoreContract;
use tasker_shared::types::{AgentType, Task, TaskPriority, TaskStatus};
use tasker_shared::TaskerResult;

use crate::bridge::{MemoryOffload, OrchestrationSnapshot};
use crate::planner::{required_agent_type_hint, CorePlanner};
use crate::registry::{AgentRegistry, HealthMonitor};

const PROGRESS_TICK: Duration = Duration::from_secs(5);

/// Brings a genuinely executing agent online for `agent_type` when the
/// orchestrator has no registered agent of that type to route new work
/// to (spec §4.5 step 4c, "find-or-spawn an idle agent of that type").
///
/// The orchestrator never claims tasks on a spawned agent's behalf - only
/// the agent's own poll-claim-execute loop does that (spec §4.4) - so a
/// `WorkerFactory` implementation must register the agent it spawns
/// (e.g. via `AgentRegistry::register_existing`) under the id it returns,
/// and that agent must actually run its own claim loop against the same
/// task store the orchestrator uses. Without a configured factory, the
/// orchestrator relies entirely on an externally-supplied pool of
/// already-running workers to pick up the work it decomposes.
pub trait WorkerFactory: Send + Sync {
    fn spawn(&self, agent_type: AgentType) -> Uuid;
}

#[derive(Debug, Clone)]
pub struct OrchestrationReport {
    pub parent_task_id: Uuid,
    pub subtasks: Vec<Task>,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl OrchestrationReport {
    pub fn succeeded(&self) -> bool {
        self.failed == 0 && self.completed == self.total
    }
}

pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    store: Arc<dyn TaskStoreContract>,
    health_monitor: Arc<HealthMonitor>,
    planner: CorePlanner,
    memory_offload: Option<Arc<dyn MemoryOffload>>,
    worker_factory: Option<Arc<dyn WorkerFactory>>,
    poll_interval: Duration,
    context_token_limit: u64,
    context_tokens_used: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<AgentRegistry>,
        store: Arc<dyn TaskStoreContract>,
        health_monitor: Arc<HealthMonitor>,
        poll_interval: Duration,
        context_token_limit: u64,
    ) -> Self {
        Self {
            registry,
            store,
            health_monitor,
            planner: CorePlanner::new(),
            memory_offload: None,
            worker_factory: None,
            poll_interval,
            context_token_limit,
            context_tokens_used: AtomicU64::new(0),
        }
    }

    pub fn with_memory_offload(mut self, offload: Arc<dyn MemoryOffload>) -> Self {
        self.memory_offload = Some(offload);
        self
    }

    pub fn with_worker_factory(mut self, factory: Arc<dyn WorkerFactory>) -> Self {
        self.worker_factory = Some(factory);
        self
    }

    /// Accumulates an estimate of context tokens spent on this
    /// orchestration run; the progress loop checkpoints once this crosses
    /// 80% of `context_token_limit` (spec §4.10).
    pub fn record_context_tokens(&self, tokens: u64) {
        self.context_tokens_used.fetch_add(tokens, AtomicOrdering::Relaxed);
    }

    pub async fn orchestrate(&self, parent_task: Task, max_concurrent_agents: usize) -> TaskerResult<OrchestrationReport> {
        let plan = self.planner.decompose(&parent_task);
        info!(parent_task_id = %parent_task.id, steps = plan.steps.len(), "decomposed parent task");

        let mut step_to_task: std::collections::HashMap<Uuid, Uuid> = std::collections::HashMap::new();
        let mut subtask_ids = Vec::with_capacity(plan.steps.len());

        for step in &plan.steps {
            let mut subtask = Task::new(step.description.clone(), step.description.clone());
            subtask.parent = Some(parent_task.id);
            subtask.priority = parent_task.priority;
            subtask.estimated_effort_minutes = Some(step.estimated_duration_minutes as u32);
            subtask.deadline = parent_task.deadline;
            let hint = required_agent_type_hint(&step.description);
            subtask.tags.insert(format!("capability:{hint}"));
            for dep_step_id in &step.dependencies {
                if let Some(dep_task_id) = step_to_task.get(dep_step_id) {
                    subtask.dependencies.push(*dep_task_id);
                }
            }
            let created = self.store.create_task(subtask).await?;
            step_to_task.insert(step.id, created.id);
            subtask_ids.push(created.id);
        }

        let health_handle = self.health_monitor.clone().spawn();
        let progress_handle = self.spawn_progress_loop(parent_task.id, subtask_ids.clone());

        let report = self.run_until_complete(parent_task.id, subtask_ids, max_concurrent_agents).await;

        health_handle.abort();
        progress_handle.abort();

        report
    }

    async fn run_until_complete(
        &self,
        parent_task_id: Uuid,
        subtask_ids: Vec<Uuid>,
        max_concurrent_agents: usize,
    ) -> TaskerResult<OrchestrationReport> {
        loop {
            let subtasks = self.load_subtasks(&subtask_ids).await?;

            let any_failed = subtasks.iter().any(|t| t.status == TaskStatus::Failed);
            let all_terminal = subtasks.iter().all(|t| t.is_terminal());
            if any_failed || all_terminal {
                let completed = subtasks.iter().filter(|t| t.status == TaskStatus::Completed).count();
                let failed = subtasks.iter().filter(|t| t.status == TaskStatus::Failed).count();
                return Ok(OrchestrationReport {
                    parent_task_id,
                    total: subtasks.len(),
                    completed,
                    failed,
                    subtasks,
                });
            }

            self.assign_work(&subtasks, max_concurrent_agents).await?;

            if self.context_budget_exhausted() {
                self.checkpoint(parent_task_id, &subtasks).await;
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn load_subtasks(&self, ids: &[Uuid]) -> TaskerResult<Vec<Task>> {
        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = self.store.get_task(*id).await? {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    /// Ensures enough capacity exists for up to
    /// `max_concurrent_agents - in_flight` dependency-ready pending
    /// subtasks, growing the agent pool via the configured
    /// `WorkerFactory` when a required type has no registered agent yet
    /// (spec §4.5 step 4c). This never claims a task itself - claiming is
    /// exclusively the owning agent's own poll-claim-execute loop (spec
    /// §4.4); the orchestrator only guarantees someone capable is, or is
    /// about to be, running and polling the store.
    async fn assign_work(&self, subtasks: &[Task], max_concurrent_agents: usize) -> TaskerResult<()> {
        let in_flight = subtasks.iter().filter(|t| t.status == TaskStatus::InProgress).count();
        let mut available_slots = max_concurrent_agents.saturating_sub(in_flight);
        if available_slots == 0 {
            return Ok(());
        }

        let completed: HashSet<Uuid> =
            subtasks.iter().filter(|t| t.status == TaskStatus::Completed).map(|t| t.id).collect();

        for task in subtasks {
            if available_slots == 0 {
                break;
            }
            if task.status != TaskStatus::Pending {
                continue;
            }
            if !task.dependencies.iter().all(|d| completed.contains(d)) {
                continue;
            }

            let hint = required_agent_type_hint(&format!("{} {}", task.title, task.description));
            let agent_type = agent_type_for_hint(hint);
            self.ensure_agent_for(agent_type);
            available_slots -= 1;
        }

        Ok(())
    }

    /// Spawns a real agent of `agent_type` through the configured
    /// `WorkerFactory` if none is registered for it yet. A no-op when no
    /// factory is configured - the orchestrator then assumes an
    /// externally-managed worker pool already covers every needed type.
    fn ensure_agent_for(&self, agent_type: AgentType) {
        let already_provisioned = self.registry.all().iter().any(|a| a.agent_type == agent_type);
        if already_provisioned {
            return;
        }
        if let Some(factory) = &self.worker_factory {
            let id = factory.spawn(agent_type);
            info!(agent_id = %id, %agent_type, "spawned new agent for unmet demand");
        }
    }

    fn context_budget_exhausted(&self) -> bool {
        let used = self.context_tokens_used.load(AtomicOrdering::Relaxed);
        used as f64 >= self.context_token_limit as f64 * 0.8
    }

    async fn checkpoint(&self, parent_task_id: Uuid, subtasks: &[Task]) {
        let Some(offload) = &self.memory_offload else { return };

        let completed = subtasks.iter().filter(|t| t.status == TaskStatus::Completed).map(|t| t.id).collect();
        let failed = subtasks.iter().filter(|t| t.status == TaskStatus::Failed).map(|t| t.id).collect();
        let active_agents = subtasks.iter().filter_map(|t| t.assigned_agent).collect();
        let progress_pct = if subtasks.is_empty() {
            0.0
        } else {
            subtasks.iter().filter(|t| t.is_terminal()).count() as f64 / subtasks.len() as f64
        };

        let snapshot = OrchestrationSnapshot {
            parent_task_id,
            decomposed_subtasks: subtasks.iter().map(|t| t.id).collect(),
            active_agents,
            completed_tasks: completed,
            failed_tasks: failed,
            blocked_tasks: Vec::new(),
            context_tokens_used: self.context_tokens_used.load(AtomicOrdering::Relaxed),
            progress_pct,
            checkpoint_reason: "context_budget_exhausted".to_string(),
        };

        if let Err(err) = offload.checkpoint(snapshot).await {
            warn!(error = %err, parent_task_id = %parent_task_id, "orchestration checkpoint failed");
        }
    }

    /// Logs aggregate progress every tick; tolerant of per-iteration
    /// errors so a transient store hiccup never kills the orchestration
    /// run (spec §4.5 "progress monitor loop").
    fn spawn_progress_loop(&self, parent_task_id: Uuid, subtask_ids: Vec<Uuid>) -> JoinHandle<()> {
        let store = self.store.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROGRESS_TICK);
            loop {
                interval.tick().await;
                let mut completed = 0;
                let mut failed = 0;
                let mut errored = false;
                for id in &subtask_ids {
                    match store.get_task(*id).await {
                        Ok(Some(task)) => match task.status {
                            TaskStatus::Completed => completed += 1,
                            TaskStatus::Failed => failed += 1,
                            _ => {}
                        },
                        Ok(None) => {}
                        Err(err) => {
                            warn!(error = %err, parent_task_id = %parent_task_id, "progress loop read failed");
                            errored = true;
                        }
                    }
                }
                if !errored {
                    info!(
                        parent_task_id = %parent_task_id,
                        completed,
                        failed,
                        total = subtask_ids.len(),
                        "orchestration progress"
                    );
                }
            }
        })
    }
}

/// The planner's text-keyword hints are already spelled the way
/// `AgentType`'s variants serialize, so this is a direct lookup rather
/// than a judgment call.
fn agent_type_for_hint(hint: &str) -> AgentType {
    match hint {
        "research" => AgentType::Research,
        "debugging" => AgentType::Debugging,
        "validation" => AgentType::Validation,
        "review" => AgentType::Review,
        "documentation" => AgentType::Documentation,
        "optimization" => AgentType::Optimization,
        "planner" => AgentType::Planner,
        _ => AgentType::Executor,
    }
}

/// Inverse of `agent_type_for_hint` - the capability hint a `WorkerFactory`
/// should tag a freshly spawned agent's capabilities with so it becomes
/// eligible to claim tasks requiring `agent_type` (spec §3 "capability:X").
pub fn capability_hint_for_agent_type(agent_type: AgentType) -> &'static str {
    match agent_type {
        AgentType::Research => "research",
        AgentType::Debugging => "debugging",
        AgentType::Validation => "validation",
        AgentType::Review => "review",
        AgentType::Documentation => "documentation",
        AgentType::Optimization => "optimization",
        AgentType::Planner => "planner",
        _ => "executor",
    }
}

#[allow(dead_code)]
fn default_priority() -> TaskPriority {
    TaskPriority::Medium
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use tasker_shared::store::InMemoryTaskStore;

    fn test_orchestrator() -> (Orchestrator, Arc<InMemoryTaskStore>) {
        let registry = Arc::new(AgentRegistry::new());
        let store = Arc::new(InMemoryTaskStore::new());
        let health_monitor = Arc::new(HealthMonitor::new(
            registry.clone(),
            store.clone(),
            chrono::Duration::seconds(60),
            chrono::Duration::seconds(300),
            Duration::from_secs(3600),
        ));
        let orchestrator =
            Orchestrator::new(registry, store.clone(), health_monitor, Duration::from_millis(10), 200_000);
        (orchestrator, store)
    }

    #[tokio::test]
    async fn orchestrate_completes_a_simple_task_once_subtasks_finish() {
        let (orchestrator, store) = test_orchestrator();
        let parent = Task::new("Ship widget", "small fix");

        // Simulates an externally-managed worker pool (no `WorkerFactory`
        // configured here) polling and claiming the subtasks the
        // orchestrator decomposes - the orchestrator itself never calls
        // `claim`, only this loop does.
        let worker_handle = tokio::spawn({
            let store = store.clone();
            async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    let pending = store.get_available_tasks(&all_capabilities(), 10).await.unwrap_or_default();
                    for task in pending {
                        let worker_id = Uuid::now_v7();
                        if store.claim(worker_id, task.id).await.unwrap_or(None).is_some() {
                            let _ = store.complete(worker_id, task.id).await;
                        }
                    }
                }
            }
        });

        let report = orchestrator.orchestrate(parent, 4).await.unwrap();
        worker_handle.abort();

        assert_eq!(report.total, 4);
        assert!(report.succeeded());
    }

    fn all_capabilities() -> HashSet<String> {
        ["research", "debugging", "validation", "review", "documentation", "optimization", "planner", "executor"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Spawns a real, registry-backed `SpecialistWorker<EchoWorker>` per
    /// requested agent type, so `WorkerFactory::spawn` results in an agent
    /// that actually polls and claims its own work rather than a
    /// registry-only placeholder.
    struct EchoWorkerFactory {
        registry: Arc<AgentRegistry>,
        store: Arc<dyn TaskStoreContract>,
        handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
    }

    impl WorkerFactory for EchoWorkerFactory {
        fn spawn(&self, agent_type: AgentType) -> Uuid {
            let capability = format!("capability:{}", capability_hint_for_agent_type(agent_type));
            let capabilities = HashSet::from([capability]);
            let worker = Arc::new(tasker_worker::SpecialistWorker::new(
                agent_type,
                tasker_worker::EchoWorker::new(capabilities.clone()),
                self.store.clone(),
                tasker_worker::WorkerConfig { poll_interval: Duration::from_millis(5), ..Default::default() },
            ));
            let id = worker.id();
            self.registry.register_existing(id, agent_type, capabilities);
            let (poll_handle, _heartbeat_handle) = worker.spawn();
            self.handles.lock().unwrap().push(poll_handle);
            id
        }
    }

    #[tokio::test]
    async fn worker_factory_spawned_agents_actually_claim_and_finish_work() {
        let registry = Arc::new(AgentRegistry::new());
        let store = Arc::new(InMemoryTaskStore::new());
        let health_monitor = Arc::new(HealthMonitor::new(
            registry.clone(),
            store.clone(),
            chrono::Duration::seconds(60),
            chrono::Duration::seconds(300),
            Duration::from_secs(3600),
        ));
        let factory =
            Arc::new(EchoWorkerFactory { registry: registry.clone(), store: store.clone(), handles: std::sync::Mutex::new(Vec::new()) });

        let orchestrator =
            Orchestrator::new(registry, store, health_monitor, Duration::from_millis(10), 200_000)
                .with_worker_factory(factory.clone());

        let parent = Task::new("Ship widget", "small fix");
        let report = orchestrator.orchestrate(parent, 4).await.unwrap();

        for handle in factory.handles.lock().unwrap().drain(..) {
            handle.abort();
        }

        assert_eq!(report.total, 4);
        assert!(report.succeeded());
    }
}
