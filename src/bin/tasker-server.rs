//! Minimal wiring demo: a bus, an in-memory task store, an orchestrator,
//! and a health monitor, decomposing and running one parent task end to
//! end. This binary talks to nothing external - it only demonstrates the
//! wiring and is exercised by the root integration tests.

use std::sync::Arc;
use std::time::Duration;

use tasker_core::EchoWorkerFactory;
use tasker_orchestration::bridge::InMemoryMemoryOffload;
use tasker_orchestration::{AgentRegistry, HealthMonitor, Orchestrator};
use tasker_shared::config::Config;
use tasker_shared::messaging::MessageBus;
use tasker_shared::store::InMemoryTaskStore;
use tasker_shared::types::Task;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = Config::load(None)?;

    let bus = Arc::new(MessageBus::new(config.bus_max_queue_size));
    let _bus_handle = bus.start();

    let registry = Arc::new(AgentRegistry::new());
    let store = Arc::new(InMemoryTaskStore::new());

    // Real echo specialists, one per agent type the orchestrator or the
    // health monitor ends up needing, are spawned on demand and registered
    // under their own id (spec §4.5 step 4c "find-or-spawn an idle agent
    // of that type") - neither component ever claims work on behalf of an
    // agent it cannot itself run.
    let worker_factory = Arc::new(EchoWorkerFactory::new(registry.clone(), store.clone(), Duration::from_millis(25)));

    let health_monitor = Arc::new(
        HealthMonitor::new(
            registry.clone(),
            store.clone(),
            config.stale_threshold(),
            config.stuck_threshold(),
            config.health_check_interval(),
        )
        .with_worker_factory(worker_factory.clone()),
    );

    let events = Arc::new(tasker_orchestration::consolidation::InMemoryEpisodicEventStore::default());
    let memory_offload = Arc::new(InMemoryMemoryOffload::new(events));

    let orchestrator = Orchestrator::new(
        registry,
        store.clone(),
        health_monitor,
        config.poll_interval(),
        config.context_token_limit,
    )
    .with_memory_offload(memory_offload)
    .with_worker_factory(worker_factory.clone());

    let parent = Task::new("Ship the demo feature", "small fix wiring the orchestration kernel together");
    let report = orchestrator.orchestrate(parent, config.max_concurrent_agents).await?;

    worker_factory.shutdown();

    tracing::info!(
        total = report.total,
        completed = report.completed,
        failed = report.failed,
        succeeded = report.succeeded(),
        "demo orchestration run finished"
    );

    bus.shutdown();
    Ok(())
}
