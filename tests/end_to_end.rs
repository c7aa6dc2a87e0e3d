//! End-to-end scenarios run against the crate's public surface, one per
//! named scenario in the functional specification's testable-properties
//! section, exercised through `tasker_core`'s re-exports rather than any
//! crate-internal item.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tasker_core::orchestration::bridge::InMemoryMemoryOffload;
use tasker_core::orchestration::consolidation::InMemoryEpisodicEventStore;
use tasker_core::orchestration::{AgentRegistry, HealthMonitor, Orchestrator};
use tasker_core::shared::messaging::{MessageBus, MessageHandler};
use tasker_core::shared::store::{InMemoryTaskStore, TaskStoreContract};
use tasker_core::shared::types::{AgentType, Message, MessageKind, Payload, Task};
use tasker_core::shared::TaskerResult;
use tasker_core::worker::{EchoWorker, SpecialistWorker, WorkerConfig};
use uuid::Uuid;

fn demo_capabilities() -> HashSet<String> {
    ["research", "debugging", "validation", "review", "documentation", "optimization", "planner", "executor"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Scenario 1: two agents racing to claim the same task - exactly one
/// wins, the task ends up assigned and versioned once.
#[tokio::test]
async fn atomic_claim_under_race() {
    let store = Arc::new(InMemoryTaskStore::new());
    let mut task = Task::new("race me", "contended task");
    task.status = tasker_core::shared::types::TaskStatus::Pending;
    let task_id = task.id;
    store.create_task(task).await.unwrap();

    let agent_a = Uuid::now_v7();
    let agent_b = Uuid::now_v7();
    let (sa, sb) = (store.clone(), store.clone());
    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { sa.claim(agent_a, task_id).await.unwrap() }),
        tokio::spawn(async move { sb.claim(agent_b, task_id).await.unwrap() }),
    );

    let wins = [ra.unwrap().is_some(), rb.unwrap().is_some()];
    assert_eq!(wins.iter().filter(|w| **w).count(), 1);

    let persisted = store.get_task(task_id).await.unwrap().unwrap();
    assert_eq!(persisted.version, 1);
    assert!(persisted.assigned_agent == Some(agent_a) || persisted.assigned_agent == Some(agent_b));
}

/// Scenario 5: higher-priority messages are always delivered before
/// lower-priority ones to the same subscriber.
#[tokio::test]
async fn bus_delivers_messages_in_priority_order() {
    struct Recorder(Arc<tokio::sync::Mutex<Vec<f64>>>);

    #[async_trait::async_trait]
    impl MessageHandler for Recorder {
        async fn handle(&self, message: Message) -> TaskerResult<Payload> {
            self.0.lock().await.push(message.priority);
            Ok(Payload::new())
        }
    }

    let bus = MessageBus::new(100);
    let _loop_handle = bus.start();
    let seen = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    bus.subscribe("agent-1", Arc::new(Recorder(seen.clone())));

    let m1 = Message::new("caller", "agent-1", MessageKind::Update).with_priority(0.2);
    let m2 = Message::new("caller", "agent-1", MessageKind::Update).with_priority(0.9);
    let m3 = Message::new("caller", "agent-1", MessageKind::Update).with_priority(0.5);
    bus.publish(m1).await.unwrap();
    bus.publish(m2).await.unwrap();
    bus.publish(m3).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*seen.lock().await, vec![0.9, 0.5, 0.2]);
    bus.shutdown();
}

/// A small end-to-end orchestration run: a parent task is decomposed,
/// claimed and completed by independent specialist workers, and the
/// final report reflects every subtask finishing successfully.
#[tokio::test]
async fn orchestration_runs_a_parent_task_to_completion_with_real_workers() {
    let registry = Arc::new(AgentRegistry::new());
    let store = Arc::new(InMemoryTaskStore::new());
    let health_monitor = Arc::new(HealthMonitor::new(
        registry.clone(),
        store.clone(),
        chrono::Duration::seconds(60),
        chrono::Duration::seconds(300),
        Duration::from_secs(3600),
    ));
    let events = Arc::new(InMemoryEpisodicEventStore::default());
    let memory_offload = Arc::new(InMemoryMemoryOffload::new(events));

    let orchestrator =
        Orchestrator::new(registry, store.clone(), health_monitor, Duration::from_millis(10), 200_000)
            .with_memory_offload(memory_offload);

    let mut worker_handles = Vec::new();
    for capability in demo_capabilities() {
        let worker = Arc::new(SpecialistWorker::new(
            AgentType::Executor,
            EchoWorker::new(HashSet::from([format!("capability:{capability}")])),
            store.clone(),
            WorkerConfig { poll_interval: Duration::from_millis(5), ..WorkerConfig::default() },
        ));
        let (poll_handle, _heartbeat_handle) = worker.spawn();
        worker_handles.push(poll_handle);
    }

    let parent = Task::new("ship the feature", "end to end demo task");
    let report = orchestrator.orchestrate(parent, 4).await.unwrap();

    for handle in worker_handles {
        handle.abort();
    }

    assert!(report.succeeded());
    assert_eq!(report.failed, 0);
    assert_eq!(report.completed, report.total);
}
