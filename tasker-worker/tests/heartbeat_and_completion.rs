//! A worker wired to a message bus publishes heartbeats while it claims
//! and completes work, so a health monitor subscribed to the same bus
//! would see it stay alive for the duration of the run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tasker_shared::messaging::{MessageBus, MessageHandler};
use tasker_shared::store::{InMemoryTaskStore, TaskStoreContract};
use tasker_shared::types::{AgentType, Message, MessageKind, Payload, Task};
use tasker_shared::TaskerResult;
use tasker_worker::{EchoWorker, SpecialistWorker, WorkerConfig};

struct HeartbeatCounter(Arc<tokio::sync::Mutex<usize>>);

#[async_trait]
impl MessageHandler for HeartbeatCounter {
    async fn handle(&self, message: Message) -> TaskerResult<Payload> {
        if matches!(message.kind, MessageKind::Heartbeat) {
            *self.0.lock().await += 1;
        }
        Ok(Payload::new())
    }
}

#[tokio::test]
async fn a_worker_with_a_bus_heartbeats_while_completing_tasks() {
    let bus = Arc::new(MessageBus::new(100));
    let _bus_handle = bus.start();

    let store = Arc::new(InMemoryTaskStore::new());
    let mut task = Task::new("wired task", "should be claimed and completed");
    task.tags.insert("capability:executor".to_string());
    let task = store.create_task(task).await.unwrap();

    let worker = Arc::new(
        SpecialistWorker::new(
            AgentType::Executor,
            EchoWorker::new(HashSet::from(["capability:executor".to_string()])),
            store.clone(),
            WorkerConfig {
                poll_interval: Duration::from_millis(5),
                heartbeat_interval: Duration::from_millis(10),
                ..WorkerConfig::default()
            },
        )
        .with_bus(bus.clone()),
    );

    let agent_id = worker.agent_id().await;
    let heartbeats = Arc::new(tokio::sync::Mutex::new(0usize));
    bus.subscribe("registry", Arc::new(HeartbeatCounter(heartbeats.clone())));

    let (poll_handle, heartbeat_handle) = worker.spawn();
    tokio::time::sleep(Duration::from_millis(80)).await;
    poll_handle.abort();
    if let Some(handle) = heartbeat_handle {
        handle.abort();
    }

    let finished = store.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(finished.status, tasker_shared::types::TaskStatus::Completed);
    assert_eq!(finished.assigned_agent, Some(agent_id));
    assert!(*heartbeats.lock().await > 0, "expected at least one heartbeat to be published");

    bus.shutdown();
}
