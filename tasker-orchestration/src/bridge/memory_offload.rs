//! Memory Offload (spec §4.10): checkpoints orchestration state once the
//! context-token budget is exhausted, so a long-running orchestration can
//! resume from the last known snapshot instead of replaying from scratch.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tasker_shared::types::{EpisodicEvent, EventType, Outcome};
use tasker_shared::TaskerResult;
use uuid::Uuid;

use crate::consolidation::store::EpisodicEventStore;

/// A point-in-time summary of an in-flight orchestration run, persisted so
/// the run can be reconstructed without replaying every subtask event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationSnapshot {
    pub parent_task_id: Uuid,
    pub decomposed_subtasks: Vec<Uuid>,
    pub active_agents: Vec<Uuid>,
    pub completed_tasks: Vec<Uuid>,
    pub failed_tasks: Vec<Uuid>,
    pub blocked_tasks: Vec<Uuid>,
    pub context_tokens_used: u64,
    pub progress_pct: f64,
    pub checkpoint_reason: String,
}

/// A minimal view of the last checkpoint, cheap enough to hand back to an
/// agent that is rebuilding context after an offload (spec §4.10
/// "minimal context").
#[derive(Debug, Clone)]
pub struct MinimalContext {
    pub parent_task_id: Uuid,
    pub progress_pct: f64,
    pub completed_count: usize,
    pub failed_count: usize,
    pub sample_active_agents: Vec<Uuid>,
}

#[async_trait]
pub trait MemoryOffload: Send + Sync {
    async fn checkpoint(&self, snapshot: OrchestrationSnapshot) -> TaskerResult<()>;

    /// Most recent checkpoint for `parent_task_id`, if one exists.
    async fn restore(&self, parent_task_id: Uuid) -> TaskerResult<Option<OrchestrationSnapshot>>;

    async fn minimal_context(&self, parent_task_id: Uuid) -> TaskerResult<Option<MinimalContext>> {
        Ok(self.restore(parent_task_id).await?.map(|snapshot| MinimalContext {
            parent_task_id: snapshot.parent_task_id,
            progress_pct: snapshot.progress_pct,
            completed_count: snapshot.completed_tasks.len(),
            failed_count: snapshot.failed_tasks.len(),
            sample_active_agents: snapshot.active_agents.into_iter().take(3).collect(),
        }))
    }
}

/// Persists checkpoints as episodic events, mirroring the original's
/// practice of writing orchestration checkpoints into the same event
/// store consolidation reads from rather than a bespoke table.
pub struct InMemoryMemoryOffload {
    events: Arc<dyn EpisodicEventStore>,
}

impl InMemoryMemoryOffload {
    pub fn new(events: Arc<dyn EpisodicEventStore>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl MemoryOffload for InMemoryMemoryOffload {
    async fn checkpoint(&self, snapshot: OrchestrationSnapshot) -> TaskerResult<()> {
        let content = json!({
            "parent_task_id": snapshot.parent_task_id,
            "decomposed_subtasks": snapshot.decomposed_subtasks,
            "active_agents": snapshot.active_agents,
            "completed_tasks": snapshot.completed_tasks,
            "failed_tasks": snapshot.failed_tasks,
            "blocked_tasks": snapshot.blocked_tasks,
            "context_tokens_used": snapshot.context_tokens_used,
            "progress_pct": snapshot.progress_pct,
            "checkpoint_reason": snapshot.checkpoint_reason,
        });
        let mut event = EpisodicEvent::new(
            "orchestration",
            EventType::Other("orchestration_checkpoint".to_string()),
            Outcome::Ongoing,
            content,
        );
        event.context.task = Some(snapshot.parent_task_id);
        self.events.record(event).await
    }

    async fn restore(&self, parent_task_id: Uuid) -> TaskerResult<Option<OrchestrationSnapshot>> {
        // A window wide enough to span any realistic orchestration run;
        // the store itself does not index by parent task, so this walks
        // every unconsolidated checkpoint event and keeps the latest.
        let events = self.events.unconsolidated_in_window(chrono::Duration::days(365)).await?;
        let snapshot = events
            .into_iter()
            .filter(|e| matches!(&e.event_type, EventType::Other(kind) if kind == "orchestration_checkpoint"))
            .filter(|e| e.context.task == Some(parent_task_id))
            .max_by_key(|e| e.timestamp)
            .and_then(|e| serde_json::from_value::<OrchestrationSnapshot>(e.content).ok());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::store::InMemoryEpisodicEventStore;

    fn snapshot(parent_task_id: Uuid, reason: &str) -> OrchestrationSnapshot {
        OrchestrationSnapshot {
            parent_task_id,
            decomposed_subtasks: vec![Uuid::now_v7()],
            active_agents: vec![Uuid::now_v7()],
            completed_tasks: vec![],
            failed_tasks: vec![],
            blocked_tasks: vec![],
            context_tokens_used: 160_000,
            progress_pct: 0.5,
            checkpoint_reason: reason.to_string(),
        }
    }

    #[tokio::test]
    async fn restores_the_most_recent_checkpoint_for_a_task() {
        let offload = InMemoryMemoryOffload::new(Arc::new(InMemoryEpisodicEventStore::default()));
        let parent_task_id = Uuid::now_v7();

        offload.checkpoint(snapshot(parent_task_id, "first")).await.unwrap();
        offload.checkpoint(snapshot(parent_task_id, "second")).await.unwrap();

        let restored = offload.restore(parent_task_id).await.unwrap().unwrap();
        assert_eq!(restored.checkpoint_reason, "second");
    }

    #[tokio::test]
    async fn restore_is_none_for_an_unknown_task() {
        let offload = InMemoryMemoryOffload::new(Arc::new(InMemoryEpisodicEventStore::default()));
        assert!(offload.restore(Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn minimal_context_samples_up_to_three_active_agents() {
        let offload = InMemoryMemoryOffload::new(Arc::new(InMemoryEpisodicEventStore::default()));
        let parent_task_id = Uuid::now_v7();
        let mut snap = snapshot(parent_task_id, "budget");
        snap.active_agents = (0..5).map(|_| Uuid::now_v7()).collect();
        offload.checkpoint(snap).await.unwrap();

        let ctx = offload.minimal_context(parent_task_id).await.unwrap().unwrap();
        assert_eq!(ctx.sample_active_agents.len(), 3);
        assert_eq!(ctx.progress_pct, 0.5);
    }
}
