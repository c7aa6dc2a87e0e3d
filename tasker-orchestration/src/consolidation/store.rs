//! Persistence seams for step 6 (semantic memory) and step 7 (temporal
//! knowledge graph) - spec §4.8. The durable implementations are out of
//! scope (spec §1); in-memory references exercise the pipeline and tests.

use std::sync::Mutex;

use async_trait::async_trait;
use tasker_shared::types::{EpisodicEvent, SemanticPattern};
use tasker_shared::TaskerResult;

/// Step 1 acquisition seam: pull unconsolidated events in a window, flip
/// them to consolidated once the run persists its patterns (spec §4.8).
#[async_trait]
pub trait EpisodicEventStore: Send + Sync {
    async fn record(&self, event: EpisodicEvent) -> TaskerResult<()>;

    async fn unconsolidated_in_window(&self, window: chrono::Duration) -> TaskerResult<Vec<EpisodicEvent>>;

    async fn mark_consolidated(&self, event_ids: &[uuid::Uuid]) -> TaskerResult<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryEpisodicEventStore {
    events: Mutex<Vec<EpisodicEvent>>,
}

#[async_trait]
impl EpisodicEventStore for InMemoryEpisodicEventStore {
    async fn record(&self, event: EpisodicEvent) -> TaskerResult<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    async fn unconsolidated_in_window(&self, window: chrono::Duration) -> TaskerResult<Vec<EpisodicEvent>> {
        let cutoff = chrono::Utc::now() - window;
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.consolidation_status == tasker_shared::types::ConsolidationStatus::Unconsolidated
                    && e.timestamp >= cutoff
            })
            .cloned()
            .collect())
    }

    async fn mark_consolidated(&self, event_ids: &[uuid::Uuid]) -> TaskerResult<()> {
        let mut events = self.events.lock().unwrap();
        for event in events.iter_mut() {
            if event_ids.contains(&event.id) {
                event.mark_consolidated();
            }
        }
        Ok(())
    }
}

#[async_trait]
pub trait PatternStore: Send + Sync {
    async fn save(&self, pattern: SemanticPattern) -> TaskerResult<()>;
    async fn all(&self) -> TaskerResult<Vec<SemanticPattern>>;
}

#[derive(Debug, Default)]
pub struct InMemoryPatternStore {
    patterns: Mutex<Vec<SemanticPattern>>,
}

#[async_trait]
impl PatternStore for InMemoryPatternStore {
    async fn save(&self, pattern: SemanticPattern) -> TaskerResult<()> {
        self.patterns.lock().unwrap().push(pattern);
        Ok(())
    }

    async fn all(&self) -> TaskerResult<Vec<SemanticPattern>> {
        Ok(self.patterns.lock().unwrap().clone())
    }
}

#[derive(Debug, Clone)]
pub struct EntityUpdate {
    pub entity: String,
    pub relation: String,
    pub target: String,
    pub frequency: u32,
}

/// Step 7 - temporal-graph synthesis seam. Optional: a caller that has no
/// knowledge-graph backend configured can skip the step entirely.
#[async_trait]
pub trait KnowledgeGraphStore: Send + Sync {
    async fn push_updates(&self, updates: Vec<EntityUpdate>) -> TaskerResult<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryKnowledgeGraphStore {
    updates: Mutex<Vec<EntityUpdate>>,
}

#[async_trait]
impl KnowledgeGraphStore for InMemoryKnowledgeGraphStore {
    async fn push_updates(&self, updates: Vec<EntityUpdate>) -> TaskerResult<()> {
        self.updates.lock().unwrap().extend(updates);
        Ok(())
    }
}
