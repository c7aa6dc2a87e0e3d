//! Reference in-memory `TaskStoreContract` implementation.
//!
//! Used by tests and the demo binary. The dashmap shard lock taken by
//! `get_mut` makes `claim`'s read-check-write atomic per task id, which is
//! exactly the compare-and-swap spec §4.3 calls for - two concurrent
//! `claim` calls on the same task serialize on the shard lock and only one
//! observes `status == Pending`.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::TaskerResult;
use crate::store::TaskStoreContract;
use crate::types::{Task, TaskPriority, TaskStatus};

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<Uuid, Task>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn dependencies_satisfied(&self, task: &Task) -> bool {
        task.dependencies.iter().all(|dep_id| {
            self.tasks
                .get(dep_id)
                .map(|t| t.status == TaskStatus::Completed)
                .unwrap_or(false)
        })
    }
}

#[async_trait]
impl TaskStoreContract for InMemoryTaskStore {
    async fn create_task(&self, task: Task) -> TaskerResult<Task> {
        self.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, task_id: Uuid) -> TaskerResult<Option<Task>> {
        Ok(self.tasks.get(&task_id).map(|t| t.clone()))
    }

    async fn update_task(&self, task: Task) -> TaskerResult<Task> {
        self.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn delete_task(&self, task_id: Uuid) -> TaskerResult<()> {
        self.tasks.remove(&task_id);
        Ok(())
    }

    async fn get_available_tasks(
        &self,
        agent_capabilities: &HashSet<String>,
        limit: usize,
    ) -> TaskerResult<Vec<Task>> {
        let mut candidates: Vec<Task> = self
            .tasks
            .iter()
            .filter(|entry| {
                let task = entry.value();
                task.status == TaskStatus::Pending
                    && task.required_capabilities().is_subset(agent_capabilities)
                    && self.dependencies_satisfied(task)
            })
            .map(|entry| entry.value().clone())
            .collect();

        candidates.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.deadline.cmp(&b.deadline))
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn claim(&self, agent_id: Uuid, task_id: Uuid) -> TaskerResult<Option<Task>> {
        let Some(mut entry) = self.tasks.get_mut(&task_id) else {
            return Ok(None);
        };
        if entry.status != TaskStatus::Pending || entry.assigned_agent.is_some() {
            return Ok(None);
        }
        entry.status = TaskStatus::InProgress;
        entry.assigned_agent = Some(agent_id);
        entry.claimed_at = Some(Utc::now());
        entry.version += 1;
        Ok(Some(entry.clone()))
    }

    async fn update_progress(
        &self,
        agent_id: Uuid,
        task_id: Uuid,
        progress_percent: u8,
    ) -> TaskerResult<Option<Task>> {
        let Some(mut entry) = self.tasks.get_mut(&task_id) else {
            return Ok(None);
        };
        if entry.assigned_agent != Some(agent_id) {
            return Ok(None);
        }
        entry.progress_percent = progress_percent.min(100);
        Ok(Some(entry.clone()))
    }

    async fn complete(&self, agent_id: Uuid, task_id: Uuid) -> TaskerResult<Option<Task>> {
        let Some(mut entry) = self.tasks.get_mut(&task_id) else {
            return Ok(None);
        };
        if entry.assigned_agent != Some(agent_id) {
            return Ok(None);
        }
        entry.status = TaskStatus::Completed;
        entry.progress_percent = 100;
        Ok(Some(entry.clone()))
    }

    async fn fail(&self, agent_id: Uuid, task_id: Uuid, reason: String) -> TaskerResult<Option<Task>> {
        let Some(mut entry) = self.tasks.get_mut(&task_id) else {
            return Ok(None);
        };
        if entry.assigned_agent != Some(agent_id) {
            return Ok(None);
        }
        entry.status = TaskStatus::Failed;
        entry.blocked_by = Some(reason);
        Ok(Some(entry.clone()))
    }

    async fn force_fail_and_requeue(&self, task_id: Uuid, reason: String) -> TaskerResult<Option<Task>> {
        let Some(mut entry) = self.tasks.get_mut(&task_id) else {
            return Ok(None);
        };
        entry.status = TaskStatus::Failed;
        entry.blocked_by = Some(reason);
        entry.assigned_agent = None;
        entry.version += 1;
        Ok(Some(entry.clone()))
    }

    async fn retry(&self, task_id: Uuid) -> TaskerResult<Option<Task>> {
        let Some(mut entry) = self.tasks.get_mut(&task_id) else {
            return Ok(None);
        };
        if entry.status != TaskStatus::Failed || entry.retry_count >= MAX_RETRIES {
            return Ok(None);
        }
        entry.status = TaskStatus::Pending;
        entry.assigned_agent = None;
        entry.claimed_at = None;
        entry.progress_percent = 0;
        entry.version += 1;
        entry.retry_count += 1;
        Ok(Some(entry.clone()))
    }

    async fn tasks_in_progress_older_than(
        &self,
        threshold: chrono::Duration,
    ) -> TaskerResult<Vec<Task>> {
        let cutoff = Utc::now() - threshold;
        Ok(self
            .tasks
            .iter()
            .filter(|e| {
                let t = e.value();
                t.status == TaskStatus::InProgress
                    && t.progress_percent < 100
                    && t.claimed_at.map(|c| c < cutoff).unwrap_or(false)
            })
            .map(|e| e.value().clone())
            .collect())
    }

    async fn retryable_failed_tasks(&self, max_retries: u32) -> TaskerResult<Vec<Task>> {
        Ok(self
            .tasks
            .iter()
            .filter(|e| {
                let t = e.value();
                t.status == TaskStatus::Failed && t.retry_count < max_retries
            })
            .map(|e| e.value().clone())
            .collect())
    }
}

#[allow(dead_code)]
fn _priority_is_ord(p: TaskPriority) -> TaskPriority {
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn claim_is_exclusive_under_concurrent_race() {
        let store = Arc::new(InMemoryTaskStore::new());
        let mut task = Task::new("t", "d");
        task.status = TaskStatus::Pending;
        let task_id = task.id;
        store.create_task(task).await.unwrap();

        let agent_a = Uuid::now_v7();
        let agent_b = Uuid::now_v7();

        let s1 = store.clone();
        let s2 = store.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { s1.claim(agent_a, task_id).await.unwrap() }),
            tokio::spawn(async move { s2.claim(agent_b, task_id).await.unwrap() }),
        );
        let r1 = r1.unwrap();
        let r2 = r2.unwrap();

        let winners = [r1.is_some(), r2.is_some()];
        assert_eq!(winners.iter().filter(|w| **w).count(), 1);

        let persisted = store.get_task(task_id).await.unwrap().unwrap();
        assert_eq!(persisted.version, 1);
        assert!(persisted.assigned_agent == Some(agent_a) || persisted.assigned_agent == Some(agent_b));
    }

    #[tokio::test]
    async fn get_available_tasks_respects_capability_and_dependencies() {
        let store = InMemoryTaskStore::new();
        let mut dep = Task::new("dep", "d");
        dep.status = TaskStatus::InProgress;
        let dep_id = dep.id;
        store.create_task(dep).await.unwrap();

        let mut blocked = Task::new("blocked", "d");
        blocked.dependencies.push(dep_id);
        store.create_task(blocked).await.unwrap();

        let mut ready = Task::new("ready", "d");
        ready.tags.insert("capability:research".to_string());
        store.create_task(ready.clone()).await.unwrap();

        let caps: HashSet<String> = ["research".to_string()].into_iter().collect();
        let available = store.get_available_tasks(&caps, 10).await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, ready.id);
    }
}
