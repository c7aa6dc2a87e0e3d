//! Task Store Contract (spec §4.3, §6).
//!
//! The durable store itself (a relational database with vector search) is
//! explicitly out of scope (spec §1): the kernel only depends on this
//! narrow trait. `in_memory` ships a reference implementation used by
//! tests and the demo binary; a production deployment swaps in a
//! Postgres-backed implementation without touching any kernel component.

pub mod in_memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::TaskerResult;
use crate::types::Task;

pub use in_memory::InMemoryTaskStore;

/// Atomic task-claim store contract. Every method that mutates a task is
/// guarded so that only the owning agent (or, for `claim`, the optimistic
/// lock itself) can perform the mutation - spec §4.3 "assigned_agent_id =
/// caller".
#[async_trait]
pub trait TaskStoreContract: Send + Sync {
    async fn create_task(&self, task: Task) -> TaskerResult<Task>;
    async fn get_task(&self, task_id: Uuid) -> TaskerResult<Option<Task>>;
    async fn update_task(&self, task: Task) -> TaskerResult<Task>;
    async fn delete_task(&self, task_id: Uuid) -> TaskerResult<()>;

    /// Up to `limit` pending tasks whose dependency set is fully
    /// completed and whose required capabilities are a subset of
    /// `agent_capabilities`. Ordering: priority descending, deadline
    /// ascending, creation time ascending (spec §4.3).
    async fn get_available_tasks(
        &self,
        agent_capabilities: &std::collections::HashSet<String>,
        limit: usize,
    ) -> TaskerResult<Vec<Task>>;

    /// Atomic compare-and-swap from
    /// `status=pending ∧ assigned=null ∧ version=v` to
    /// `status=in_progress ∧ assigned=agent_id ∧ version=v+1`.
    /// Returns `Ok(None)` - not an error - when no row matches; this is
    /// the normal "claim-lost" outcome (spec §7), not a store failure.
    async fn claim(&self, agent_id: Uuid, task_id: Uuid) -> TaskerResult<Option<Task>>;

    /// Guarded by `assigned_agent_id == agent_id`.
    async fn update_progress(
        &self,
        agent_id: Uuid,
        task_id: Uuid,
        progress_percent: u8,
    ) -> TaskerResult<Option<Task>>;

    /// Guarded by `assigned_agent_id == agent_id`.
    async fn complete(&self, agent_id: Uuid, task_id: Uuid) -> TaskerResult<Option<Task>>;

    /// Guarded by `assigned_agent_id == agent_id`.
    async fn fail(&self, agent_id: Uuid, task_id: Uuid, reason: String) -> TaskerResult<Option<Task>>;

    /// Force-fail and unclaim a task regardless of the current assignee.
    /// Only the health monitor is permitted to call this (spec §4.2).
    async fn force_fail_and_requeue(&self, task_id: Uuid, reason: String) -> TaskerResult<Option<Task>>;

    /// Reset a failed task back to pending with a version bump and
    /// incremented retry counter, up to the policy maximum.
    async fn retry(&self, task_id: Uuid) -> TaskerResult<Option<Task>>;

    async fn tasks_in_progress_older_than(
        &self,
        threshold: chrono::Duration,
    ) -> TaskerResult<Vec<Task>>;

    async fn retryable_failed_tasks(&self, max_retries: u32) -> TaskerResult<Vec<Task>>;
}
