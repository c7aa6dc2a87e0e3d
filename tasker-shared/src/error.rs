//! Error taxonomy for the orchestration kernel (spec §7).
//!
//! Variants are grouped by *effect*, not by origin: a transient network
//! blip and a transient LLM timeout are both `Transient`, because every
//! caller in this kernel reacts to them the same way (bounded retry, then
//! surface as a failed task). `ClaimLost` is never logged as an error - it
//! is the expected outcome of losing a race, and callers match on it
//! explicitly rather than treating it as a failure path.

use std::time::Duration;
use thiserror::Error;

/// Unified error type returned by every kernel component.
#[derive(Debug, Error)]
pub enum TaskerError {
    /// Recoverable fault (network blip, LLM timeout, store contention).
    /// Callers retry locally with bounded backoff; once retries are
    /// exhausted this is surfaced as a failed task with `reason`.
    #[error("transient error in {component}: {reason}")]
    Transient { component: String, reason: String },

    /// The optimistic-lock CAS in `claim` didn't match any row - someone
    /// else won the race. Never treated as a failure; the worker moves on
    /// to the next candidate task.
    #[error("claim lost for task {task_id}")]
    ClaimLost { task_id: String },

    /// A value failed a local sanity check (grounding score too low,
    /// a plan would miss its deadline, ...). Recovered locally: drop the
    /// pattern, reject the plan, re-request. Never fails the whole run.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// Unrecoverable task-level failure. The orchestrator decides whether
    /// to retry per policy (up to 3 attempts with backoff).
    #[error("task {task_id} failed: {reason}")]
    FatalTask { task_id: String, reason: String },

    /// An agent is presumed dead (stale heartbeat or repeated stuck
    /// detection). Its tasks are force-failed and requeued.
    #[error("agent {agent_id} is dead: {reason}")]
    AgentDead { agent_id: String, reason: String },

    /// Startup configuration is invalid. The only error kind that causes
    /// process exit; every other variant is recovered in place.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The bus's bounded queue was full at publish time; the message was
    /// dropped (and logged by the publisher, not retried by the bus).
    #[error("bus queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// `send_request` did not receive a matching response before its
    /// timeout elapsed.
    #[error("request {correlation_id} timed out after {0:?}", .timeout)]
    RequestTimeout {
        correlation_id: String,
        timeout: Duration,
    },

    /// Serialization/deserialization of an opaque payload failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TaskerError {
    pub fn transient(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transient {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Whether a caller should retry this error locally per the bounded
    /// backoff policy (spec §7).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

pub type TaskerResult<T> = Result<T, TaskerError>;
