//! Task: the unit of work (spec §3 "Task", §4.3 claim protocol).

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assigned_agent: Option<Uuid>,
    /// 0..=100.
    pub progress_percent: u8,
    /// Free-text, human-readable reason a task can't proceed. Never
    /// parsed back into structured data - see `retry_count` below and
    /// DESIGN.md's resolution of the "retry_count in blocked_by" open
    /// question.
    pub blocked_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub dependencies: Vec<Uuid>,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_effort_minutes: Option<u32>,
    pub tags: HashSet<String>,
    pub parent: Option<Uuid>,
    /// Optimistic-lock counter bumped on every successful `claim`.
    pub version: u64,
    /// Structured retry counter, incremented by the health monitor's
    /// retryable-failure recovery path (spec §4.2). Capped at the policy
    /// maximum (3) per spec §8 "retryable failed task".
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            assigned_agent: None,
            progress_percent: 0,
            blocked_by: None,
            claimed_at: None,
            dependencies: Vec::new(),
            deadline: None,
            estimated_effort_minutes: None,
            tags: HashSet::new(),
            parent: None,
            version: 0,
            retry_count: 0,
            created_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn required_capabilities(&self) -> HashSet<String> {
        self.tags
            .iter()
            .filter_map(|t| t.strip_prefix("capability:"))
            .map(str::to_string)
            .collect()
    }
}
