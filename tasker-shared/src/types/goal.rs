//! Goal: durable objective managed by the Executive Function (spec §3, §4.7).

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Primary,
    Subgoal,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Suspended,
    Completed,
    Failed,
    Abandoned,
}

impl GoalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Abandoned)
    }
}

/// Maximum goal hierarchy depth (spec §3 invariant).
pub const MAX_GOAL_DEPTH: u8 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub project: String,
    pub text: String,
    pub goal_type: GoalType,
    /// 1..=10.
    pub priority: u8,
    pub status: GoalStatus,
    /// 0.0..=1.0.
    pub progress: f64,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub deadline: Option<DateTime<Utc>>,
    pub parent: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    pub fn new(project: impl Into<String>, text: impl Into<String>, priority: u8) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            project: project.into(),
            text: text.into(),
            goal_type: GoalType::Primary,
            priority: priority.clamp(1, 10),
            status: GoalStatus::Active,
            progress: 0.0,
            estimated_hours: 0.0,
            actual_hours: 0.0,
            deadline: None,
            parent: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Invariant: a completed goal's progress is 1.0; conversely a goal at
    /// progress 1.0 must be in a terminal status (spec §8).
    pub fn check_progress_invariant(&self) -> bool {
        self.progress < 1.0 || self.status.is_terminal()
    }

    pub fn days_to_deadline(&self) -> Option<f64> {
        self.deadline
            .map(|d| (d - Utc::now()).num_minutes() as f64 / (60.0 * 24.0))
    }

    /// Whether progress keeps pace with elapsed time against
    /// `estimated_hours`, with a 20% buffer. No deadline or no estimate
    /// is vacuously on-track (SPEC_FULL.md, grounded in the original's
    /// `Goal.is_on_track`).
    pub fn is_on_track(&self) -> bool {
        if self.deadline.is_none() || self.estimated_hours <= 0.0 {
            return true;
        }
        let elapsed_hours = (Utc::now() - self.created_at).num_minutes() as f64 / 60.0;
        let expected_progress = elapsed_hours / self.estimated_hours;
        self.progress >= expected_progress * 0.8
    }
}
