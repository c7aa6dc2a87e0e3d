//! Progress Monitor (spec §4.7): milestone generation, stall detection,
//! and completion forecasting.

use chrono::{DateTime, Utc};
use tasker_shared::types::{ComplexityClass, Goal};

use crate::planner::classify_complexity_text;

#[derive(Debug, Clone)]
pub struct Milestone {
    pub description: String,
    pub target_progress: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockerSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct Blocker {
    pub severity: BlockerSeverity,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct CompletionForecast {
    pub velocity_per_hour: f64,
    pub projected_completion: Option<DateTime<Utc>>,
    pub confidence: f64,
}

#[derive(Debug, Default)]
pub struct ProgressMonitor;

impl ProgressMonitor {
    pub fn new() -> Self {
        Self
    }

    /// 3-5 milestones depending on complexity class inferred from goal text
    /// (spec §4.7).
    pub fn milestones(&self, goal: &Goal) -> Vec<Milestone> {
        let complexity = classify_complexity_text(&goal.text);
        let descriptions: &[&str] = match complexity {
            ComplexityClass::Simple => &["start", "midpoint", "complete"],
            ComplexityClass::Medium => &["kickoff", "design settled", "implementation done", "verified"],
            ComplexityClass::Complex => {
                &["kickoff", "design settled", "core implementation", "integration", "verified and shipped"]
            }
        };
        descriptions
            .iter()
            .enumerate()
            .map(|(idx, desc)| Milestone {
                description: desc.to_string(),
                target_progress: (idx + 1) as f64 / descriptions.len() as f64,
            })
            .collect()
    }

    /// A goal with no progress for over 2 hours emits a high-severity
    /// blocker (spec §4.7).
    pub fn detect_blocker(&self, goal: &Goal, last_progress_at: DateTime<Utc>) -> Option<Blocker> {
        let idle = Utc::now() - last_progress_at;
        if goal.status == tasker_shared::types::GoalStatus::Active && idle > chrono::Duration::hours(2) {
            Some(Blocker {
                severity: BlockerSeverity::High,
                reason: format!("no progress for {} minutes", idle.num_minutes()),
            })
        } else {
            None
        }
    }

    /// velocity = progress / hours_elapsed; projected completion = now +
    /// (1 - progress) / velocity; confidence halved when the projection
    /// disagrees with the original estimate by more than 2x or less than
    /// 0.5x (spec §4.7).
    pub fn forecast(&self, goal: &Goal) -> CompletionForecast {
        let hours_elapsed = (Utc::now() - goal.created_at).num_minutes() as f64 / 60.0;
        if hours_elapsed <= 0.0 || goal.progress <= 0.0 {
            return CompletionForecast { velocity_per_hour: 0.0, projected_completion: None, confidence: 0.5 };
        }

        let velocity = goal.progress / hours_elapsed;
        if velocity <= 0.0 {
            return CompletionForecast { velocity_per_hour: 0.0, projected_completion: None, confidence: 0.3 };
        }

        let remaining_hours = (1.0 - goal.progress) / velocity;
        let projected = Utc::now() + chrono::Duration::minutes((remaining_hours * 60.0) as i64);

        let mut confidence = 0.8;
        if goal.estimated_hours > 0.0 {
            let total_projected_hours = hours_elapsed + remaining_hours;
            let ratio = total_projected_hours / goal.estimated_hours;
            if !(0.5..=2.0).contains(&ratio) {
                confidence *= 0.5;
            }
        }

        CompletionForecast { velocity_per_hour: velocity, projected_completion: Some(projected), confidence }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_goal_gets_three_milestones() {
        let monitor = ProgressMonitor::new();
        let goal = Goal::new("proj", "fix a typo", 3);
        assert_eq!(monitor.milestones(&goal).len(), 3);
    }

    #[test]
    fn complex_goal_gets_five_milestones() {
        let monitor = ProgressMonitor::new();
        let goal = Goal::new("proj", "migrate architecture to distributed design", 3);
        assert_eq!(monitor.milestones(&goal).len(), 5);
    }

    #[test]
    fn stalled_active_goal_emits_high_severity_blocker() {
        let monitor = ProgressMonitor::new();
        let goal = Goal::new("proj", "a goal", 5);
        let stalled_since = Utc::now() - chrono::Duration::hours(3);
        let blocker = monitor.detect_blocker(&goal, stalled_since).unwrap();
        assert_eq!(blocker.severity, BlockerSeverity::High);
    }
}
