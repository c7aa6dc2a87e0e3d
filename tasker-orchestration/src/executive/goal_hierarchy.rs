//! Goal Hierarchy: CRUD over goals with a depth bound of 5 (spec §4.7).

use std::time::Duration;

use dashmap::DashMap;
use tasker_shared::types::{Goal, GoalStatus, MAX_GOAL_DEPTH};
use tasker_shared::{TaskerError, TaskerResult};
use uuid::Uuid;

const DEFAULT_PRUNE_IDLE: Duration = Duration::from_secs(7 * 24 * 3600);

#[derive(Debug, Default)]
pub struct GoalHierarchy {
    goals: DashMap<Uuid, Goal>,
}

impl GoalHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects a goal whose parent chain would exceed `MAX_GOAL_DEPTH`
    /// (spec §3 invariant, §8).
    pub fn create(&self, mut goal: Goal) -> TaskerResult<Goal> {
        let depth = goal.parent.map(|p| self.depth_of(p) + 1).unwrap_or(0);
        if depth > MAX_GOAL_DEPTH {
            return Err(TaskerError::Validation {
                reason: format!("goal depth {depth} exceeds max {MAX_GOAL_DEPTH}"),
            });
        }
        goal.updated_at = chrono::Utc::now();
        self.goals.insert(goal.id, goal.clone());
        Ok(goal)
    }

    pub fn get(&self, id: Uuid) -> Option<Goal> {
        self.goals.get(&id).map(|g| g.value().clone())
    }

    pub fn update(&self, mut goal: Goal) -> TaskerResult<Goal> {
        goal.updated_at = chrono::Utc::now();
        self.goals.insert(goal.id, goal.clone());
        Ok(goal)
    }

    pub fn delete(&self, id: Uuid) {
        self.goals.remove(&id);
    }

    pub fn children(&self, parent: Uuid) -> Vec<Goal> {
        self.goals
            .iter()
            .filter(|e| e.value().parent == Some(parent))
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn by_project(&self, project: &str) -> Vec<Goal> {
        self.goals
            .iter()
            .filter(|e| e.value().project == project)
            .map(|e| e.value().clone())
            .collect()
    }

    fn depth_of(&self, id: Uuid) -> u8 {
        let mut depth = 0u8;
        let mut current = Some(id);
        while let Some(id) = current {
            depth += 1;
            current = self.goals.get(&id).and_then(|g| g.value().parent);
            if depth > MAX_GOAL_DEPTH + 1 {
                break;
            }
        }
        depth
    }

    /// Marks a goal completed and, when `cascade`, marks every descendant
    /// completed too (spec §4.7 "may optionally cascade").
    pub fn complete(&self, id: Uuid, cascade: bool) -> TaskerResult<()> {
        if let Some(mut entry) = self.goals.get_mut(&id) {
            entry.status = GoalStatus::Completed;
            entry.progress = 1.0;
            entry.updated_at = chrono::Utc::now();
        }
        if cascade {
            for child in self.children(id) {
                self.complete(child.id, true)?;
            }
        }
        Ok(())
    }

    /// Removes suspended goals idle longer than `idle_threshold` (default
    /// 7 days) - spec §4.7 "Pruning".
    pub fn prune(&self, idle_threshold: Option<Duration>) -> Vec<Uuid> {
        let threshold = idle_threshold.unwrap_or(DEFAULT_PRUNE_IDLE);
        let cutoff = chrono::Utc::now() - chrono::Duration::from_std(threshold).unwrap_or_default();
        let stale: Vec<Uuid> = self
            .goals
            .iter()
            .filter(|e| e.value().status == GoalStatus::Suspended && e.value().updated_at < cutoff)
            .map(|e| e.key().to_owned())
            .collect();
        for id in &stale {
            self.goals.remove(id);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_goal_past_max_depth() {
        let hierarchy = GoalHierarchy::new();
        let mut parent_id: Option<Uuid> = None;
        for depth in 0..=MAX_GOAL_DEPTH {
            let mut goal = Goal::new("proj", format!("goal at depth {depth}"), 5);
            goal.parent = parent_id;
            let created = hierarchy.create(goal);
            if depth < MAX_GOAL_DEPTH {
                let created = created.unwrap();
                parent_id = Some(created.id);
            } else {
                assert!(created.is_err());
            }
        }
    }

    #[test]
    fn cascade_complete_marks_children() {
        let hierarchy = GoalHierarchy::new();
        let parent = hierarchy.create(Goal::new("proj", "parent", 5)).unwrap();
        let mut child = Goal::new("proj", "child", 5);
        child.parent = Some(parent.id);
        let child = hierarchy.create(child).unwrap();

        hierarchy.complete(parent.id, true).unwrap();
        assert_eq!(hierarchy.get(child.id).unwrap().status, GoalStatus::Completed);
    }
}
