//! Orchestration Bridge (spec §4.10): connects the Executive Function's
//! goal hierarchy to the Orchestrator's task decomposition, ranking goals
//! for attention and checkpointing orchestration state under context
//! pressure.

pub mod memory_offload;

pub use memory_offload::{InMemoryMemoryOffload, MemoryOffload, MinimalContext, OrchestrationSnapshot};

use tasker_shared::types::Goal;

use crate::executive::{GoalHierarchy, StrategySelector};

/// A goal together with its priority score in `[0.0, 1.0]` (spec §4.10
/// "goal priority ranking").
#[derive(Debug, Clone)]
pub struct RankedGoal {
    pub goal: Goal,
    pub score: f64,
}

/// A strategy recommendation bundled with the goal it was computed for,
/// ready to hand to the Planner as decomposition input.
#[derive(Debug, Clone)]
pub struct DecompositionContext {
    pub goal: Goal,
    pub strategy: tasker_shared::types::Strategy,
    pub confidence: f64,
    pub reasoning: String,
    pub alternatives: Vec<tasker_shared::types::Strategy>,
}

pub struct OrchestrationBridge {
    goals: std::sync::Arc<GoalHierarchy>,
    strategies: StrategySelector,
}

impl OrchestrationBridge {
    pub fn new(goals: std::sync::Arc<GoalHierarchy>, strategies: StrategySelector) -> Self {
        Self { goals, strategies }
    }

    /// Ranks every goal in `project` by a weighted composite of explicit
    /// priority, deadline urgency, and progress, with a small bonus or
    /// penalty for whether the goal is keeping pace with its own estimate
    /// (spec §4.10; the bonus/penalty shape mirrors the original's ±0.05
    /// on-track adjustment rather than reserving a flat fifth weight
    /// bucket for it - see DESIGN.md).
    pub fn rank_goals(&self, project: &str) -> Vec<RankedGoal> {
        let mut ranked: Vec<RankedGoal> = self
            .goals
            .by_project(project)
            .into_iter()
            .map(|goal| {
                let score = goal_priority_score(&goal);
                RankedGoal { goal, score }
            })
            .collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    /// The highest-ranked goal in `project` other than `current_goal`, if
    /// any (spec §4.10 "recommend next goal").
    pub fn recommend_next_goal(&self, project: &str, current_goal: Option<uuid::Uuid>) -> Option<Goal> {
        self.rank_goals(project).into_iter().find(|r| Some(r.goal.id) != current_goal).map(|r| r.goal)
    }

    /// Converts `goal` into a strategy recommendation the Planner can
    /// decompose against (spec §4.10 "goal to decomposition context").
    pub fn to_decomposition_context(&self, goal: &Goal, blockers: usize, related_goals: usize) -> DecompositionContext {
        let mut recs = self.strategies.select(goal, blockers, related_goals, 3);
        let top = recs.remove(0);
        DecompositionContext {
            goal: goal.clone(),
            strategy: top.strategy,
            confidence: top.score,
            reasoning: top.reasoning,
            alternatives: recs.into_iter().map(|r| r.strategy).collect(),
        }
    }
}

/// `0.40 * priority + urgency_bucket(days_to_deadline) + 0.15 * progress
/// +/- 0.05` on-track adjustment, clamped to `[0.0, 1.0]`.
fn goal_priority_score(goal: &Goal) -> f64 {
    let mut score = (goal.priority as f64 / 10.0) * 0.40;

    if let Some(days_left) = goal.days_to_deadline() {
        score += if days_left <= 3.0 {
            0.35
        } else if days_left <= 7.0 {
            0.25
        } else if days_left <= 14.0 {
            0.10
        } else {
            0.0
        };
    }

    score += goal.progress * 0.15;
    score += if goal.is_on_track() { 0.05 } else { -0.05 };

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executive::strategy_selector::InMemoryStrategyOutcomeStore;

    fn bridge() -> OrchestrationBridge {
        let goals = std::sync::Arc::new(GoalHierarchy::new());
        let strategies = StrategySelector::new(Box::new(InMemoryStrategyOutcomeStore::default()));
        OrchestrationBridge::new(goals, strategies)
    }

    #[test]
    fn ranks_goals_by_descending_composite_score() {
        let bridge = bridge();
        let low = bridge.goals.create(Goal::new("proj", "low priority cleanup", 2)).unwrap();
        let mut high = Goal::new("proj", "urgent release", 9);
        high.deadline = Some(chrono::Utc::now() + chrono::Duration::days(1));
        let high = bridge.goals.create(high).unwrap();

        let ranked = bridge.rank_goals("proj");
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].goal.id, high.id);
        assert_eq!(ranked[1].goal.id, low.id);
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn recommend_next_goal_excludes_the_current_goal() {
        let bridge = bridge();
        let first = bridge.goals.create(Goal::new("proj", "first goal", 8)).unwrap();
        let second = bridge.goals.create(Goal::new("proj", "second goal", 5)).unwrap();

        let next = bridge.recommend_next_goal("proj", Some(first.id)).unwrap();
        assert_eq!(next.id, second.id);
    }

    #[test]
    fn decomposition_context_carries_alternatives() {
        let bridge = bridge();
        let goal = Goal::new("proj", "migrate the distributed architecture", 7);
        let ctx = bridge.to_decomposition_context(&goal, 1, 0);
        assert_eq!(ctx.alternatives.len(), 2);
        assert!(!ctx.alternatives.contains(&ctx.strategy));
    }
}
