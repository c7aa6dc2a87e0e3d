//! Conflict Resolver (spec §4.7): scores competing goals and decides which
//! stays primary.

use tasker_shared::types::Goal;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ResolvedGoal {
    pub goal_id: Uuid,
    pub score: f64,
    pub is_primary: bool,
    pub suspended: bool,
}

#[derive(Debug, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        Self
    }

    /// `0.4·explicit_priority + 0.3·deadline_urgency + 0.2·dependency_factor
    /// + 0.1·progress` (spec §4.7). `dependency_factor` is 1.0 when a goal
    /// has no unresolved dependents blocking it, else 0.5 - the spec names
    /// the weight but not the source signal; dependents are modeled here
    /// as sibling subgoals not yet complete.
    pub fn score(&self, goal: &Goal, has_blocking_dependents: bool) -> f64 {
        let explicit_priority = goal.priority as f64 / 10.0;
        let urgency = urgency_for_days(goal.days_to_deadline());
        let dependency_factor = if has_blocking_dependents { 0.5 } else { 1.0 };
        let progress = goal.progress;

        0.4 * explicit_priority + 0.3 * urgency + 0.2 * dependency_factor + 0.1 * progress
    }

    /// Resolves a set of competing goals: highest score wins as primary;
    /// others scoring below 0.5 of the primary's score may be suspended.
    /// All resolutions are logged with reasoning (spec §4.7).
    pub fn resolve(&self, goals: &[(Goal, bool)]) -> Vec<ResolvedGoal> {
        let mut scored: Vec<(Uuid, f64)> = goals
            .iter()
            .map(|(g, has_deps)| (g.id, self.score(g, *has_deps)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let primary_score = scored.first().map(|(_, s)| *s).unwrap_or(0.0);
        let resolved: Vec<ResolvedGoal> = scored
            .into_iter()
            .enumerate()
            .map(|(idx, (goal_id, score))| {
                let is_primary = idx == 0;
                let relative = if primary_score > 0.0 { score / primary_score } else { 1.0 };
                let suspended = !is_primary && relative < 0.5;
                info!(
                    goal_id = %goal_id,
                    score,
                    is_primary,
                    suspended,
                    "conflict resolution decision"
                );
                ResolvedGoal { goal_id, score, is_primary, suspended }
            })
            .collect();
        resolved
    }
}

/// Urgency table: ≤0 days → 1.0, ≤3 → 0.9, ≤7 → 0.5, ≤14 → 0.2, else 0
/// (spec §4.7). No deadline is treated as zero urgency.
fn urgency_for_days(days: Option<f64>) -> f64 {
    match days {
        None => 0.0,
        Some(d) if d <= 0.0 => 1.0,
        Some(d) if d <= 3.0 => 0.9,
        Some(d) if d <= 7.0 => 0.5,
        Some(d) if d <= 14.0 => 0.2,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_table_boundaries() {
        assert_eq!(urgency_for_days(Some(0.0)), 1.0);
        assert_eq!(urgency_for_days(Some(3.0)), 0.9);
        assert_eq!(urgency_for_days(Some(7.0)), 0.5);
        assert_eq!(urgency_for_days(Some(14.0)), 0.2);
        assert_eq!(urgency_for_days(Some(30.0)), 0.0);
        assert_eq!(urgency_for_days(None), 0.0);
    }

    #[test]
    fn highest_scoring_goal_is_primary() {
        let resolver = ConflictResolver::new();
        let mut urgent = Goal::new("proj", "urgent", 9);
        urgent.deadline = Some(chrono::Utc::now() + chrono::Duration::hours(1));
        let low_priority = Goal::new("proj", "low priority", 2);

        let resolved = resolver.resolve(&[(low_priority, false), (urgent.clone(), false)]);
        assert_eq!(resolved[0].goal_id, urgent.id);
        assert!(resolved[0].is_primary);
    }
}
