//! Goal ranking: composite scoring blends raw priority, deadline urgency,
//! and progress so a goal with no deadline at all ranks last despite
//! having the highest raw priority (see DESIGN.md's note on the
//! goal-ranking scenario for the one case where deadline bucketing ties
//! two goals together despite different exact day counts).

use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use tasker_orchestration::executive::{GoalHierarchy, InMemoryStrategyOutcomeStore, StrategySelector};
use tasker_orchestration::OrchestrationBridge;
use tasker_shared::types::Goal;

#[test]
fn a_goal_with_no_deadline_ranks_last_despite_the_highest_raw_priority() {
    let goals = Arc::new(GoalHierarchy::new());
    let strategies = StrategySelector::new(Box::new(InMemoryStrategyOutcomeStore::default()));
    let bridge = OrchestrationBridge::new(goals.clone(), strategies);

    let mut a = Goal::new("launch", "goal a", 8);
    a.deadline = Some(chrono::Utc::now() + ChronoDuration::days(2));
    a.progress = 0.1;
    let a = goals.create(a).unwrap();

    let mut b = Goal::new("launch", "goal b", 9);
    b.progress = 0.0;
    let b = goals.create(b).unwrap();

    let mut c = Goal::new("launch", "goal c", 5);
    c.deadline = Some(chrono::Utc::now() + ChronoDuration::days(1));
    c.progress = 0.8;
    let c = goals.create(c).unwrap();

    let ranked = bridge.rank_goals("launch");
    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked.last().unwrap().goal.id, b.id, "no-deadline goal B should rank last");

    // A and C both fall in the "deadline within 3 days" urgency bucket,
    // so A's higher raw priority edges out C's higher progress.
    assert_eq!(ranked[0].goal.id, a.id);
    assert_eq!(ranked[1].goal.id, c.id);
}
