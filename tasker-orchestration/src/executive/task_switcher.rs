//! Task Switcher (spec §4.7): charges a bounded quadratic cost on each
//! current-goal change and records the switch for later context
//! restoration (SPEC_FULL.md §2, grounded in the original's
//! `TaskSwitcher::restore_context`).

use std::sync::Mutex;

use serde_json::Value;
use tasker_shared::types::{switch_cost_ms, TaskSwitch};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct TaskSwitcher {
    current: Mutex<Option<(Uuid, u8)>>,
    history: Mutex<Vec<TaskSwitch>>,
}

impl TaskSwitcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches the "current" goal, charging `switch_cost_ms` on the
    /// priority delta from the previous goal (0 if there was none).
    pub fn switch(
        &self,
        to_goal: Uuid,
        to_priority: u8,
        reason: impl Into<String>,
        context_snapshot: Option<Value>,
    ) -> TaskSwitch {
        let mut current = self.current.lock().unwrap();
        let (from_goal, delta) = match *current {
            Some((prev_id, prev_priority)) => {
                (Some(prev_id), (to_priority as f64 - prev_priority as f64).abs())
            }
            None => (None, 0.0),
        };

        let record = TaskSwitch {
            id: Uuid::now_v7(),
            from_goal,
            to_goal,
            cost_ms: switch_cost_ms(delta),
            reason: reason.into(),
            context_snapshot,
            switched_at: chrono::Utc::now(),
        };

        *current = Some((to_goal, to_priority));
        self.history.lock().unwrap().push(record.clone());
        record
    }

    /// Total overhead in ms charged across every recorded switch.
    pub fn total_overhead_ms(&self) -> f64 {
        self.history.lock().unwrap().iter().map(|s| s.cost_ms).sum()
    }

    pub fn average_overhead_ms(&self) -> f64 {
        let history = self.history.lock().unwrap();
        if history.is_empty() {
            0.0
        } else {
            history.iter().map(|s| s.cost_ms).sum::<f64>() / history.len() as f64
        }
    }

    /// Last snapshot recorded for `goal`, most recent switch-to wins.
    pub fn restore_context(&self, goal: Uuid) -> Option<Value> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.to_goal == goal && s.context_snapshot.is_some())
            .and_then(|s| s.context_snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_delta_costs_floor_nonzero_costs_ceiling() {
        let switcher = TaskSwitcher::new();
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let first = switcher.switch(a, 5, "start", None);
        assert_eq!(first.cost_ms, 5.0);

        let second = switcher.switch(a, 5, "same priority", None);
        assert_eq!(second.cost_ms, 5.0);

        let third = switcher.switch(b, 15, "big jump", None);
        assert_eq!(third.cost_ms, 50.0);
    }

    #[test]
    fn restore_context_returns_last_snapshot_for_goal() {
        let switcher = TaskSwitcher::new();
        let goal = Uuid::now_v7();
        switcher.switch(goal, 5, "first", Some(serde_json::json!({"step": 1})));
        switcher.switch(goal, 5, "second", Some(serde_json::json!({"step": 2})));
        let restored = switcher.restore_context(goal).unwrap();
        assert_eq!(restored["step"], 2);
    }
}
