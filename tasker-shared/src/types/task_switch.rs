//! TaskSwitch: record of switching the "current" goal (spec §3, §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const SWITCH_COST_FLOOR_MS: f64 = 5.0;
pub const SWITCH_COST_CEILING_MS: f64 = 50.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSwitch {
    pub id: Uuid,
    pub from_goal: Option<Uuid>,
    pub to_goal: Uuid,
    pub cost_ms: f64,
    pub reason: String,
    /// Arbitrary snapshot of working context at switch time, restorable
    /// via `TaskSwitcher::restore_context` (SPEC_FULL.md §2).
    pub context_snapshot: Option<Value>,
    pub switched_at: DateTime<Utc>,
}

/// `cost = 5 + (Δpriority/10)² · 100`, clamped to `[5, 50]` (spec §3, §4.7,
/// §8 boundary behaviors).
pub fn switch_cost_ms(delta_priority: f64) -> f64 {
    let raw = SWITCH_COST_FLOOR_MS + (delta_priority / 10.0).powi(2) * 100.0;
    raw.clamp(SWITCH_COST_FLOOR_MS, SWITCH_COST_CEILING_MS)
}
