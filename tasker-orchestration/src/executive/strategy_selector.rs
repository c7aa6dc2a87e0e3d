//! Strategy Selector (spec §4.7): scores all ten strategies for a goal and
//! returns the top-k, blending a feature score with a historical
//! per-strategy success rate that converges as outcomes accumulate
//! (SPEC_FULL.md §2, grounded in the original's `strategy.py` outcome
//! persistence).

use std::collections::HashMap;
use std::sync::Mutex;

use tasker_shared::types::{Goal, Strategy};

/// Seam over strategy-outcome persistence so a real store can replace the
/// in-memory frequency table without the selector changing.
pub trait StrategyOutcomeStore: Send + Sync {
    fn record_outcome(&self, strategy: Strategy, success: bool);
    fn success_rate(&self, strategy: Strategy) -> f64;
}

#[derive(Debug, Default)]
pub struct InMemoryStrategyOutcomeStore {
    counts: Mutex<HashMap<Strategy, (u64, u64)>>,
}

impl StrategyOutcomeStore for InMemoryStrategyOutcomeStore {
    fn record_outcome(&self, strategy: Strategy, success: bool) {
        let mut counts = self.counts.lock().unwrap();
        let entry = counts.entry(strategy).or_insert((0, 0));
        entry.1 += 1;
        if success {
            entry.0 += 1;
        }
    }

    /// No history defaults to a neutral 0.5 so a never-tried strategy isn't
    /// penalized relative to an untested peer.
    fn success_rate(&self, strategy: Strategy) -> f64 {
        let counts = self.counts.lock().unwrap();
        match counts.get(&strategy) {
            Some((successes, total)) if *total > 0 => *successes as f64 / *total as f64,
            _ => 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StrategyRecommendation {
    pub strategy: Strategy,
    pub score: f64,
    pub reasoning: String,
}

pub struct StrategySelector {
    outcomes: Box<dyn StrategyOutcomeStore>,
}

impl StrategySelector {
    pub fn new(outcomes: Box<dyn StrategyOutcomeStore>) -> Self {
        Self { outcomes }
    }

    /// Top-k (default 3) strategies for `goal`, each a 0.7/0.3 blend of a
    /// feature score and the historical success rate (spec §4.7).
    pub fn select(&self, goal: &Goal, blockers: usize, related_goals: usize, top_k: usize) -> Vec<StrategyRecommendation> {
        let mut scored: Vec<StrategyRecommendation> = Strategy::ALL
            .iter()
            .map(|&strategy| {
                let feature_score = feature_score(goal, strategy, blockers, related_goals);
                let historical = self.outcomes.success_rate(strategy);
                let score = 0.7 * feature_score + 0.3 * historical;
                StrategyRecommendation {
                    strategy,
                    score,
                    reasoning: reasoning_for(goal, strategy, feature_score, historical),
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k.max(1));
        scored
    }

    pub fn record_outcome(&self, strategy: Strategy, success: bool) {
        self.outcomes.record_outcome(strategy, success);
    }
}

/// Goal complexity 1-5, inferred from text keywords (spec §4.7).
fn text_complexity(text: &str) -> u8 {
    let lower = text.to_lowercase();
    const HIGH: &[&str] = &["migrate", "architecture", "distributed", "rewrite", "overhaul"];
    const LOW: &[&str] = &["typo", "tweak", "rename", "small"];
    if HIGH.iter().any(|k| lower.contains(k)) {
        5
    } else if LOW.iter().any(|k| lower.contains(k)) {
        1
    } else {
        3
    }
}

fn feature_score(goal: &Goal, strategy: Strategy, blockers: usize, related_goals: usize) -> f64 {
    let complexity = text_complexity(&goal.text) as f64 / 5.0;
    let urgency = goal
        .days_to_deadline()
        .map(|d| if d <= 3.0 { 1.0 } else if d <= 14.0 { 0.5 } else { 0.1 })
        .unwrap_or(0.0);
    let priority = goal.priority as f64 / 10.0;
    let blocker_pressure = (blockers as f64 / 5.0).min(1.0);
    let collaboration_signal = (related_goals as f64 / 5.0).min(1.0);
    let progress = goal.progress;

    match strategy {
        Strategy::Spike => 0.5 * complexity + 0.3 * (1.0 - goal.progress) + 0.2 * blocker_pressure,
        Strategy::Parallel => 0.4 * complexity + 0.3 * collaboration_signal + 0.3 * (1.0 - urgency),
        Strategy::QualityFirst => 0.5 * complexity + 0.3 * (1.0 - urgency) + 0.2 * priority,
        Strategy::Experimental => 0.6 * complexity + 0.4 * (1.0 - progress),
        Strategy::Incremental => 0.4 * (1.0 - complexity) + 0.3 * progress + 0.3 * (1.0 - urgency),
        Strategy::BottomUp => 0.5 * complexity + 0.5 * (1.0 - urgency),
        Strategy::DeadlineDriven => 0.7 * urgency + 0.3 * priority,
        Strategy::Collaboration => 0.6 * collaboration_signal + 0.4 * (1.0 - blocker_pressure),
        Strategy::TopDown => 0.4 * (1.0 - complexity) + 0.3 * priority + 0.3 * (1.0 - blocker_pressure),
        Strategy::Sequential => 0.4 * (1.0 - collaboration_signal) + 0.3 * (1.0 - complexity) + 0.3 * progress,
    }
    .clamp(0.0, 1.0)
}

fn reasoning_for(goal: &Goal, strategy: Strategy, feature_score: f64, historical: f64) -> String {
    format!(
        "{strategy} scored {feature_score:.2} on goal features (complexity/urgency/priority) for \"{}\", blended with a {historical:.2} historical success rate",
        goal.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k_is_sorted_descending() {
        let selector = StrategySelector::new(Box::new(InMemoryStrategyOutcomeStore::default()));
        let goal = Goal::new("proj", "migrate the architecture to a distributed design", 8);
        let recs = selector.select(&goal, 1, 0, 3);
        assert_eq!(recs.len(), 3);
        assert!(recs[0].score >= recs[1].score);
        assert!(recs[1].score >= recs[2].score);
    }

    #[test]
    fn recorded_outcomes_shift_success_rate() {
        let store = InMemoryStrategyOutcomeStore::default();
        assert_eq!(store.success_rate(Strategy::Spike), 0.5);
        store.record_outcome(Strategy::Spike, true);
        store.record_outcome(Strategy::Spike, false);
        assert_eq!(store.success_rate(Strategy::Spike), 0.5);
        store.record_outcome(Strategy::Spike, true);
        assert!(store.success_rate(Strategy::Spike) > 0.5);
    }
}
