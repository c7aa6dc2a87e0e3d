//! Learning Integration (spec component table): tracks per-agent,
//! per-domain task outcomes and derives an expertise score used to route
//! future work toward agents that have been effective in that domain,
//! grounded in the original's `LearningIntegrationManager`.

use dashmap::DashMap;
use tasker_shared::types::AgentType;
use uuid::Uuid;

/// Effectiveness snapshot for one agent in one domain.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentPerformanceMetrics {
    pub agent_id: Uuid,
    pub agent_type: AgentType,
    pub domain: String,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub success_rate: f64,
    pub avg_duration_minutes: f64,
    /// `0.0..=1.0`: half from success rate, half a speed bonus for
    /// consistently fast completions.
    pub expertise_score: f64,
}

impl AgentPerformanceMetrics {
    fn new(agent_id: Uuid, agent_type: AgentType, domain: impl Into<String>) -> Self {
        Self {
            agent_id,
            agent_type,
            domain: domain.into(),
            total_tasks: 0,
            completed_tasks: 0,
            failed_tasks: 0,
            success_rate: 0.0,
            avg_duration_minutes: 0.0,
            expertise_score: 0.0,
        }
    }
}

/// Speed bonus rewarding agents whose completions run under 5 (full
/// bonus) or 15 (partial bonus) minutes.
fn speed_bonus(duration_minutes: f64) -> f64 {
    if duration_minutes < 5.0 {
        0.2
    } else if duration_minutes < 15.0 {
        0.1
    } else {
        0.0
    }
}

#[derive(Debug, Default)]
pub struct LearningIntegration {
    metrics: DashMap<(Uuid, String), AgentPerformanceMetrics>,
}

impl LearningIntegration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates rolling per-agent-per-domain metrics after a task finishes
    /// (spec table "Learning Integration": success/failure tracking,
    /// expertise scoring).
    pub fn record_task_completion(
        &self,
        agent_id: Uuid,
        agent_type: AgentType,
        domain: &str,
        success: bool,
        duration_minutes: f64,
    ) -> AgentPerformanceMetrics {
        let key = (agent_id, domain.to_string());
        let mut entry = self.metrics.entry(key).or_insert_with(|| AgentPerformanceMetrics::new(agent_id, agent_type, domain));

        entry.total_tasks += 1;
        if success {
            entry.completed_tasks += 1;
        } else {
            entry.failed_tasks += 1;
        }
        entry.success_rate = entry.completed_tasks as f64 / entry.total_tasks as f64;

        let prior_tasks = (entry.total_tasks - 1) as f64;
        entry.avg_duration_minutes = (entry.avg_duration_minutes * prior_tasks + duration_minutes) / entry.total_tasks as f64;

        entry.expertise_score = (entry.success_rate * 0.5 + speed_bonus(duration_minutes)).min(1.0);

        entry.clone()
    }

    pub fn metrics_for(&self, agent_id: Uuid, domain: &str) -> Option<AgentPerformanceMetrics> {
        self.metrics.get(&(agent_id, domain.to_string())).map(|e| e.value().clone())
    }

    /// Highest-expertise `candidates` entry for `domain`, or `None` if
    /// none of the candidates have recorded history in it yet (the
    /// caller should fall back to its default routing in that case).
    pub fn best_agent_for_domain(&self, domain: &str, candidates: &[Uuid]) -> Option<Uuid> {
        candidates
            .iter()
            .filter_map(|&id| self.metrics_for(id, domain))
            .max_by(|a, b| a.expertise_score.partial_cmp(&b.expertise_score).unwrap_or(std::cmp::Ordering::Equal))
            .map(|m| m.agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_and_expertise_accumulate_across_calls() {
        let learning = LearningIntegration::new();
        let agent = Uuid::now_v7();

        learning.record_task_completion(agent, AgentType::Executor, "research", true, 3.0);
        let metrics = learning.record_task_completion(agent, AgentType::Executor, "research", false, 20.0);

        assert_eq!(metrics.total_tasks, 2);
        assert_eq!(metrics.completed_tasks, 1);
        assert_eq!(metrics.failed_tasks, 1);
        assert!((metrics.success_rate - 0.5).abs() < 1e-9);
        assert!((metrics.avg_duration_minutes - 11.5).abs() < 1e-9);
    }

    #[test]
    fn fast_completions_earn_a_speed_bonus() {
        let learning = LearningIntegration::new();
        let agent = Uuid::now_v7();
        let metrics = learning.record_task_completion(agent, AgentType::Executor, "synthesis", true, 2.0);
        assert!((metrics.expertise_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn best_agent_for_domain_picks_highest_expertise() {
        let learning = LearningIntegration::new();
        let strong = Uuid::now_v7();
        let weak = Uuid::now_v7();
        let untested = Uuid::now_v7();

        learning.record_task_completion(strong, AgentType::Research, "research", true, 2.0);
        learning.record_task_completion(weak, AgentType::Research, "research", false, 30.0);

        let best = learning.best_agent_for_domain("research", &[strong, weak, untested]);
        assert_eq!(best, Some(strong));
    }

    #[test]
    fn best_agent_for_domain_is_none_without_any_history() {
        let learning = LearningIntegration::new();
        let candidates = [Uuid::now_v7(), Uuid::now_v7()];
        assert_eq!(learning.best_agent_for_domain("analysis", &candidates), None);
    }
}
