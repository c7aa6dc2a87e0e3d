//! Planner / Strategy-Aware Decomposer (spec §4.6).
//!
//! `CorePlanner::decompose` produces the default four-phase plan; the
//! strategy-aware wrapper (`decompose_with_strategy`) rewrites the step DAG
//! to match one of the ten `Strategy` shapes. Critical path is a plain
//! depth-first enumeration over the dependency DAG, taking the argmax by
//! summed duration - the DAGs here are small (single digits of steps) so
//! no need for a longest-path-in-DAG dynamic-programming shortcut.

pub mod critical_path;
pub mod strategy_decomposer;

use tasker_shared::types::{ComplexityClass, ExecutionPlan, PlanStep, RiskLevel, Strategy, Task};

pub use strategy_decomposer::decompose_with_strategy;

#[derive(Debug, Default)]
pub struct CorePlanner;

impl CorePlanner {
    pub fn new() -> Self {
        Self
    }

    /// Default four-phase plan: plan → implement → test → deploy, strictly
    /// linear dependencies (spec §4.6).
    pub fn decompose(&self, task: &Task) -> ExecutionPlan {
        let mut plan_step = PlanStep::new(format!("Plan: {}", task.title), 30.0);
        plan_step.success_criteria.push("requirements captured".into());

        let mut implement_step = PlanStep::new(format!("Implement: {}", task.title), 120.0);
        implement_step.dependencies.push(plan_step.id);
        implement_step.risk = RiskLevel::Medium;
        implement_step.success_criteria.push("implementation complete".into());

        let mut test_step = PlanStep::new(format!("Test: {}", task.title), 45.0);
        test_step.dependencies.push(implement_step.id);
        test_step.success_criteria.push("tests pass".into());

        let mut deploy_step = PlanStep::new(format!("Deploy: {}", task.title), 20.0);
        deploy_step.dependencies.push(test_step.id);
        deploy_step.success_criteria.push("deployed and verified".into());

        let steps = vec![plan_step, implement_step, test_step, deploy_step];
        let mut plan = ExecutionPlan::new(task.id, steps);
        plan.complexity = classify_complexity(task);
        plan.confidence = confidence_for(&plan.steps);
        plan.critical_path = critical_path::critical_path(&plan.steps);
        plan
    }
}

/// Text-keyword complexity classifier shared by the planner and progress
/// monitor's milestone-count heuristic.
pub fn classify_complexity(task: &Task) -> ComplexityClass {
    classify_complexity_text(&format!("{} {}", task.title, task.description))
}

/// Same classifier, usable over any free text (goals as well as tasks).
pub fn classify_complexity_text(text: &str) -> ComplexityClass {
    let text = text.to_lowercase();
    const COMPLEX_KEYWORDS: &[&str] = &["migrate", "architecture", "distributed", "rewrite", "overhaul"];
    const SIMPLE_KEYWORDS: &[&str] = &["typo", "rename", "tweak", "small fix", "copy change", "small"];

    if COMPLEX_KEYWORDS.iter().any(|k| text.contains(k)) {
        ComplexityClass::Complex
    } else if SIMPLE_KEYWORDS.iter().any(|k| text.contains(k)) {
        ComplexityClass::Simple
    } else {
        ComplexityClass::Medium
    }
}

/// Confidence starts at 0.85, reduced 0.05 per high-risk step, up to 0.10
/// more for dense dependencies (spec §4.6).
pub fn confidence_for(steps: &[PlanStep]) -> f64 {
    let high_risk_penalty = steps.iter().filter(|s| s.risk == RiskLevel::High).count() as f64 * 0.05;
    let total_deps: usize = steps.iter().map(|s| s.dependencies.len()).sum();
    let density = if steps.is_empty() { 0.0 } else { total_deps as f64 / steps.len() as f64 };
    let density_penalty = (density / 3.0).min(1.0) * 0.10;
    (0.85_f64 - high_risk_penalty - density_penalty).max(0.0)
}

/// Agent-type routing heuristic used by the orchestrator's assign-work loop
/// (spec §4.5 step 4b): infer the required `AgentType` tag from a step or
/// task's text.
pub fn required_agent_type_hint(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    if lower.contains("research") || lower.contains("investigat") {
        "research"
    } else if lower.contains("debug") || lower.contains("fix") {
        "debugging"
    } else if lower.contains("test") {
        "validation"
    } else if lower.contains("review") {
        "review"
    } else if lower.contains("doc") {
        "documentation"
    } else if lower.contains("deploy") || lower.contains("optimi") {
        "optimization"
    } else if lower.contains("plan") {
        "planner"
    } else {
        "executor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_is_four_linear_phases() {
        let task = Task::new("Build widget", "a simple widget");
        let plan = CorePlanner::new().decompose(&task);
        assert_eq!(plan.steps.len(), 4);
        assert_eq!(plan.critical_path.len(), 4);
        assert!(plan.confidence <= 0.85);
    }

    #[test]
    fn complex_keyword_drives_classification() {
        let task = Task::new("Migrate billing to new architecture", "distributed rewrite");
        assert_eq!(classify_complexity(&task), ComplexityClass::Complex);
    }
}
