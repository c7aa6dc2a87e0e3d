//! Strategy-aware rewrite of the default step DAG (spec §4.6).
//!
//! Each strategy reshapes the linear plan→implement→test→deploy chain the
//! `CorePlanner` produces. The rewrites are deliberately simple template
//! transforms, not a general DAG-rewriting engine - matching the spec's
//! description of each shape.

use tasker_shared::types::{ExecutionPlan, PlanStep, RiskLevel, Strategy, Task};

use super::{classify_complexity, confidence_for, critical_path, CorePlanner};

pub fn decompose_with_strategy(task: &Task, strategy: Strategy) -> ExecutionPlan {
    let steps = build_steps(task, strategy);
    let mut plan = ExecutionPlan::new(task.id, steps);
    plan.complexity = classify_complexity(task);
    plan.confidence = confidence_for(&plan.steps);
    plan.critical_path = critical_path::critical_path(&plan.steps);
    plan.strategy = Some(strategy);
    plan.reasoning = Some(reasoning_for(strategy));
    plan
}

fn build_steps(task: &Task, strategy: Strategy) -> Vec<PlanStep> {
    match strategy {
        Strategy::Spike => {
            let mut research = PlanStep::new(format!("Research: {}", task.title), 60.0);
            let mut implement = PlanStep::new(format!("Implement: {}", task.title), 120.0);
            implement.dependencies.push(research.id);
            let mut test = PlanStep::new(format!("Test: {}", task.title), 45.0);
            test.dependencies.push(implement.id);
            research.risk = RiskLevel::Medium;
            vec![research, implement, test]
        }
        Strategy::Parallel => {
            let root = PlanStep::new(format!("Decompose: {}", task.title), 20.0);
            let mut branch_a = PlanStep::new(format!("Implement part A: {}", task.title), 90.0);
            let mut branch_b = PlanStep::new(format!("Implement part B: {}", task.title), 90.0);
            branch_a.dependencies.push(root.id);
            branch_b.dependencies.push(root.id);
            let mut integrate = PlanStep::new(format!("Integrate: {}", task.title), 40.0);
            integrate.dependencies.push(branch_a.id);
            integrate.dependencies.push(branch_b.id);
            vec![root, branch_a, branch_b, integrate]
        }
        Strategy::QualityFirst => {
            let plan_step = PlanStep::new(format!("Plan: {}", task.title), 30.0);
            let mut implement = PlanStep::new(format!("Implement: {}", task.title), 120.0);
            implement.dependencies.push(plan_step.id);
            let mut test1 = PlanStep::new(format!("Test (unit): {}", task.title), 45.0);
            test1.dependencies.push(implement.id);
            let mut review = PlanStep::new(format!("Review: {}", task.title), 30.0);
            review.dependencies.push(test1.id);
            let mut test2 = PlanStep::new(format!("Test (regression gate): {}", task.title), 45.0);
            test2.dependencies.push(review.id);
            let mut deploy = PlanStep::new(format!("Deploy: {}", task.title), 20.0);
            deploy.dependencies.push(test2.id);
            vec![plan_step, implement, test1, review, test2, deploy]
        }
        Strategy::Experimental => {
            let root = PlanStep::new(format!("Frame experiment: {}", task.title), 20.0);
            let mut branch_a = PlanStep::new(format!("Branch A: {}", task.title), 90.0);
            let mut branch_b = PlanStep::new(format!("Branch B: {}", task.title), 90.0);
            branch_a.dependencies.push(root.id);
            branch_b.dependencies.push(root.id);
            branch_a.risk = RiskLevel::Medium;
            branch_b.risk = RiskLevel::Medium;
            let mut evaluate = PlanStep::new(format!("Evaluate and pick: {}", task.title), 30.0);
            evaluate.dependencies.push(branch_a.id);
            evaluate.dependencies.push(branch_b.id);
            vec![root, branch_a, branch_b, evaluate]
        }
        Strategy::Incremental => {
            let mut steps = Vec::new();
            let mut prev: Option<PlanStep> = None;
            for n in 1..=3 {
                let mut step = PlanStep::new(format!("Increment {n}: {}", task.title), 60.0);
                if let Some(p) = &prev {
                    step.dependencies.push(p.id);
                }
                prev = Some(step.clone());
                steps.push(step);
            }
            steps
        }
        Strategy::BottomUp => {
            let foundation = PlanStep::new(format!("Build foundation: {}", task.title), 60.0);
            let mut compose = PlanStep::new(format!("Compose components: {}", task.title), 60.0);
            compose.dependencies.push(foundation.id);
            let mut integrate = PlanStep::new(format!("Integrate top-level: {}", task.title), 45.0);
            integrate.dependencies.push(compose.id);
            vec![foundation, compose, integrate]
        }
        Strategy::DeadlineDriven => {
            let mut implement = PlanStep::new(format!("Implement (scope-cut): {}", task.title), 90.0);
            implement.risk = RiskLevel::Medium;
            let mut smoke_test = PlanStep::new(format!("Smoke test: {}", task.title), 20.0);
            smoke_test.dependencies.push(implement.id);
            let mut deploy = PlanStep::new(format!("Deploy: {}", task.title), 15.0);
            deploy.dependencies.push(smoke_test.id);
            vec![implement, smoke_test, deploy]
        }
        Strategy::Collaboration => {
            let handoff = PlanStep::new(format!("Align with collaborators: {}", task.title), 30.0);
            let mut implement = PlanStep::new(format!("Implement jointly: {}", task.title), 120.0);
            implement.dependencies.push(handoff.id);
            let mut sync_review = PlanStep::new(format!("Joint review: {}", task.title), 30.0);
            sync_review.dependencies.push(implement.id);
            vec![handoff, implement, sync_review]
        }
        // TopDown and Sequential keep the default linear shape; they differ
        // from the core planner only in framing (spec §4.6 names them as
        // strategies but describes no distinct rewrite).
        Strategy::TopDown | Strategy::Sequential => CorePlanner::new().decompose(task).steps,
    }
}

fn reasoning_for(strategy: Strategy) -> String {
    match strategy {
        Strategy::Spike => "research precedes implementation to retire the riskiest unknown first".into(),
        Strategy::Parallel => "independent branches converge on a single integration step".into(),
        Strategy::QualityFirst => "duplicated test/review gates trade speed for confidence".into(),
        Strategy::Experimental => "two competing branches followed by an evaluate-and-pick node".into(),
        Strategy::Incremental => "small sequential increments, each buildable on the last".into(),
        Strategy::BottomUp => "foundation built first, composition and integration follow".into(),
        Strategy::DeadlineDriven => "scope-cut implementation with a smoke test instead of a full suite".into(),
        Strategy::Collaboration => "explicit alignment and joint review steps bracket implementation".into(),
        Strategy::TopDown | Strategy::Sequential => "default linear plan → implement → test → deploy".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_strategy_has_two_converging_branches() {
        let task = Task::new("Build", "d");
        let plan = decompose_with_strategy(&task, Strategy::Parallel);
        assert_eq!(plan.steps.len(), 4);
        let integrate = plan.steps.last().unwrap();
        assert_eq!(integrate.dependencies.len(), 2);
    }

    #[test]
    fn experimental_strategy_has_evaluate_node() {
        let task = Task::new("Build", "d");
        let plan = decompose_with_strategy(&task, Strategy::Experimental);
        assert_eq!(plan.strategy, Some(Strategy::Experimental));
        assert_eq!(plan.steps.last().unwrap().dependencies.len(), 2);
    }
}
