//! Critical path: depth-first enumeration of every root-to-leaf path
//! through the step dependency DAG, argmax by summed duration (spec §4.6).

use std::collections::HashMap;

use tasker_shared::types::PlanStep;
use uuid::Uuid;

pub fn critical_path(steps: &[PlanStep]) -> Vec<Uuid> {
    if steps.is_empty() {
        return Vec::new();
    }

    let by_id: HashMap<Uuid, &PlanStep> = steps.iter().map(|s| (s.id, s)).collect();
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for step in steps {
        for dep in &step.dependencies {
            children.entry(*dep).or_default().push(step.id);
        }
    }
    let roots: Vec<Uuid> = steps
        .iter()
        .filter(|s| s.dependencies.is_empty())
        .map(|s| s.id)
        .collect();

    let mut best: Vec<Uuid> = Vec::new();
    let mut best_duration = f64::MIN;

    for root in roots {
        let mut path = vec![root];
        walk(root, &children, &by_id, &mut path, &mut best, &mut best_duration);
    }

    best
}

fn walk(
    current: Uuid,
    children: &HashMap<Uuid, Vec<Uuid>>,
    by_id: &HashMap<Uuid, &PlanStep>,
    path: &mut Vec<Uuid>,
    best: &mut Vec<Uuid>,
    best_duration: &mut f64,
) {
    match children.get(&current) {
        Some(next_nodes) if !next_nodes.is_empty() => {
            for &next in next_nodes {
                path.push(next);
                walk(next, children, by_id, path, best, best_duration);
                path.pop();
            }
        }
        _ => {
            let duration: f64 = path.iter().filter_map(|id| by_id.get(id)).map(|s| s.estimated_duration_minutes).sum();
            if duration > *best_duration {
                *best_duration = duration;
                *best = path.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_longest_branch() {
        let mut short = PlanStep::new("short", 10.0);
        let mut long = PlanStep::new("long", 100.0);
        let root = PlanStep::new("root", 5.0);
        short.dependencies.push(root.id);
        long.dependencies.push(root.id);

        let path = critical_path(&[root.clone(), short.clone(), long.clone()]);
        assert_eq!(path, vec![root.id, long.id]);
    }
}
