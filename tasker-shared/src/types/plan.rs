//! ExecutionPlan / PlanStep: output of decomposition (spec §3, §4.6).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityClass {
    Simple,
    Medium,
    Complex,
}

/// {cpu, memory, io, network, disk} → normalized utilization/demand.
pub type ResourceMap = HashMap<String, f64>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: Uuid,
    pub description: String,
    pub estimated_duration_minutes: f64,
    pub estimated_resources: ResourceMap,
    pub dependencies: Vec<Uuid>,
    /// Relative importance within the plan, used by the critical path and
    /// strategy rewrites.
    pub salience: f64,
    pub risk: RiskLevel,
    pub success_criteria: Vec<String>,
    pub preconditions: Vec<String>,
}

impl PlanStep {
    pub fn new(description: impl Into<String>, estimated_duration_minutes: f64) -> Self {
        Self {
            id: Uuid::now_v7(),
            description: description.into(),
            estimated_duration_minutes,
            estimated_resources: ResourceMap::new(),
            dependencies: Vec::new(),
            salience: 0.5,
            risk: RiskLevel::Low,
            success_criteria: Vec::new(),
            preconditions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: Uuid,
    pub task_id: Uuid,
    pub steps: Vec<PlanStep>,
    pub estimated_duration_minutes: f64,
    pub estimated_resources: ResourceMap,
    pub confidence: f64,
    pub complexity: ComplexityClass,
    /// Ordered step ids, longest-duration path through the dependency DAG.
    pub critical_path: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Only set for plans produced by the strategy-aware decomposer.
    pub strategy: Option<crate::types::Strategy>,
    pub reasoning: Option<String>,
}

impl ExecutionPlan {
    pub fn new(task_id: Uuid, steps: Vec<PlanStep>) -> Self {
        let estimated_duration_minutes = steps.iter().map(|s| s.estimated_duration_minutes).sum();
        let mut estimated_resources = ResourceMap::new();
        for step in &steps {
            for (k, v) in &step.estimated_resources {
                *estimated_resources.entry(k.clone()).or_insert(0.0) += v;
            }
        }
        Self {
            id: Uuid::now_v7(),
            task_id,
            steps,
            estimated_duration_minutes,
            estimated_resources,
            confidence: 0.85,
            complexity: ComplexityClass::Medium,
            critical_path: Vec::new(),
            created_at: Utc::now(),
            strategy: None,
            reasoning: None,
        }
    }

    pub fn step(&self, id: Uuid) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}
