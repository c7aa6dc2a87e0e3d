//! Domain types (spec §3).

pub mod agent;
pub mod episodic;
pub mod goal;
pub mod message;
pub mod plan;
pub mod prediction;
pub mod semantic_pattern;
pub mod strategy;
pub mod task;
pub mod task_switch;

pub use agent::{Agent, AgentMetrics, AgentStatus, AgentType};
pub use episodic::{ConsolidationStatus, EpisodicEvent, EventContext, EventType, Outcome};
pub use goal::{Goal, GoalStatus, GoalType, MAX_GOAL_DEPTH};
pub use message::{Message, MessageKind, Payload};
pub use plan::{ComplexityClass, ExecutionPlan, PlanStep, ResourceMap, RiskLevel as PlanRiskLevel};
pub use prediction::{
    BottleneckAlert, BottleneckSeverity, ConfidenceInterval, PredictionResult, RiskLevel,
    TemporalPattern,
};
pub use semantic_pattern::{HallucinationRisk, PatternType, SemanticPattern, ValidationMetadata};
pub use strategy::Strategy;
pub use task::{Task, TaskPriority, TaskStatus};
pub use task_switch::{switch_cost_ms, TaskSwitch, SWITCH_COST_CEILING_MS, SWITCH_COST_FLOOR_MS};
