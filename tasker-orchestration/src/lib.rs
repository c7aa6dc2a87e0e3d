//! Orchestration layer for the autonomous multi-agent coordination
//! runtime: agent registry and health monitoring, the strategy-aware
//! planner, the Executive Function, episodic-to-semantic consolidation,
//! the predictor, and the orchestration bridge tying goals to task
//! decomposition.
//!
//! This crate holds no wire format or transport of its own - it is built
//! entirely on `tasker-shared`'s types, store contract, and message bus.

pub mod bridge;
pub mod consolidation;
pub mod executive;
pub mod learning;
pub mod orchestrator;
pub mod planner;
pub mod predictor;
pub mod registry;

pub use bridge::{InMemoryMemoryOffload, MemoryOffload, OrchestrationBridge, OrchestrationSnapshot};
pub use learning::LearningIntegration;
pub use orchestrator::{capability_hint_for_agent_type, OrchestrationReport, Orchestrator, WorkerFactory};
pub use registry::{AgentRegistry, HealthMonitor};
