//! Shared domain types, error taxonomy, configuration, message bus, task
//! store contract, and pluggable LLM/embedding/resilience seams for the
//! autonomous multi-agent coordination runtime.
//!
//! This crate has no orchestration logic of its own - it is the vocabulary
//! `tasker-orchestration` and `tasker-worker` share.

pub mod config;
pub mod error;
pub mod llm;
pub mod messaging;
pub mod resilience;
pub mod store;
pub mod types;

pub use error::{TaskerError, TaskerResult};
