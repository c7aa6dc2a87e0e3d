//! Thin re-export crate tying the orchestration kernel's three crates
//! together under one name; see `src/bin` for a minimal end-to-end demo
//! that wires a bus, an in-memory store, an orchestrator, and a health
//! monitor together.

pub mod worker_factory;

pub use tasker_orchestration as orchestration;
pub use tasker_shared as shared;
pub use tasker_worker as worker;
pub use worker_factory::EchoWorkerFactory;
