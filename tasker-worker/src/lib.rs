//! Specialist Worker (spec §4.4): the abstract poll-claim-execute-report
//! loop every concrete agent runs, plus one illustrative implementation.
//!
//! A worker owns no orchestration logic - it only claims work that
//! matches its declared capabilities, hands it to a `TaskExecutor`, and
//! reports the outcome back through the task store, heartbeating over the
//! shared message bus so the orchestrator's health monitor can see it's
//! alive.

pub mod echo;
pub mod worker;

pub use echo::EchoWorker;
pub use worker::{SpecialistWorker, TaskExecutor, WorkerConfig};
