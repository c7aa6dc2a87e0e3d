//! Illustrative `TaskExecutor`: completes every task it is handed without
//! doing anything domain-specific, useful for wiring demos and exercising
//! the claim loop end to end without a real specialist behind it.

use std::collections::HashSet;

use async_trait::async_trait;
use tasker_shared::types::Task;
use tasker_shared::TaskerResult;
use tracing::debug;

use crate::worker::TaskExecutor;

pub struct EchoWorker {
    capabilities: HashSet<String>,
}

impl EchoWorker {
    pub fn new(capabilities: HashSet<String>) -> Self {
        Self { capabilities }
    }
}

#[async_trait]
impl TaskExecutor for EchoWorker {
    fn capabilities(&self) -> HashSet<String> {
        self.capabilities.clone()
    }

    async fn execute(&self, task: &Task) -> TaskerResult<()> {
        debug!(task_id = %task.id, title = %task.title, "echoing task");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_worker_always_succeeds() {
        let worker = EchoWorker::new(HashSet::from(["capability:executor".to_string()]));
        let task = Task::new("demo", "demo task");
        assert!(worker.execute(&task).await.is_ok());
    }
}
