use async_trait::async_trait;
use serde_json::Value;

use crate::domain::task::{Task, TaskResult};

/// The work an actor performs for each task it dequeues
///
/// An actor calls `process_task` from its run loop one task at a time, so an
/// implementation may keep mutable per-agent state (history, counters) without
/// any locking of its own.
#[async_trait]
pub trait Agent: Send + 'static {
    /// Name used in logs and events
    fn name(&self) -> &str;

    /// Process one task; failures are reported in the result, never raised
    async fn process_task(&mut self, task: &Task) -> TaskResult {
        TaskResult::success(task.id.clone(), Value::Null)
    }
}

/// Agent that accepts every task and does nothing with it
#[derive(Debug, Clone, Default)]
pub struct DefaultAgent;

impl Agent for DefaultAgent {
    fn name(&self) -> &str {
        "default"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_agent_succeeds_trivially() {
        let mut agent = DefaultAgent;
        let result = agent.process_task(&Task::new("t1", "anything")).await;

        assert!(result.success);
        assert_eq!(result.task_id.as_str(), "t1");
        assert!(result.error.is_none());
    }
}
