//! Units of work and their outcomes
//!
//! Tasks and results are passed by value between the coordinator, actors and the
//! workflow executor; nothing here is shared by reference across actors.

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    time::Duration
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique task identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random task id with a readable prefix
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{}-{}", prefix, Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Advisory priority; never consulted for scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High
}

/// A unit of requested work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id:           TaskId,
    /// Human-readable description of what is asked
    pub description:  String,
    /// Opaque input data
    #[serde(default)]
    pub payload:      Value,
    #[serde(default)]
    pub priority:     Priority,
    /// Outputs of earlier steps, keyed by their step label
    #[serde(default)]
    pub context:      BTreeMap<String, Value>,
    /// Upstream tasks this one logically follows (bookkeeping only)
    #[serde(default)]
    pub dependencies: Vec<TaskId>
}

impl Task {
    pub fn new(id: impl Into<TaskId>, description: impl Into<String>) -> Self {
        Self {
            id:           id.into(),
            description:  description.into(),
            payload:      Value::Null,
            priority:     Priority::default(),
            context:      BTreeMap::new(),
            dependencies: Vec::new()
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_context(mut self, context: BTreeMap<String, Value>) -> Self {
        self.context = context;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<TaskId>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// Why a task did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// The agent ran and reported failure
    Failed,
    /// Nobody observed a terminal event before the deadline
    Timeout,
    /// The agent panicked while processing
    Panicked,
    /// A registered message handler returned an error
    Handler
}

impl Display for TaskErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            TaskErrorKind::Failed => "failed",
            TaskErrorKind::Timeout => "timeout",
            TaskErrorKind::Panicked => "panicked",
            TaskErrorKind::Handler => "handler"
        };
        write!(f, "{}", kind)
    }
}

/// Structured error attached to a failed result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind:    TaskErrorKind,
    pub message: String
}

impl Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Outcome of one task
///
/// On success `data` holds the output; on failure it holds the error description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub success: bool,
    pub data:    Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error:   Option<TaskError>
}

impl TaskResult {
    pub fn success(task_id: TaskId, data: Value) -> Self {
        Self { task_id, success: true, data, error: None }
    }

    pub fn failure(task_id: TaskId, kind: TaskErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            task_id,
            success: false,
            data: Value::String(message.clone()),
            error: Some(TaskError { kind, message })
        }
    }

    /// Synthetic failure for a wait that ran past its deadline
    pub fn timed_out(task_id: TaskId, deadline: Duration) -> Self {
        let message = format!("no terminal event for task '{}' within {:?}", task_id, deadline);
        Self::failure(task_id, TaskErrorKind::Timeout, message)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(&self.error, Some(TaskError { kind: TaskErrorKind::Timeout, .. }))
    }

    /// Output as text, without JSON quoting for plain strings
    pub fn data_text(&self) -> String {
        match &self.data {
            Value::String(text) => text.clone(),
            other => other.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_failure_carries_message_in_data_and_error() {
        let result = TaskResult::failure(TaskId::from("t1"), TaskErrorKind::Failed, "backend refused");

        assert!(!result.success);
        assert_eq!(result.data, json!("backend refused"));
        assert_eq!(result.error.as_ref().map(|e| e.kind), Some(TaskErrorKind::Failed));
        assert!(!result.is_timeout());
    }

    #[test]
    fn test_timeout_is_distinguishable_from_failure() {
        let result = TaskResult::timed_out(TaskId::from("t9"), Duration::from_millis(50));

        assert!(!result.success);
        assert!(result.is_timeout());
        assert!(result.data_text().contains("t9"));
    }

    #[test]
    fn test_task_deserializes_with_defaults() {
        let task: Task = serde_json::from_value(json!({ "id": "t1", "description": "summarise" })).unwrap();

        assert_eq!(task.id, TaskId::from("t1"));
        assert_eq!(task.payload, Value::Null);
        assert_eq!(task.priority, Priority::Normal);
        assert!(task.context.is_empty());
        assert!(task.dependencies.is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = TaskId::generate("step");
        let b = TaskId::generate("step");

        assert_ne!(a, b);
        assert!(a.as_str().starts_with("step-"));
    }
}
