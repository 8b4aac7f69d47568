//! Broadcast records published on the event bus
//!
//! Events are immutable and fire-and-forget: they are never retried or persisted.

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{
    state::ActorId,
    task::{TaskId, TaskResult}
};

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A task message was dequeued by an actor
    Received,
    /// An actor began processing a task
    Started,
    /// Processing finished with a successful result
    Completed,
    /// Processing finished with a failed result, or a handler errored
    Failed,
    /// Anything else, tagged with a free-form name
    Custom(String)
}

impl EventKind {
    /// Completed and Failed end a task's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Completed | EventKind::Failed)
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Received => write!(f, "received"),
            EventKind::Started => write!(f, "started"),
            EventKind::Completed => write!(f, "completed"),
            EventKind::Failed => write!(f, "failed"),
            EventKind::Custom(name) => write!(f, "custom:{}", name)
        }
    }
}

/// Optional structured body of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EventPayload {
    Result(TaskResult),
    Data(Value)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id:  String,
    pub kind:      EventKind,
    pub timestamp: DateTime<Utc>,
    /// Originating actor (or the coordinator's own id for lifecycle events)
    pub actor_id:  ActorId,
    pub task_id:   Option<TaskId>,
    pub message:   String,
    pub payload:   Option<EventPayload>
}

impl Event {
    pub fn new(kind: EventKind, actor_id: ActorId, message: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            kind,
            timestamp: Utc::now(),
            actor_id,
            task_id: None,
            message: message.into(),
            payload: None
        }
    }

    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Attach a result; also sets the task id from it
    pub fn with_result(mut self, result: TaskResult) -> Self {
        self.task_id = Some(result.task_id.clone());
        self.payload = Some(EventPayload::Result(result));
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.payload = Some(EventPayload::Data(data));
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// Whether this event ends the lifecycle of `task_id`
    pub fn terminates(&self, task_id: &TaskId) -> bool {
        self.is_terminal() && self.task_id.as_ref() == Some(task_id)
    }

    pub fn result(&self) -> Option<&TaskResult> {
        match &self.payload {
            Some(EventPayload::Result(result)) => Some(result),
            _ => None
        }
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.task_id {
            Some(task_id) => write!(f, "[{}] {} task={} {}", self.kind, self.actor_id, task_id, self.message),
            None => write!(f, "[{}] {} {}", self.kind, self.actor_id, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_with_result_sets_task_id() {
        let result = TaskResult::success(TaskId::from("t1"), json!("done"));
        let event = Event::new(EventKind::Completed, ActorId::from("a1"), "ok").with_result(result.clone());

        assert_eq!(event.task_id, Some(TaskId::from("t1")));
        assert_eq!(event.result(), Some(&result));
        assert!(event.terminates(&TaskId::from("t1")));
        assert!(!event.terminates(&TaskId::from("t2")));
    }

    #[test]
    fn test_only_completed_and_failed_are_terminal() {
        assert!(EventKind::Completed.is_terminal());
        assert!(EventKind::Failed.is_terminal());
        assert!(!EventKind::Received.is_terminal());
        assert!(!EventKind::Started.is_terminal());
        assert!(!EventKind::Custom("actor.started".to_string()).is_terminal());
    }

    #[test]
    fn test_display_includes_task() {
        let event = Event::new(EventKind::Started, ActorId::from("writer"), "drafting").with_task(TaskId::from("t3"));

        assert_eq!(event.to_string(), "[started] writer task=t3 drafting");
    }
}
