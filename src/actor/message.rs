//! Typed messages for actor communication
//!
//! The payload is a closed sum type, so a handler matches exhaustively instead of
//! inspecting an untyped body at runtime.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    state::ActorId,
    task::{Task, TaskId, TaskResult}
};

/// Same message delivered to every registered actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastPayload {
    pub topic: String,
    #[serde(default)]
    pub data:  Value
}

impl BroadcastPayload {
    pub fn new(topic: impl Into<String>, data: Value) -> Self {
        Self { topic: topic.into(), data }
    }
}

/// Read-only request answered by a registered query handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub name: String,
    #[serde(default)]
    pub args: Value
}

impl Query {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self { name: name.into(), args }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum Payload {
    Task(Task),
    Result(TaskResult),
    Broadcast(BroadcastPayload),
    Query(Query)
}

/// Dispatch tag; handlers are registered per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Task,
    Result,
    Broadcast,
    Query
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            MessageKind::Task => "task",
            MessageKind::Result => "result",
            MessageKind::Broadcast => "broadcast",
            MessageKind::Query => "query"
        };
        write!(f, "{}", kind)
    }
}

/// Envelope placed in an actor's mailbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender:    ActorId,
    pub recipient: Option<ActorId>,
    pub payload:   Payload
}

impl Message {
    pub fn new(sender: ActorId, recipient: Option<ActorId>, payload: Payload) -> Self {
        Self { sender, recipient, payload }
    }

    pub fn task(sender: ActorId, recipient: Option<ActorId>, task: Task) -> Self {
        Self::new(sender, recipient, Payload::Task(task))
    }

    pub fn broadcast(sender: ActorId, broadcast: BroadcastPayload) -> Self {
        Self::new(sender, None, Payload::Broadcast(broadcast))
    }

    pub fn kind(&self) -> MessageKind {
        match &self.payload {
            Payload::Task(_) => MessageKind::Task,
            Payload::Result(_) => MessageKind::Result,
            Payload::Broadcast(_) => MessageKind::Broadcast,
            Payload::Query(_) => MessageKind::Query
        }
    }

    /// Task this message is about, for task and result payloads
    pub fn task_id(&self) -> Option<&TaskId> {
        match &self.payload {
            Payload::Task(task) => Some(&task.id),
            Payload::Result(result) => Some(&result.task_id),
            Payload::Broadcast(_) | Payload::Query(_) => None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_kind_follows_payload() {
        let sender = ActorId::from("swarm");

        let task = Message::task(sender.clone(), Some(ActorId::from("a1")), Task::new("t1", "work"));
        let broadcast = Message::broadcast(sender.clone(), BroadcastPayload::new("reset", json!({})));
        let query = Message::new(sender, None, Payload::Query(Query::new("history", Value::Null)));

        assert_eq!(task.kind(), MessageKind::Task);
        assert_eq!(task.task_id(), Some(&TaskId::from("t1")));
        assert_eq!(broadcast.kind(), MessageKind::Broadcast);
        assert_eq!(broadcast.task_id(), None);
        assert_eq!(query.kind(), MessageKind::Query);
    }
}
