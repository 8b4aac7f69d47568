use std::fmt;

use thiserror::Error;

use crate::domain::state::ActorId;

/// Common error types for the swarm engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwarmError {
    /// The actor's bounded mailbox has no free slot
    #[error("mailbox of actor '{0}' is full")]
    MailboxFull(ActorId),

    /// The actor has been stopped and no longer accepts messages
    #[error("actor '{0}' is stopped")]
    Stopped(ActorId),

    /// `start` was called on an actor that is not idle
    #[error("actor '{0}' is already running")]
    AlreadyRunning(ActorId),

    /// An actor with the same id is already registered
    #[error("actor '{0}' is already registered")]
    DuplicateId(ActorId),

    /// No actor with this id is registered
    #[error("actor '{0}' not found")]
    NotFound(ActorId),

    /// The registry is empty or every actor is stopped
    #[error("no available actor to accept the task")]
    NoAvailableActor,

    /// Several per-actor operations failed
    #[error("{} actor operation(s) failed: {}", .0.len(), ActorFailure::join(.0))]
    Aggregate(Vec<ActorFailure>),

    /// A message handler returned an error
    #[error("{0}")]
    Handler(String),

    /// The language completion backend failed
    #[error("{0}")]
    Completion(String),

    /// Configuration related errors
    #[error("{0}")]
    Configuration(String),

    /// Serialization/deserialization errors
    #[error("{0}")]
    Serialization(String),

    /// Event bus errors
    #[error("{0}")]
    EventBus(String)
}

/// One failed operation inside an [`SwarmError::Aggregate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorFailure {
    pub actor_id: ActorId,
    pub error:    Box<SwarmError>
}

impl ActorFailure {
    pub fn new(actor_id: ActorId, error: SwarmError) -> Self {
        Self { actor_id, error: Box::new(error) }
    }

    fn join(failures: &[ActorFailure]) -> String {
        failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    }
}

impl fmt::Display for ActorFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.actor_id, self.error)
    }
}

impl SwarmError {
    /// Collapse collected per-actor failures into a result
    pub fn aggregate(failures: Vec<ActorFailure>) -> Result<(), SwarmError> {
        if failures.is_empty() { Ok(()) } else { Err(SwarmError::Aggregate(failures)) }
    }

    /// Capacity errors can be retried after backing off
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SwarmError::MailboxFull(_) | SwarmError::NoAvailableActor)
    }
}

/// Convert from anyhow::Error
impl From<anyhow::Error> for SwarmError {
    fn from(err: anyhow::Error) -> Self {
        SwarmError::Configuration(err.to_string())
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for SwarmError {
    fn from(err: std::io::Error) -> Self {
        SwarmError::Configuration(err.to_string())
    }
}

/// Convert from serde_yaml::Error
impl From<serde_yaml::Error> for SwarmError {
    fn from(err: serde_yaml::Error) -> Self {
        SwarmError::Serialization(err.to_string())
    }
}

/// Convert from serde_json::Error
impl From<serde_json::Error> for SwarmError {
    fn from(err: serde_json::Error) -> Self {
        SwarmError::Serialization(err.to_string())
    }
}

/// Convert from reqwest::Error
impl From<reqwest::Error> for SwarmError {
    fn from(err: reqwest::Error) -> Self {
        SwarmError::Completion(err.to_string())
    }
}
