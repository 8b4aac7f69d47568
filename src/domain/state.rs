//! Actor identity and lifecycle state
//!
//! An actor moves `Idle -> Processing -> Stopped`. `Processing` means the run loop
//! has been started and is able to dequeue, not that a message is being handled
//! right now. `Stopped` is terminal.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Unique, immutable actor identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ActorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle state of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorState {
    /// Created, never started
    #[default]
    Idle,
    /// Started; the run loop is live
    Processing,
    /// Terminal
    Stopped
}

impl ActorState {
    /// Whether the coordinator may route work to an actor in this state
    pub fn accepts_work(&self) -> bool {
        !matches!(self, ActorState::Stopped)
    }
}

impl Display for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            ActorState::Idle => "idle",
            ActorState::Processing => "processing",
            ActorState::Stopped => "stopped"
        };
        write!(f, "{}", state)
    }
}
