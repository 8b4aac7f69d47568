//! # Swarm Engine
//!
//! A concurrent agent-actor engine built on tokio.
//!
//! This crate provides functionality to:
//! - Run agents as actors with bounded mailboxes and an `Idle -> Processing -> Stopped` lifecycle
//! - Register actors with a swarm that routes tasks round-robin and broadcasts to all of them
//! - Fan task lifecycle events out to any number of subscribers without blocking publishers
//! - Execute workflows step by step, threading each output into the next step's context
//!   under a per-step deadline

// Public API modules
pub mod actor;
pub mod adapter;
pub mod cli;
pub mod config;
pub mod domain;
pub mod port;
pub mod shared;
pub mod ui;
pub mod workflow;

// Re-export commonly used types
pub use actor::{Actor, BroadcastPayload, Guardian, Message, Payload, Swarm, SystemHealth};
pub use adapter::{
    agent::{AgentRole, LlmAgent},
    completion::{CompletionFactory, HttpCompletion, MockCompletion}
};
pub use config::{AppConfig, load_config};
pub use domain::{
    error::SwarmError,
    event::{Event, EventKind},
    state::{ActorId, ActorState},
    task::{Priority, Task, TaskId, TaskResult},
    workflow::{WorkflowDefinition, WorkflowReport, WorkflowStatus, WorkflowStep}
};
pub use port::{agent::Agent, completion::Completion};
pub use shared::event_bus::EventBus;
pub use workflow::WorkflowExecutor;
