//! Domain types shared by every layer: ids, tasks, events, workflows and errors

pub mod constant;
pub mod error;
pub mod event;
pub mod state;
pub mod task;
pub mod workflow;
