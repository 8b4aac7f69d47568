//! Concrete agents and completion backends behind the port traits

pub mod agent;
pub mod completion;
