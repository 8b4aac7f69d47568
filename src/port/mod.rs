//! Traits at the engine's seams: what an actor does with a task, and how text is generated

pub mod agent;
pub mod completion;
