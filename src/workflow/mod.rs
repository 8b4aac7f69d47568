//! Workflow definitions and their sequential execution

pub mod executor;
pub mod parser;

pub use executor::{WorkflowExecutor, render_description};
