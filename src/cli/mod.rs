//! Command-line interface of the `swarm` binary

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
