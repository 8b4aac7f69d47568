//! Actor-based task processing system
//!
//! Bounded-mailbox actors, the swarm that registers and routes work to them,
//! and the guardian that roots the whole hierarchy.

pub mod guardian;
pub mod manager;
pub mod message;
pub mod processor;

pub use guardian::*;
pub use manager::*;
pub use message::*;
pub use processor::*;
