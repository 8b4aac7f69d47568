//! Infrastructure shared across layers: the event bus and logging setup

pub mod event_bus;
pub mod logging;

pub use event_bus::{EventBus, EventBusError, EventReceiver, TaskEventReceiver, spawn_event_logger};
