//! Structured log event names and engine defaults

/// Mailbox capacity per actor
pub const DEFAULT_MAILBOX_CAPACITY: usize = 100;
/// Buffer size of each event bus subscriber
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 100;
/// Per-step wait deadline of the workflow executor, in seconds
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 60;
/// Rolling exchange history kept by an LLM agent
pub const DEFAULT_HISTORY_LIMIT: usize = 6;

/// Actor run loop events
pub mod actor {
    pub const ACTOR_STARTED: &str = "actor.started";
    pub const ACTOR_STOPPING: &str = "actor.stopping";
    pub const ACTOR_STOPPED: &str = "actor.stopped";
    pub const MESSAGE_RECEIVED: &str = "message.received";
    pub const MESSAGE_REJECTED: &str = "message.rejected";
    pub const HANDLER_REGISTERED: &str = "handler.registered";
    pub const HANDLER_FAILED: &str = "handler.failed";
    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_FAILED: &str = "task.failed";
}

/// Coordinator events
pub mod swarm {
    pub const SWARM_ID: &str = "swarm";
    pub const ACTOR_REGISTERED: &str = "actor.registered";
    pub const ACTOR_DEREGISTERED: &str = "actor.deregistered";
    pub const START_ALL: &str = "swarm.start_all";
    pub const STOP_ALL: &str = "swarm.stop_all";
    pub const TASK_DISTRIBUTED: &str = "task.distributed";
    pub const DISTRIBUTION_FAILED: &str = "task.distribution_failed";
    pub const BROADCAST_SENT: &str = "broadcast.sent";
}

/// Event bus events
pub mod event_bus {
    pub const SUBSCRIBED: &str = "bus.subscribed";
    pub const EVENT_DROPPED: &str = "bus.event_dropped";
    pub const SUBSCRIBER_PRUNED: &str = "bus.subscriber_pruned";
    pub const BUS_CLOSED: &str = "bus.closed";
    pub const EVENT_OBSERVED: &str = "bus.event_observed";
}

/// Workflow executor events
pub mod workflow {
    pub const WORKFLOW_STARTED: &str = "workflow.started";
    pub const WORKFLOW_COMPLETED: &str = "workflow.completed";
    pub const WORKFLOW_FAILED: &str = "workflow.failed";
    pub const STEP_DISTRIBUTED: &str = "step.distributed";
    pub const STEP_COMPLETED: &str = "step.completed";
    pub const STEP_FAILED: &str = "step.failed";
    pub const STEP_TIMED_OUT: &str = "step.timed_out";
}

/// Guardian (root) events
pub mod guardian {
    pub const SYSTEM_STARTING: &str = "system.starting";
    pub const SYSTEM_INITIALIZED: &str = "system.initialized";
    pub const SYSTEM_SHUTDOWN_STARTED: &str = "system.shutdown_started";
    pub const SYSTEM_SHUTDOWN_COMPLETED: &str = "system.shutdown_completed";
    pub const HEALTH_CHECK_COMPLETED: &str = "health.check_completed";
}

/// Agent and completion backend events
pub mod agent {
    pub const COMPLETION_REQUESTED: &str = "completion.requested";
    pub const COMPLETION_FAILED: &str = "completion.failed";
    pub const BACKEND_SELECTED: &str = "completion.backend_selected";
}

/// Command-line front end events
pub mod cli {
    pub const COMMAND_STARTED: &str = "cli.command_started";
    pub const INTERRUPTED: &str = "cli.interrupted";
    pub const SHUTDOWN_FAILED: &str = "cli.shutdown_failed";
}
