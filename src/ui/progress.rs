//! Progress indicators fed by the event bus

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::event::{Event, EventKind},
    shared::event_bus::EventBus
};

/// Green spinner style for running workflow steps
pub fn step_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Create a ticking spinner with an initial message
pub fn create_step_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(step_spinner_style());
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// One-line description of a task event, or `None` for events the spinner ignores
pub fn describe_event(event: &Event) -> Option<String> {
    let task = event.task_id.as_ref()?;
    let verb = match &event.kind {
        EventKind::Received => "queued",
        EventKind::Started => "working on",
        EventKind::Completed => "finished",
        EventKind::Failed => "failed",
        EventKind::Custom(_) => return None
    };
    Some(format!("{} {} {}", event.actor_id, verb, task))
}

/// Drive `spinner` from bus events until `token` is cancelled or the bus closes
///
/// The spinner is cleared when the task ends.
pub fn spawn_event_spinner(bus: &EventBus, spinner: ProgressBar, token: CancellationToken) -> JoinHandle<()> {
    let mut receiver = bus.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                received = receiver.recv() => match received {
                    Ok(event) => {
                        if let Some(line) = describe_event(&event) {
                            spinner.set_message(line);
                        }
                    }
                    Err(_) => break
                }
            }
        }
        spinner.finish_and_clear();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{state::ActorId, task::TaskId};

    #[test]
    fn test_describe_task_events() {
        let started = Event::new(EventKind::Started, ActorId::new("a1"), "started").with_task(TaskId::new("t1"));
        assert_eq!(describe_event(&started).as_deref(), Some("a1 working on t1"));

        let failed = Event::new(EventKind::Failed, ActorId::new("a2"), "boom").with_task(TaskId::new("t9"));
        assert_eq!(describe_event(&failed).as_deref(), Some("a2 failed t9"));
    }

    #[test]
    fn test_lifecycle_events_are_ignored() {
        let registered = Event::new(EventKind::Custom("registered".into()), ActorId::new("swarm"), "a1");
        assert!(describe_event(&registered).is_none());

        let untagged = Event::new(EventKind::Failed, ActorId::new("a1"), "handler error");
        assert!(describe_event(&untagged).is_none());
    }

    #[tokio::test]
    async fn test_spinner_task_ends_when_bus_closes() {
        let bus = EventBus::new(8);
        let handle = spawn_event_spinner(&bus, ProgressBar::hidden(), CancellationToken::new());

        bus.publish(Event::new(EventKind::Received, ActorId::new("a1"), "queued").with_task(TaskId::new("t1")));
        bus.close();

        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
