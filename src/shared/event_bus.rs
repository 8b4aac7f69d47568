//! Event bus for best-effort fan-out of engine events
//!
//! Every subscriber owns a bounded buffer. Publishing tries each buffer without
//! waiting; a full buffer loses that one event while every other subscriber still
//! receives it. The bus is a diagnostic and synchronization aid, not a system of
//! record, so nothing is retried or persisted.

use std::sync::{
    Arc, PoisonError, RwLock,
    atomic::{AtomicBool, AtomicU64, Ordering}
};

use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle
};
use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

use crate::domain::{
    constant::{DEFAULT_SUBSCRIBER_CAPACITY, event_bus},
    error::SwarmError,
    event::{Event, EventKind},
    task::TaskId
};

struct BusInner {
    subscribers: RwLock<Vec<mpsc::Sender<Event>>>,
    capacity:    usize,
    closed:      AtomicBool,
    dropped:     AtomicU64
}

/// Multicast, drop-on-full event channel
///
/// Cloning is cheap and every clone publishes to the same subscriber list.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>
}

impl EventBus {
    /// Create a bus whose subscribers each buffer up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: RwLock::new(Vec::new()),
                capacity:    capacity.max(1),
                closed:      AtomicBool::new(false),
                dropped:     AtomicU64::new(0)
            })
        }
    }

    /// Create event bus with default capacity (100)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    /// Register a new bounded sink and return its receiving end
    ///
    /// After [`close`](Self::close) the returned receiver is already closed.
    pub fn subscribe(&self) -> EventReceiver {
        let (sender, receiver) = mpsc::channel(self.inner.capacity);

        // checked under the lock so a concurrent close cannot miss this sender
        let mut subscribers = self.inner.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return EventReceiver { receiver };
        }
        subscribers.push(sender);
        event!(Level::TRACE, event = event_bus::SUBSCRIBED, subscribers = subscribers.len());

        EventReceiver { receiver }
    }

    /// Subscribe and filter for a single task
    pub fn subscribe_task(&self, task_id: TaskId) -> TaskEventReceiver {
        TaskEventReceiver { receiver: self.subscribe(), task_id }
    }

    /// Offer the event to every subscriber without ever waiting
    pub fn publish(&self, event: Event) {
        if self.is_closed() {
            return;
        }

        let mut saw_closed = false;
        {
            let subscribers = self.inner.subscribers.read().unwrap_or_else(PoisonError::into_inner);
            for sender in subscribers.iter() {
                match sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(dropped)) => {
                        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                        event!(Level::DEBUG, event = event_bus::EVENT_DROPPED,
                               kind = %dropped.kind, actor_id = %dropped.actor_id);
                    }
                    Err(TrySendError::Closed(_)) => saw_closed = true
                }
            }
        }

        if saw_closed {
            self.prune_closed();
        }
    }

    /// Close every sink; later publishes reach nobody
    ///
    /// Receivers still drain whatever was buffered before the close.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut subscribers = self.inner.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        let count = subscribers.len();
        subscribers.clear();
        event!(Level::DEBUG, event = event_bus::BUS_CLOSED, subscribers = count);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Get the number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Events lost to full subscriber buffers since creation
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    fn prune_closed(&self) {
        let mut subscribers = self.inner.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|sender| !sender.is_closed());
        event!(Level::TRACE, event = event_bus::SUBSCRIBER_PRUNED, pruned = before - subscribers.len());
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Receiver for all bus events
pub struct EventReceiver {
    receiver: mpsc::Receiver<Event>
}

impl EventReceiver {
    /// Receive the next event, waiting until one is available
    pub async fn recv(&mut self) -> Result<Event, EventBusError> {
        self.receiver.recv().await.ok_or(EventBusError::Closed)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Event, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            mpsc::error::TryRecvError::Empty => EventBusError::Empty,
            mpsc::error::TryRecvError::Disconnected => EventBusError::Closed
        })
    }
}

/// Receiver that only yields events about one task
pub struct TaskEventReceiver {
    receiver: EventReceiver,
    task_id:  TaskId
}

impl TaskEventReceiver {
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Next event for this task; events about other tasks are discarded
    pub async fn recv(&mut self) -> Result<Event, EventBusError> {
        loop {
            let event = self.receiver.recv().await?;
            if event.task_id.as_ref() == Some(&self.task_id) {
                return Ok(event);
            }
        }
    }

    /// Wait for the Completed or Failed event of this task
    pub async fn recv_terminal(&mut self) -> Result<Event, EventBusError> {
        loop {
            let event = self.recv().await?;
            if event.is_terminal() {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty
}

impl From<EventBusError> for SwarmError {
    fn from(err: EventBusError) -> Self {
        SwarmError::EventBus(err.to_string())
    }
}

/// Mirror every bus event into the log until cancelled or the bus closes
pub fn spawn_event_logger(bus: &EventBus, token: CancellationToken) -> JoinHandle<()> {
    let mut receiver = bus.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                received = receiver.recv() => match received {
                    Ok(observed) => log_event(&observed),
                    Err(_) => break
                }
            }
        }
    })
}

fn log_event(observed: &Event) {
    let task_id = observed.task_id.as_ref().map(ToString::to_string).unwrap_or_default();
    match observed.kind {
        EventKind::Failed => {
            event!(Level::WARN, event = event_bus::EVENT_OBSERVED, kind = %observed.kind,
                   actor_id = %observed.actor_id, task_id = %task_id, message = %observed.message);
        }
        _ => {
            event!(Level::DEBUG, event = event_bus::EVENT_OBSERVED, kind = %observed.kind,
                   actor_id = %observed.actor_id, task_id = %task_id, message = %observed.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::domain::{state::ActorId, task::TaskResult};

    fn sample(kind: EventKind, task: &str) -> Event {
        Event::new(kind, ActorId::from("a1"), "sample").with_task(TaskId::from(task))
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        bus.publish(sample(EventKind::Started, "t1"));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.kind, EventKind::Started);
        assert_eq!(received.task_id, Some(TaskId::from("t1")));
    }

    #[tokio::test]
    async fn test_every_subscriber_gets_one_copy() {
        let bus = EventBus::new(10);
        let mut receivers: Vec<_> = (0..4).map(|_| bus.subscribe()).collect();

        bus.publish(sample(EventKind::Completed, "t1"));

        for receiver in receivers.iter_mut() {
            assert_eq!(receiver.try_recv().unwrap().kind, EventKind::Completed);
            assert_eq!(receiver.try_recv(), Err(EventBusError::Empty));
        }
    }

    #[tokio::test]
    async fn test_full_subscriber_does_not_block_or_starve_others() {
        let bus = EventBus::new(2);
        let mut stalled = bus.subscribe();
        let mut healthy = bus.subscribe();

        for i in 0..2 {
            bus.publish(sample(EventKind::Received, &format!("fill-{i}")));
        }
        // drain only the healthy sink so the stalled one stays full
        healthy.try_recv().unwrap();
        healthy.try_recv().unwrap();

        let publish = tokio::time::timeout(Duration::from_millis(100), async {
            bus.publish(sample(EventKind::Completed, "t-late"));
        });
        publish.await.unwrap();

        assert_eq!(healthy.try_recv().unwrap().task_id, Some(TaskId::from("t-late")));
        assert_eq!(stalled.try_recv().unwrap().task_id, Some(TaskId::from("fill-0")));
        assert_eq!(stalled.try_recv().unwrap().task_id, Some(TaskId::from("fill-1")));
        assert_eq!(stalled.try_recv(), Err(EventBusError::Empty));
        assert_eq!(bus.dropped_count(), 1);
    }

    #[tokio::test]
    async fn test_close_ends_receivers_after_buffered_events() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        bus.publish(sample(EventKind::Started, "t1"));
        bus.close();
        bus.publish(sample(EventKind::Completed, "t1"));

        assert_eq!(receiver.recv().await.unwrap().kind, EventKind::Started);
        assert_eq!(receiver.recv().await, Err(EventBusError::Closed));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_after_close_is_closed() {
        let bus = EventBus::new(10);
        bus.close();

        let mut receiver = bus.subscribe();
        assert_eq!(receiver.try_recv(), Err(EventBusError::Closed));
    }

    #[test]
    fn test_subscribe_racing_close_never_leaves_a_live_receiver() {
        for _ in 0..50 {
            let bus = EventBus::new(4);
            let subscriber = {
                let bus = bus.clone();
                std::thread::spawn(move || (0..20).map(|_| bus.subscribe()).collect::<Vec<_>>())
            };
            bus.close();

            let receivers = subscriber.join().unwrap();
            assert_eq!(bus.subscriber_count(), 0);
            for mut receiver in receivers {
                assert_eq!(receiver.try_recv(), Err(EventBusError::Closed));
            }
        }
    }

    #[tokio::test]
    async fn test_dropped_receivers_are_pruned() {
        let bus = EventBus::new(10);
        let kept = bus.subscribe();
        drop(bus.subscribe());

        assert_eq!(bus.subscriber_count(), 2);
        bus.publish(sample(EventKind::Started, "t1"));
        assert_eq!(bus.subscriber_count(), 1);
        drop(kept);
    }

    #[tokio::test]
    async fn test_task_receiver_filters_and_waits_for_terminal() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe_task(TaskId::from("mine"));

        bus.publish(sample(EventKind::Completed, "other"));
        bus.publish(sample(EventKind::Started, "mine"));
        bus.publish(
            Event::new(EventKind::Completed, ActorId::from("a1"), "done")
                .with_result(TaskResult::success(TaskId::from("mine"), json!("output")))
        );

        let terminal = receiver.recv_terminal().await.unwrap();
        assert_eq!(terminal.kind, EventKind::Completed);
        assert_eq!(terminal.result().map(|r| r.data.clone()), Some(json!("output")));
    }
}
