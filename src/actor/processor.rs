//! Actor - bounded mailbox, lifecycle and sequential message dispatch
//!
//! Each started actor owns one spawned run loop that handles its messages strictly
//! one at a time in send order:
//! - Handler: registered per message kind, last registration wins
//! - Agent: fallback for task messages without a handler
//! - Event bus: optional, receives task lifecycle events

use std::{
    any::Any,
    collections::HashMap,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock}
};

use futures::{FutureExt, future::BoxFuture};
use serde_json::{Value, json};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle
};
use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

use crate::{
    actor::message::{Message, MessageKind, Payload},
    domain::{
        constant::{DEFAULT_MAILBOX_CAPACITY, actor},
        error::SwarmError,
        event::{Event, EventKind},
        state::{ActorId, ActorState},
        task::{Task, TaskErrorKind, TaskId, TaskResult}
    },
    port::agent::{Agent, DefaultAgent},
    shared::event_bus::EventBus
};

pub type HandlerFuture = BoxFuture<'static, Result<(), SwarmError>>;
/// Message handler; errors and panics are contained by the run loop
pub type Handler = Arc<dyn Fn(Message) -> HandlerFuture + Send + Sync>;

type HandlerMap = Arc<RwLock<HashMap<MessageKind, Handler>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Independently scheduled unit with a private bounded mailbox
pub struct Actor {
    id:       ActorId,
    capacity: usize,
    /// Shared with the run loop, which marks the actor stopped when it exits
    state:    Arc<Mutex<ActorState>>,
    sender:   mpsc::Sender<Message>,
    /// Present while no run loop owns the receiving end
    mailbox:  Mutex<Option<mpsc::Receiver<Message>>>,
    handlers: HandlerMap,
    /// Moved into the run loop on start
    agent:    Mutex<Option<Box<dyn Agent>>>,
    bus:      Mutex<Option<EventBus>>,
    scope:    Mutex<Option<CancellationToken>>,
    run_loop: Mutex<Option<JoinHandle<mpsc::Receiver<Message>>>>,
    stopping: tokio::sync::Mutex<()>
}

impl Actor {
    /// Create an idle actor with the default mailbox capacity (100)
    pub fn new(id: impl Into<ActorId>, agent: impl Agent) -> Self {
        Self::with_capacity(id, DEFAULT_MAILBOX_CAPACITY, agent)
    }

    pub fn with_capacity(id: impl Into<ActorId>, capacity: usize, agent: impl Agent) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let agent: Box<dyn Agent> = Box::new(agent);

        Self {
            id: id.into(),
            capacity,
            state: Arc::new(Mutex::new(ActorState::Idle)),
            sender,
            mailbox: Mutex::new(Some(receiver)),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            agent: Mutex::new(Some(agent)),
            bus: Mutex::new(None),
            scope: Mutex::new(None),
            run_loop: Mutex::new(None),
            stopping: tokio::sync::Mutex::new(())
        }
    }

    /// Actor whose tasks succeed trivially
    pub fn with_default_agent(id: impl Into<ActorId>) -> Self {
        Self::new(id, DefaultAgent)
    }

    /// Publish task lifecycle events to `bus` (takes effect on the next start)
    pub fn with_bus(self, bus: EventBus) -> Self {
        self.attach_bus(bus);
        self
    }

    pub fn attach_bus(&self, bus: EventBus) {
        *lock(&self.bus) = Some(bus);
    }

    pub fn id(&self) -> &ActorId {
        &self.id
    }

    pub fn state(&self) -> ActorState {
        *lock(&self.state)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Messages waiting in the mailbox
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Associate `handler` with a message kind, replacing any earlier one
    ///
    /// Safe to call while the run loop is live; the next message of that kind uses it.
    pub fn register_handler<F, Fut>(&self, kind: MessageKind, handler: F)
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SwarmError>> + Send + 'static
    {
        let handler: Handler = Arc::new(move |message| handler(message).boxed());
        self.handlers.write().unwrap_or_else(PoisonError::into_inner).insert(kind, handler);

        event!(Level::DEBUG, event = actor::HANDLER_REGISTERED, actor_id = %self.id, kind = %kind);
    }

    /// Launch the run loop under a child of `parent`; returns immediately
    pub fn start(&self, parent: &CancellationToken) -> Result<(), SwarmError> {
        let mut state = lock(&self.state);
        if *state != ActorState::Idle {
            return Err(SwarmError::AlreadyRunning(self.id.clone()));
        }

        let Some(receiver) = lock(&self.mailbox).take() else {
            return Err(SwarmError::AlreadyRunning(self.id.clone()));
        };
        let agent = lock(&self.agent).take().unwrap_or_else(|| Box::new(DefaultAgent) as Box<dyn Agent>);
        let token = parent.child_token();

        event!(Level::DEBUG, event = actor::ACTOR_STARTED, actor_id = %self.id, agent = %agent.name());

        let run = RunLoop {
            id: self.id.clone(),
            receiver,
            state: self.state.clone(),
            agent,
            handlers: self.handlers.clone(),
            bus: lock(&self.bus).clone(),
            token: token.clone()
        };

        *lock(&self.scope) = Some(token);
        *lock(&self.run_loop) = Some(tokio::spawn(run.run()));
        *state = ActorState::Processing;

        Ok(())
    }

    /// Cancel the run loop, wait for it to exit, then close the mailbox
    ///
    /// Idempotent. The message being handled when cancellation fires is finished;
    /// anything still queued is discarded. An actor whose parent scope was
    /// cancelled is already stopped; this only reaps its run loop.
    pub async fn stop(&self) -> Result<(), SwarmError> {
        let _serial = self.stopping.lock().await;

        if self.state() == ActorState::Stopped && lock(&self.run_loop).is_none() {
            return Ok(());
        }

        event!(Level::DEBUG, event = actor::ACTOR_STOPPING, actor_id = %self.id, queued = self.queued());

        let scope = lock(&self.scope).take();
        if let Some(token) = scope {
            token.cancel();
        }

        let handle = lock(&self.run_loop).take();
        let (receiver, outcome) = match handle {
            Some(handle) => match handle.await {
                Ok(receiver) => (Some(receiver), Ok(())),
                Err(e) => {
                    (None, Err(SwarmError::Handler(format!("run loop of actor '{}' ended abnormally: {}", self.id, e))))
                }
            },
            None => {
                let receiver = lock(&self.mailbox).take();
                (receiver, Ok(()))
            }
        };

        *lock(&self.state) = ActorState::Stopped;

        if let Some(mut receiver) = receiver {
            receiver.close();
        }

        event!(Level::DEBUG, event = actor::ACTOR_STOPPED, actor_id = %self.id);
        outcome
    }

    /// Enqueue without waiting
    pub fn send(&self, message: Message) -> Result<(), SwarmError> {
        if self.state() == ActorState::Stopped {
            return Err(SwarmError::Stopped(self.id.clone()));
        }

        match self.sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) => {
                event!(Level::DEBUG, event = actor::MESSAGE_REJECTED, actor_id = %self.id,
                       kind = %message.kind(), capacity = self.capacity);
                Err(SwarmError::MailboxFull(self.id.clone()))
            }
            Err(TrySendError::Closed(_)) => Err(SwarmError::Stopped(self.id.clone()))
        }
    }

    /// Convenience for sending a task on behalf of `sender`
    pub fn send_task(&self, sender: ActorId, task: Task) -> Result<(), SwarmError> {
        self.send(Message::task(sender, Some(self.id.clone()), task))
    }

    /// Poll the mailbox directly; always `None` while the run loop owns it
    pub fn try_receive(&self) -> Option<Message> {
        lock(&self.mailbox).as_mut().and_then(|receiver| receiver.try_recv().ok())
    }
}

/// State owned by one spawned run loop
struct RunLoop {
    id:       ActorId,
    receiver: mpsc::Receiver<Message>,
    state:    Arc<Mutex<ActorState>>,
    agent:    Box<dyn Agent>,
    handlers: HandlerMap,
    bus:      Option<EventBus>,
    token:    CancellationToken
}

impl RunLoop {
    async fn run(mut self) -> mpsc::Receiver<Message> {
        loop {
            let message = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                received = self.receiver.recv() => match received {
                    Some(message) => message,
                    None => break
                }
            };

            self.dispatch(message).await;
        }

        // no consumer from here on: later sends must fail instead of queueing
        self.receiver.close();
        *lock(&self.state) = ActorState::Stopped;
        event!(Level::DEBUG, event = actor::ACTOR_STOPPED, actor_id = %self.id, cancelled = self.token.is_cancelled());

        self.receiver
    }

    async fn dispatch(&mut self, message: Message) {
        let kind = message.kind();
        let handler = self.handlers.read().unwrap_or_else(PoisonError::into_inner).get(&kind).cloned();

        event!(Level::TRACE, event = actor::MESSAGE_RECEIVED, actor_id = %self.id,
               kind = %kind, sender = %message.sender, handler = handler.is_some());

        let task_id = match &message.payload {
            Payload::Task(task) => Some(task.id.clone()),
            _ => None
        };
        if let Some(task_id) = &task_id {
            self.publish(
                Event::new(EventKind::Received, self.id.clone(), format!("received from {}", message.sender))
                    .with_task(task_id.clone())
            );
        }

        match handler {
            Some(handler) => self.run_handler(handler, message, task_id).await,
            None => match message.payload {
                Payload::Task(task) => self.process_task(task).await,
                _ => {
                    event!(Level::DEBUG, event = actor::MESSAGE_RECEIVED, actor_id = %self.id,
                           kind = %kind, message = "no_handler_registered");
                }
            }
        }
    }

    async fn process_task(&mut self, task: Task) {
        event!(Level::DEBUG, event = actor::TASK_STARTED, actor_id = %self.id, task_id = %task.id);
        self.publish(Event::new(EventKind::Started, self.id.clone(), task.description.clone()).with_task(task.id.clone()));

        let result = match AssertUnwindSafe(self.agent.process_task(&task)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => TaskResult::failure(task.id.clone(), TaskErrorKind::Panicked, panic_message(&*panic))
        };

        self.finish(result);
    }

    async fn run_handler(&mut self, handler: Handler, message: Message, task_id: Option<TaskId>) {
        let kind = message.kind();
        if let Some(task_id) = &task_id {
            self.publish(
                Event::new(EventKind::Started, self.id.clone(), format!("{} handler", kind)).with_task(task_id.clone())
            );
        }

        let outcome = match AssertUnwindSafe(async move { handler(message).await }).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err((TaskErrorKind::Handler, e.to_string())),
            Err(panic) => Err((TaskErrorKind::Panicked, panic_message(&*panic)))
        };

        match (outcome, task_id) {
            (Ok(()), Some(task_id)) => self.finish(TaskResult::success(task_id, Value::Null)),
            (Ok(()), None) => {}
            (Err((error_kind, error)), Some(task_id)) => {
                event!(Level::WARN, event = actor::HANDLER_FAILED, actor_id = %self.id,
                       kind = %kind, task_id = %task_id, error = %error);
                self.finish(TaskResult::failure(task_id, error_kind, error));
            }
            (Err((error_kind, error)), None) => {
                event!(Level::WARN, event = actor::HANDLER_FAILED, actor_id = %self.id, kind = %kind, error = %error);
                self.publish(
                    Event::new(EventKind::Failed, self.id.clone(), error)
                        .with_data(json!({ "message_kind": kind, "error_kind": error_kind }))
                );
            }
        }
    }

    fn finish(&self, result: TaskResult) {
        if result.success {
            event!(Level::DEBUG, event = actor::TASK_COMPLETED, actor_id = %self.id, task_id = %result.task_id);
            self.publish(Event::new(EventKind::Completed, self.id.clone(), "task completed").with_result(result));
        } else {
            let error = result.error.as_ref().map(ToString::to_string).unwrap_or_default();
            event!(Level::WARN, event = actor::TASK_FAILED, actor_id = %self.id,
                   task_id = %result.task_id, error = %error);
            self.publish(Event::new(EventKind::Failed, self.id.clone(), error).with_result(result));
        }
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(event);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
