//! Swarm - registry and router for a set of actors
//!
//! The swarm coordinates every actor it was given:
//! - Registers and deregisters actors by unique id
//! - Starts and stops them under one shared cancellation scope
//! - Routes tasks round-robin over registration order, skipping stopped actors
//! - Owns the single event bus every registered actor publishes to

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError}
};

use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

use crate::{
    actor::{
        message::{BroadcastPayload, Message},
        processor::Actor
    },
    domain::{
        constant::swarm,
        error::{ActorFailure, SwarmError},
        event::{Event, EventKind},
        state::{ActorId, ActorState},
        task::Task
    },
    shared::event_bus::{EventBus, EventReceiver}
};

/// Actors in registration order plus the round-robin cursor
#[derive(Default)]
struct Registry {
    actors: HashMap<ActorId, Arc<Actor>>,
    order:  Vec<ActorId>,
    cursor: usize
}

impl Registry {
    fn snapshot(&self) -> Vec<Arc<Actor>> {
        self.order.iter().filter_map(|id| self.actors.get(id).cloned()).collect()
    }

    fn remove(&mut self, id: &ActorId) {
        self.actors.remove(id);
        if let Some(position) = self.order.iter().position(|entry| entry == id) {
            self.order.remove(position);
            if position < self.cursor {
                self.cursor -= 1;
            }
        }
        if self.cursor >= self.order.len() {
            self.cursor = 0;
        }
    }
}

/// Coordinator owning the actor registry and one event bus
pub struct Swarm {
    id:       ActorId,
    registry: Mutex<Registry>,
    bus:      EventBus,
    scope:    Mutex<Option<CancellationToken>>
}

impl Swarm {
    pub fn new(bus: EventBus) -> Self {
        Self {
            id: ActorId::from(swarm::SWARM_ID),
            registry: Mutex::new(Registry::default()),
            bus,
            scope: Mutex::new(None)
        }
    }

    pub fn with_default_bus() -> Self {
        Self::new(EventBus::with_default_capacity())
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lifecycle(&self, actor_id: &ActorId, name: &str, message: String) {
        self.bus.publish(Event::new(EventKind::Custom(name.to_string()), actor_id.clone(), message));
    }

    /// Add an actor without starting it; the actor is wired to this swarm's bus
    pub fn register(&self, actor: Actor) -> Result<Arc<Actor>, SwarmError> {
        let actor_id = actor.id().clone();
        let actor = {
            let mut registry = self.registry();
            if registry.actors.contains_key(&actor_id) {
                event!(Level::WARN, event = swarm::ACTOR_REGISTERED, actor_id = %actor_id,
                       message = "duplicate_id_rejected");
                return Err(SwarmError::DuplicateId(actor_id));
            }

            actor.attach_bus(self.bus.clone());
            let actor = Arc::new(actor);
            registry.actors.insert(actor_id.clone(), actor.clone());
            registry.order.push(actor_id.clone());
            actor
        };

        event!(Level::DEBUG, event = swarm::ACTOR_REGISTERED, actor_id = %actor_id);
        self.lifecycle(&actor_id, "registered", format!("actor {} registered", actor_id));
        Ok(actor)
    }

    /// Stop the actor, then remove it from the registry
    pub async fn deregister(&self, actor_id: &ActorId) -> Result<(), SwarmError> {
        let actor = self.registry().actors.get(actor_id).cloned();
        let actor = actor.ok_or_else(|| SwarmError::NotFound(actor_id.clone()))?;

        actor.stop().await?;
        self.registry().remove(actor_id);

        event!(Level::DEBUG, event = swarm::ACTOR_DEREGISTERED, actor_id = %actor_id);
        self.lifecycle(actor_id, "deregistered", format!("actor {} deregistered", actor_id));
        Ok(())
    }

    /// Derive the shared scope from `parent` and start every registered actor under it
    ///
    /// Every failure is collected; actors that did start are left running.
    pub fn start_all(&self, parent: &CancellationToken) -> Result<(), SwarmError> {
        let scope = {
            let mut scope = self.scope.lock().unwrap_or_else(PoisonError::into_inner);
            match scope.as_ref() {
                Some(token) if !token.is_cancelled() => token.clone(),
                _ => {
                    let token = parent.child_token();
                    *scope = Some(token.clone());
                    token
                }
            }
        };

        let actors = self.registry().snapshot();
        let mut failures = Vec::new();
        for actor in &actors {
            if let Err(e) = actor.start(&scope) {
                failures.push(ActorFailure::new(actor.id().clone(), e));
            }
        }

        event!(Level::INFO, event = swarm::START_ALL, actors = actors.len(), failed = failures.len());
        self.lifecycle(&self.id, "started", format!("{} actor(s) started", actors.len() - failures.len()));
        SwarmError::aggregate(failures)
    }

    /// Cancel the shared scope, then stop every actor and collect the failures
    pub async fn stop_all(&self) -> Result<(), SwarmError> {
        let scope = self.scope.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(token) = scope {
            token.cancel();
        }

        let actors = self.registry().snapshot();
        let mut failures = Vec::new();
        for actor in &actors {
            if let Err(e) = actor.stop().await {
                failures.push(ActorFailure::new(actor.id().clone(), e));
            }
        }

        event!(Level::INFO, event = swarm::STOP_ALL, actors = actors.len(), failed = failures.len());
        self.lifecycle(&self.id, "stopped", format!("{} actor(s) stopped", actors.len()));
        SwarmError::aggregate(failures)
    }

    /// Send the task to the next actor that is not stopped
    ///
    /// The cursor moves past the chosen actor whether or not its mailbox accepts
    /// the task. There is no failover to another actor on a full mailbox.
    pub fn distribute(&self, task: Task) -> Result<ActorId, SwarmError> {
        let task_id = task.id.clone();
        let mut registry = self.registry();
        let count = registry.order.len();

        let chosen = (0..count)
            .map(|offset| (registry.cursor + offset) % count)
            .find(|&index| {
                registry.actors.get(&registry.order[index]).is_some_and(|actor| actor.state().accepts_work())
            });

        let Some(index) = chosen else {
            event!(Level::WARN, event = swarm::DISTRIBUTION_FAILED, task_id = %task_id, actors = count,
                   message = "no_available_actor");
            return Err(SwarmError::NoAvailableActor);
        };

        registry.cursor = (index + 1) % count;
        let actor_id = registry.order[index].clone();
        let actor = registry.actors.get(&actor_id).cloned().ok_or(SwarmError::NoAvailableActor)?;
        drop(registry);

        match actor.send(Message::task(self.id.clone(), Some(actor_id.clone()), task)) {
            Ok(()) => {
                event!(Level::DEBUG, event = swarm::TASK_DISTRIBUTED, task_id = %task_id, actor_id = %actor_id);
                Ok(actor_id)
            }
            Err(e) => {
                event!(Level::WARN, event = swarm::DISTRIBUTION_FAILED, task_id = %task_id,
                       actor_id = %actor_id, error = %e);
                Err(e)
            }
        }
    }

    /// Send the payload to every registered actor, collecting every send failure
    pub fn broadcast(&self, payload: BroadcastPayload) -> Result<(), SwarmError> {
        let actors = self.registry().snapshot();
        let mut failures = Vec::new();

        for actor in &actors {
            if let Err(e) = actor.send(Message::broadcast(self.id.clone(), payload.clone())) {
                failures.push(ActorFailure::new(actor.id().clone(), e));
            }
        }

        event!(Level::DEBUG, event = swarm::BROADCAST_SENT, topic = %payload.topic,
               delivered = actors.len() - failures.len(), failed = failures.len());
        SwarmError::aggregate(failures)
    }

    /// Point-in-time lifecycle state of every registered actor
    pub fn status(&self) -> BTreeMap<ActorId, ActorState> {
        self.registry().snapshot().iter().map(|actor| (actor.id().clone(), actor.state())).collect()
    }

    /// Actor ids in registration order
    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.registry().order.clone()
    }

    pub fn len(&self) -> usize {
        self.registry().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.bus.subscribe()
    }
}

impl Default for Swarm {
    fn default() -> Self {
        Self::with_default_bus()
    }
}
