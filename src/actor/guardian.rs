//! Guardian - Root Supervisor
//!
//! The Guardian is the root of the actor hierarchy and manages system-wide concerns:
//! - Builds the swarm and its agents from configuration
//! - Owns the root cancellation token every actor scope derives from
//! - Mirrors bus events into the log
//! - Provides health checks and a one-time shutdown

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering}
    },
    time::{Duration, Instant}
};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

use crate::{
    actor::{manager::Swarm, processor::Actor},
    adapter::{agent::LlmAgent, completion::CompletionFactory},
    config::AppConfig,
    domain::{
        constant::guardian,
        error::SwarmError,
        state::{ActorId, ActorState}
    },
    shared::event_bus::{EventBus, spawn_event_logger},
    workflow::executor::WorkflowExecutor
};

/// System health information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemHealth {
    pub actors:         BTreeMap<ActorId, ActorState>,
    pub uptime_seconds: u64,
    pub subscribers:    usize,
    pub dropped_events: u64,
    pub shut_down:      bool
}

impl SystemHealth {
    /// Actors whose run loop is live
    pub fn running(&self) -> usize {
        self.actors.values().filter(|state| **state == ActorState::Processing).count()
    }
}

/// Root supervisor of the actor system
pub struct Guardian {
    swarm:        Arc<Swarm>,
    root:         CancellationToken,
    step_timeout: Duration,
    startup_time: Instant,
    logger:       Mutex<Option<JoinHandle<()>>>,
    shut_down:    AtomicBool
}

impl Guardian {
    /// Build one LLM agent per configured entry, register them and start everything
    pub async fn spawn_system(config: &AppConfig) -> Result<Self, SwarmError> {
        event!(Level::DEBUG, event = guardian::SYSTEM_STARTING, agents = config.agents.len());

        config.validate()?;

        let swarm = Swarm::new(EventBus::new(config.runtime.subscriber_capacity));
        let completion = CompletionFactory::create(&config.completion);

        for agent_config in &config.agents {
            let mut agent = LlmAgent::new(&agent_config.id, agent_config.role, completion.clone())
                .with_history_limit(config.runtime.history_limit);
            if let Some(system_prompt) = &agent_config.system_prompt {
                agent = agent.with_system_prompt(system_prompt.clone());
            }

            swarm.register(Actor::with_capacity(agent_config.id.as_str(), config.runtime.mailbox_capacity, agent))?;
        }

        Self::supervise(Arc::new(swarm), config.runtime.step_timeout()).await
    }

    /// Start an already populated swarm under a fresh root token
    ///
    /// If any actor fails to start, the ones that did are stopped again.
    pub async fn supervise(swarm: Arc<Swarm>, step_timeout: Duration) -> Result<Self, SwarmError> {
        let root = CancellationToken::new();
        let logger = spawn_event_logger(swarm.bus(), root.child_token());

        if let Err(e) = swarm.start_all(&root) {
            event!(Level::ERROR, event = guardian::SYSTEM_STARTING, error = %e);
            let _ = swarm.stop_all().await;
            root.cancel();
            let _ = logger.await;
            return Err(e);
        }

        event!(Level::INFO, event = guardian::SYSTEM_INITIALIZED, actors = swarm.len(),
               step_timeout_secs = step_timeout.as_secs());

        Ok(Self {
            swarm,
            root,
            step_timeout,
            startup_time: Instant::now(),
            logger: Mutex::new(Some(logger)),
            shut_down: AtomicBool::new(false)
        })
    }

    pub fn swarm(&self) -> Arc<Swarm> {
        self.swarm.clone()
    }

    /// Token whose cancellation ends every actor's run loop
    pub fn root_token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Executor bound to this swarm with the configured step deadline
    pub fn executor(&self) -> WorkflowExecutor {
        WorkflowExecutor::new(self.swarm.clone(), self.step_timeout)
    }

    /// Handle health check requests
    pub fn health(&self) -> SystemHealth {
        let health = SystemHealth {
            actors:         self.swarm.status(),
            uptime_seconds: self.startup_time.elapsed().as_secs(),
            subscribers:    self.swarm.bus().subscriber_count(),
            dropped_events: self.swarm.bus().dropped_count(),
            shut_down:      self.shut_down.load(Ordering::SeqCst)
        };

        event!(Level::DEBUG, event = guardian::HEALTH_CHECK_COMPLETED,
               running = health.running(), uptime_seconds = health.uptime_seconds,
               dropped_events = health.dropped_events);

        health
    }

    /// Stop every actor, close the bus and wait for the event logger; runs once
    pub async fn shutdown(&self) -> Result<(), SwarmError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        event!(Level::DEBUG, event = guardian::SYSTEM_SHUTDOWN_STARTED);

        let result = self.swarm.stop_all().await;
        self.swarm.bus().close();

        let logger = self.logger.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(logger) = logger {
            let _ = logger.await;
        }
        self.root.cancel();

        match &result {
            Ok(()) => event!(Level::INFO, event = guardian::SYSTEM_SHUTDOWN_COMPLETED),
            Err(e) => event!(Level::WARN, event = guardian::SYSTEM_SHUTDOWN_COMPLETED, error = %e)
        }
        result
    }
}

impl Drop for Guardian {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        adapter::agent::AgentRole,
        config::AgentConfig,
        domain::workflow::{WorkflowDefinition, WorkflowStatus}
    };

    #[tokio::test]
    async fn test_spawn_system_starts_configured_agents() {
        let guardian = Guardian::spawn_system(&AppConfig::default()).await.unwrap();

        let health = guardian.health();
        assert_eq!(health.actors.len(), 3);
        assert_eq!(health.running(), 3);
        assert!(health.subscribers >= 1);

        guardian.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_runs_once() {
        let guardian = Guardian::spawn_system(&AppConfig::default()).await.unwrap();

        guardian.shutdown().await.unwrap();
        guardian.shutdown().await.unwrap();

        let health = guardian.health();
        assert!(health.shut_down);
        assert_eq!(health.running(), 0);
        assert!(guardian.swarm().bus().is_closed());
        assert!(guardian.root_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = AppConfig::default();
        config.agents.push(AgentConfig::new("researcher", AgentRole::Reviewer));

        let err = Guardian::spawn_system(&config).await.err();
        assert!(matches!(err, Some(SwarmError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_research_pipeline_runs_on_mock_backend() {
        let guardian = Guardian::spawn_system(&AppConfig::default()).await.unwrap();
        let workflow = WorkflowDefinition::research_pipeline().unwrap();

        let report = guardian.executor().execute(&workflow).await.unwrap();

        assert_eq!(report.status, WorkflowStatus::Completed);
        let output = report.final_output().and_then(|value| value.as_str()).unwrap_or_default().to_string();
        assert!(output.starts_with("Draft"));
        assert!(report.context.contains_key("research"));
        guardian.shutdown().await.unwrap();
    }
}
