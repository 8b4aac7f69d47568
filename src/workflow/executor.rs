//! Sequential workflow execution
//!
//! Steps run strictly one after another. Each step's task carries the outputs of
//! every earlier step, is routed through the swarm, and is awaited on the event
//! bus with a per-step deadline.

use std::{
    collections::BTreeMap,
    sync::Arc,
    time::{Duration, Instant}
};

use serde_json::Value;
use tera::{Context as TeraContext, Tera};
use tracing::{Level, event};

use crate::{
    actor::manager::Swarm,
    domain::{
        constant::workflow,
        error::SwarmError,
        event::EventKind,
        state::ActorId,
        task::{Task, TaskErrorKind, TaskId, TaskResult},
        workflow::{StepReport, WorkflowDefinition, WorkflowReport, WorkflowStatus, WorkflowStep}
    },
    shared::event_bus::TaskEventReceiver
};

/// Drives workflows through a swarm
#[derive(Clone)]
pub struct WorkflowExecutor {
    swarm:        Arc<Swarm>,
    step_timeout: Duration
}

impl WorkflowExecutor {
    pub fn new(swarm: Arc<Swarm>, step_timeout: Duration) -> Self {
        Self { swarm, step_timeout }
    }

    pub fn step_timeout(&self) -> Duration {
        self.step_timeout
    }

    /// Execute every step of `definition` in order, stopping at the first failure.
    ///
    /// # Arguments
    /// * `definition` - The workflow to run; validated before anything is distributed
    ///
    /// # Returns
    /// * `Ok(WorkflowReport)` - The run finished; `status` tells whether every step
    ///   succeeded or which step failed or timed out
    /// * `Err(SwarmError)` - The run was aborted: invalid workflow, a description
    ///   template that does not render, or a task the swarm could not accept
    ///
    /// A step whose deadline passes is reported as a failed result tagged
    /// [`TaskErrorKind::Timeout`]. Its actor is not interrupted; the late result
    /// is published on the bus with nobody from this run waiting for it.
    pub async fn execute(&self, definition: &WorkflowDefinition) -> Result<WorkflowReport, SwarmError> {
        self.execute_with_context(definition, BTreeMap::new()).await
    }

    /// Like [`execute`](Self::execute), with `seed` entries visible to every step
    pub async fn execute_with_context(
        &self,
        definition: &WorkflowDefinition,
        seed: BTreeMap<String, Value>
    ) -> Result<WorkflowReport, SwarmError> {
        definition.validate()?;

        event!(Level::INFO, event = workflow::WORKFLOW_STARTED, workflow = %definition.name,
               steps = definition.steps.len(), step_timeout_ms = self.step_timeout.as_millis() as u64);

        let mut context = seed;
        let mut upstream: Vec<TaskId> = Vec::new();
        let mut steps = Vec::with_capacity(definition.steps.len());

        for (index, step) in definition.steps.iter().enumerate() {
            let label = step.output_label(index);
            let task = match self.build_task(index, step, &context, &upstream) {
                Ok(task) => task,
                Err(e) => {
                    event!(Level::ERROR, event = workflow::WORKFLOW_FAILED, workflow = %definition.name,
                           step = %step.name, error = %e);
                    return Err(e);
                }
            };
            let task_id = task.id.clone();

            // subscribe first so a fast actor cannot finish unobserved
            let mut receiver = self.swarm.bus().subscribe_task(task_id.clone());
            let started = Instant::now();

            let actor_id = match self.swarm.distribute(task) {
                Ok(actor_id) => actor_id,
                Err(e) => {
                    event!(Level::ERROR, event = workflow::WORKFLOW_FAILED, workflow = %definition.name,
                           step = %step.name, task_id = %task_id, error = %e);
                    return Err(e);
                }
            };
            event!(Level::DEBUG, event = workflow::STEP_DISTRIBUTED, workflow = %definition.name,
                   step = %step.name, task_id = %task_id, actor_id = %actor_id);

            let result = self.await_result(&mut receiver, &actor_id).await;
            let elapsed = started.elapsed();

            steps.push(StepReport {
                step: step.name.clone(),
                task_id: task_id.clone(),
                label: label.clone(),
                result: result.clone(),
                elapsed
            });

            if !result.success {
                event!(Level::WARN, event = workflow::WORKFLOW_FAILED, workflow = %definition.name,
                       step = %step.name, task_id = %task_id, timed_out = result.is_timeout());
                return Ok(WorkflowReport {
                    workflow: definition.name.clone(),
                    steps,
                    context,
                    status: WorkflowStatus::Failed { step: step.name.clone(), result }
                });
            }

            event!(Level::DEBUG, event = workflow::STEP_COMPLETED, workflow = %definition.name,
                   step = %step.name, label = %label, elapsed_ms = elapsed.as_millis() as u64);
            context.insert(label, result.data);
            upstream.push(task_id);
        }

        event!(Level::INFO, event = workflow::WORKFLOW_COMPLETED, workflow = %definition.name, steps = steps.len());

        Ok(WorkflowReport { workflow: definition.name.clone(), steps, context, status: WorkflowStatus::Completed })
    }

    fn build_task(
        &self,
        index: usize,
        step: &WorkflowStep,
        context: &BTreeMap<String, Value>,
        upstream: &[TaskId]
    ) -> Result<Task, SwarmError> {
        let description = render_description(&step.description, context)
            .map_err(|e| SwarmError::Configuration(format!("step '{}': {}", step.name, e)))?;

        Ok(Task::new(TaskId::generate(&format!("step{}", index + 1)), description)
            .with_payload(step.payload.clone())
            .with_priority(step.priority)
            .with_context(context.clone())
            .with_dependencies(upstream.to_vec()))
    }

    /// Wait for the terminal event of the receiver's task, or synthesize a timeout
    async fn await_result(&self, receiver: &mut TaskEventReceiver, actor_id: &ActorId) -> TaskResult {
        let task_id = receiver.task_id().clone();

        match tokio::time::timeout(self.step_timeout, receiver.recv_terminal()).await {
            Ok(Ok(terminal)) => match terminal.result() {
                Some(result) => result.clone(),
                None if terminal.kind == EventKind::Completed => TaskResult::success(task_id, Value::Null),
                None => TaskResult::failure(task_id, TaskErrorKind::Failed, terminal.message.clone())
            },
            Ok(Err(e)) => {
                TaskResult::failure(task_id, TaskErrorKind::Failed, format!("stopped waiting for task: {}", e))
            }
            Err(_) => {
                event!(Level::WARN, event = workflow::STEP_TIMED_OUT, task_id = %task_id, actor_id = %actor_id,
                       timeout_ms = self.step_timeout.as_millis() as u64, message = "abandoned_in_flight_task");
                TaskResult::timed_out(task_id, self.step_timeout)
            }
        }
    }
}

/// Render a step description as a tera template over the accumulated context
pub fn render_description(template: &str, context: &BTreeMap<String, Value>) -> Result<String, SwarmError> {
    if !template.contains("{{") && !template.contains("{%") {
        return Ok(template.to_string());
    }

    let mut tera_context = TeraContext::new();
    for (label, value) in context {
        tera_context.insert(label, value);
    }

    let mut tera = Tera::default();
    tera.render_str(template, &tera_context).map_err(|e| {
        let mut message = format!("failed to render description template: {}", e);
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        SwarmError::Configuration(message)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::{
        actor::{message::MessageKind, processor::Actor},
        domain::state::ActorState,
        port::agent::Agent
    };

    /// Echoes its context and fails on request
    struct ScriptedAgent {
        seen: Arc<Mutex<Vec<Task>>>
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn process_task(&mut self, task: &Task) -> TaskResult {
            self.seen.lock().unwrap().push(task.clone());
            if task.description.starts_with("fail") {
                return TaskResult::failure(task.id.clone(), TaskErrorKind::Failed, "agent said no");
            }
            if task.description.starts_with("sleep") {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            TaskResult::success(task.id.clone(), json!(format!("out:{}", task.description)))
        }
    }

    async fn started_swarm(seen: Arc<Mutex<Vec<Task>>>) -> Arc<Swarm> {
        let swarm = Arc::new(Swarm::with_default_bus());
        swarm.register(Actor::new("a1", ScriptedAgent { seen })).unwrap();
        swarm.start_all(&CancellationToken::new()).unwrap();
        swarm
    }

    #[tokio::test]
    async fn test_context_is_threaded_verbatim() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let swarm = started_swarm(seen.clone()).await;
        let executor = WorkflowExecutor::new(swarm.clone(), Duration::from_secs(5));
        let definition = WorkflowDefinition::new(
            "chain",
            vec![WorkflowStep::new("s1", "one"), WorkflowStep::new("s2", "two"), WorkflowStep::new("s3", "three")]
        );

        let report = executor.execute(&definition).await.unwrap();

        assert!(report.is_success());
        let tasks = seen.lock().unwrap().clone();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[2].context.get("step1_output"), Some(&json!("out:one")));
        assert_eq!(tasks[2].context.get("step2_output"), Some(&json!("out:two")));
        assert_eq!(tasks[2].dependencies, vec![tasks[0].id.clone(), tasks[1].id.clone()]);
        assert_eq!(report.final_output(), Some(&json!("out:three")));
        swarm.stop_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_step_stops_the_pipeline() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let swarm = started_swarm(seen.clone()).await;
        let executor = WorkflowExecutor::new(swarm.clone(), Duration::from_secs(5));
        let definition = WorkflowDefinition::new(
            "fail-fast",
            vec![WorkflowStep::new("s1", "one"), WorkflowStep::new("s2", "fail now"), WorkflowStep::new("s3", "three")]
        );

        let report = executor.execute(&definition).await.unwrap();

        assert_eq!(seen.lock().unwrap().len(), 2);
        match &report.status {
            WorkflowStatus::Failed { step, result } => {
                assert_eq!(step, "s2");
                assert_eq!(result.data, json!("agent said no"));
                assert!(!result.is_timeout());
            }
            other => panic!("expected failure, got {other:?}")
        }
        assert_eq!(report.context.len(), 1);
        swarm.stop_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_step_timeout_is_reported_as_timeout() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let swarm = started_swarm(seen).await;
        let executor = WorkflowExecutor::new(swarm.clone(), Duration::from_millis(100));
        let definition = WorkflowDefinition::new("slow", vec![WorkflowStep::new("s1", "sleep a while")]);

        let started = Instant::now();
        let report = executor.execute(&definition).await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(400));
        assert!(report.failure().is_some_and(TaskResult::is_timeout));
        assert_eq!(swarm.status().get(&ActorId::from("a1")), Some(&ActorState::Processing));
        swarm.stop_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_task_handler_error_fails_the_pipeline() {
        let swarm = Arc::new(Swarm::with_default_bus());
        let actor = swarm.register(Actor::with_default_agent("a1")).unwrap();
        let handled = Arc::new(Mutex::new(0usize));
        let counter = handled.clone();
        actor.register_handler(MessageKind::Task, move |_message| {
            let counter = counter.clone();
            async move {
                *counter.lock().unwrap() += 1;
                Err(SwarmError::Handler("handler refused".to_string()))
            }
        });
        swarm.start_all(&CancellationToken::new()).unwrap();
        let executor = WorkflowExecutor::new(swarm.clone(), Duration::from_secs(5));
        let definition =
            WorkflowDefinition::new("refused", vec![WorkflowStep::new("s1", "one"), WorkflowStep::new("s2", "two")]);

        let report = executor.execute(&definition).await.unwrap();

        assert_eq!(*handled.lock().unwrap(), 1);
        assert_eq!(report.steps.len(), 1);
        let failure = report.failure().and_then(|result| result.error.clone()).unwrap();
        assert_eq!(failure.kind, TaskErrorKind::Handler);
        assert_eq!(failure.message, "handler refused");
        swarm.stop_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_no_actor_aborts_with_distribution_error() {
        let swarm = Arc::new(Swarm::with_default_bus());
        let executor = WorkflowExecutor::new(swarm, Duration::from_secs(1));
        let definition = WorkflowDefinition::new("orphan", vec![WorkflowStep::new("s1", "one")]);

        assert_eq!(executor.execute(&definition).await.unwrap_err(), SwarmError::NoAvailableActor);
    }

    #[tokio::test]
    async fn test_description_renders_earlier_outputs() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let swarm = started_swarm(seen.clone()).await;
        let executor = WorkflowExecutor::new(swarm.clone(), Duration::from_secs(5));
        let definition = WorkflowDefinition::new(
            "templated",
            vec![
                WorkflowStep::new("s1", "facts").with_output_key("facts"),
                WorkflowStep::new("s2", "summarise {{ facts }}"),
            ]
        );

        executor.execute(&definition).await.unwrap();

        assert_eq!(seen.lock().unwrap()[1].description, "summarise out:facts");
        swarm.stop_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_seed_context_reaches_first_step() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let swarm = started_swarm(seen.clone()).await;
        let executor = WorkflowExecutor::new(swarm.clone(), Duration::from_secs(5));
        let definition = WorkflowDefinition::new("seeded", vec![WorkflowStep::new("s1", "about {{ topic }}")]);
        let seed = BTreeMap::from([("topic".to_string(), json!("tides"))]);

        let report = executor.execute_with_context(&definition, seed).await.unwrap();

        assert_eq!(seen.lock().unwrap()[0].description, "about tides");
        assert_eq!(report.context.get("topic"), Some(&json!("tides")));
        swarm.stop_all().await.unwrap();
    }

    #[test]
    fn test_unknown_template_variable_is_a_configuration_error() {
        let err = render_description("use {{ missing }}", &BTreeMap::new()).unwrap_err();

        assert!(matches!(err, SwarmError::Configuration(_)));
    }
}
