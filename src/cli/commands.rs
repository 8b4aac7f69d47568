//! CLI command handlers

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{Level, event};

use crate::{
    actor::guardian::Guardian,
    config::AppConfig,
    domain::{
        constant::cli,
        workflow::{WorkflowDefinition, WorkflowReport}
    },
    ui
};

/// Handle the run command - execute a workflow file through a fresh swarm
pub async fn handle_run_command(file: &Path, config: &AppConfig) -> Result<()> {
    event!(Level::DEBUG, event = cli::COMMAND_STARTED, command = "run", file = %file.display());

    let definition = WorkflowDefinition::from_file(file)?;
    let report = run_workflow(&definition, BTreeMap::new(), config).await?;

    finish(&report)
}

/// Handle the demo command - run the built-in research pipeline
pub async fn handle_demo_command(topic: Option<&str>, config: &AppConfig) -> Result<()> {
    event!(Level::DEBUG, event = cli::COMMAND_STARTED, command = "demo", topic = topic.unwrap_or("-"));

    let definition = WorkflowDefinition::research_pipeline()?;
    let seed = topic_context(topic);
    let report = run_workflow(&definition, seed, config).await?;

    finish(&report)
}

/// Handle the status command - boot the swarm, print its health and shut it down
pub async fn handle_status_command(config: &AppConfig) -> Result<()> {
    event!(Level::DEBUG, event = cli::COMMAND_STARTED, command = "status");

    let guardian = Guardian::spawn_system(config).await.context("Failed to start the swarm")?;
    ui::show_health(&guardian.health());
    guardian.shutdown().await.context("Failed to shut the swarm down")?;

    Ok(())
}

fn topic_context(topic: Option<&str>) -> BTreeMap<String, Value> {
    topic
        .map(|topic| BTreeMap::from([("topic".to_string(), Value::String(topic.to_string()))]))
        .unwrap_or_default()
}

fn finish(report: &WorkflowReport) -> Result<()> {
    ui::show_report(report);

    if !report.is_success() {
        bail!("Workflow '{}' did not complete", report.workflow);
    }

    ui::show_final_output(report);
    Ok(())
}

/// Boot the swarm, run one workflow with a live spinner and always shut down
///
/// Ctrl-C abandons the run; the swarm is still shut down before returning.
async fn run_workflow(
    definition: &WorkflowDefinition,
    seed: BTreeMap<String, Value>,
    config: &AppConfig
) -> Result<WorkflowReport> {
    let guardian = Guardian::spawn_system(config).await.context("Failed to start the swarm")?;
    let swarm = guardian.swarm();

    let spinner_token = guardian.root_token().child_token();
    let spinner = ui::create_step_spinner(&format!("Running '{}'", definition.name));
    let spinner_task = ui::spawn_event_spinner(swarm.bus(), spinner, spinner_token.clone());

    let executor = guardian.executor();
    let outcome = tokio::select! {
        outcome = executor.execute_with_context(definition, seed) => Some(outcome),
        _ = tokio::signal::ctrl_c() => {
            event!(Level::WARN, event = cli::INTERRUPTED, workflow = %definition.name);
            None
        }
    };

    spinner_token.cancel();
    let _ = spinner_task.await;

    if let Err(e) = guardian.shutdown().await {
        event!(Level::WARN, event = cli::SHUTDOWN_FAILED, error = %e);
    }

    match outcome {
        Some(outcome) => Ok(outcome?),
        None => bail!("Interrupted")
    }
}
