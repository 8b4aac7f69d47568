//! Tables and summaries printed by the CLI

use std::collections::BTreeMap;

use tabled::{Table, Tabled, settings::Style};

use crate::{
    actor::guardian::SystemHealth,
    domain::{
        state::{ActorId, ActorState},
        workflow::{WorkflowReport, WorkflowStatus}
    }
};

/// One actor in the status table
#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct ActorRow {
    #[tabled(rename = "Actor")]
    pub actor: String,
    #[tabled(rename = "State")]
    pub state: String
}

/// One executed step in the report table
#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct StepRow {
    #[tabled(rename = "Step")]
    pub step:    String,
    #[tabled(rename = "Output Key")]
    pub label:   String,
    #[tabled(rename = "Task")]
    pub task:    String,
    #[tabled(rename = "Status")]
    pub status:  String,
    #[tabled(rename = "Elapsed")]
    pub elapsed: String
}

pub fn actor_rows(actors: &BTreeMap<ActorId, ActorState>) -> Vec<ActorRow> {
    actors
        .iter()
        .map(|(id, state)| ActorRow { actor: id.to_string(), state: state.to_string() })
        .collect()
}

pub fn step_rows(report: &WorkflowReport) -> Vec<StepRow> {
    report
        .steps
        .iter()
        .map(|step| {
            let status = match &step.result.error {
                None => "ok".to_string(),
                Some(error) => error.kind.to_string()
            };
            StepRow {
                step: step.step.clone(),
                label: step.label.clone(),
                task: step.task_id.to_string(),
                status,
                elapsed: format!("{} ms", step.elapsed.as_millis())
            }
        })
        .collect()
}

fn render<T: Tabled>(rows: Vec<T>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

/// Print the step table and the overall outcome of a run
pub fn show_report(report: &WorkflowReport) {
    println!();
    println!("Workflow: {}", report.workflow);
    println!("{}", render(step_rows(report)));

    match &report.status {
        WorkflowStatus::Completed => println!("✅ Completed {} step(s)", report.steps.len()),
        WorkflowStatus::Failed { step, result } => {
            let reason = result.error.as_ref().map(ToString::to_string).unwrap_or_else(|| result.data_text());
            println!("❌ Step '{}' failed: {}", step, reason);
        }
    }
}

/// Print the output of the last successful step
pub fn show_final_output(report: &WorkflowReport) {
    if let Some(output) = report.final_output() {
        let text = match output {
            serde_json::Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())
        };
        println!();
        println!("{}", text);
    }
}

/// Print actor states and bus counters
pub fn show_health(health: &SystemHealth) {
    println!("{}", render(actor_rows(&health.actors)));
    println!(
        "{} of {} actor(s) running, {} subscriber(s), {} dropped event(s), up {}s",
        health.running(),
        health.actors.len(),
        health.subscribers,
        health.dropped_events,
        health.uptime_seconds
    );
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::domain::{
        task::{TaskErrorKind, TaskId, TaskResult},
        workflow::StepReport
    };

    fn report() -> WorkflowReport {
        let ok = TaskResult::success(TaskId::new("step1-a"), json!("notes"));
        let late = TaskResult::timed_out(TaskId::new("step2-b"), Duration::from_secs(1));
        WorkflowReport {
            workflow: "demo".into(),
            steps:    vec![
                StepReport {
                    step:    "research".into(),
                    task_id: TaskId::new("step1-a"),
                    label:   "research".into(),
                    result:  ok,
                    elapsed: Duration::from_millis(12)
                },
                StepReport {
                    step:    "analyze".into(),
                    task_id: TaskId::new("step2-b"),
                    label:   "step2_output".into(),
                    result:  late.clone(),
                    elapsed: Duration::from_millis(1000)
                },
            ],
            context:  BTreeMap::from([("research".to_string(), json!("notes"))]),
            status:   WorkflowStatus::Failed { step: "analyze".into(), result: late }
        }
    }

    #[test]
    fn test_step_rows_show_error_kind() {
        let rows = step_rows(&report());

        assert_eq!(rows[0].status, "ok");
        assert_eq!(rows[0].elapsed, "12 ms");
        assert_eq!(rows[1].status, TaskErrorKind::Timeout.to_string());
        assert_eq!(rows[1].label, "step2_output");
    }

    #[test]
    fn test_actor_rows_follow_id_order() {
        let actors = BTreeMap::from([
            (ActorId::new("b"), ActorState::Stopped),
            (ActorId::new("a"), ActorState::Processing)
        ]);

        let rows = actor_rows(&actors);

        assert_eq!(rows, vec![
            ActorRow { actor: "a".into(), state: "processing".into() },
            ActorRow { actor: "b".into(), state: "stopped".into() },
        ]);
        assert!(render(rows).contains("processing"));
    }
}
