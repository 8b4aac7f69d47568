//! Core workflow domain types
//!
//! A workflow is an ordered list of dependent steps. Each step becomes one task;
//! the output of every completed step is threaded into the context of the next.

use std::{
    collections::{BTreeMap, HashSet},
    fmt::Display,
    time::Duration
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    error::SwarmError,
    task::{Priority, TaskId, TaskResult}
};

/// Represents a complete workflow definition parsed from YAML.
///
/// # Example YAML structure
/// ```yaml
/// name: "Market brief"
/// description: "Research, analyse, then write up"
/// steps:
///   - name: research
///     description: "Collect facts about {{ topic }}"
///     payload: { topic: "solid state batteries" }
///   - name: analyze
///     description: "Analyse the findings"
///     output_key: analysis
///   - name: write
///     description: "Write a one page brief using: {{ analysis }}"
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WorkflowDefinition {
    /// Human-readable name of the workflow
    pub name:        String,
    /// Description explaining what the workflow does
    #[serde(default)]
    pub description: String,
    /// Steps, executed strictly in this order
    pub steps:       Vec<WorkflowStep>
}

impl Display for WorkflowDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One step of a workflow
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WorkflowStep {
    pub name:        String,
    /// Task description; a tera template over the accumulated context
    pub description: String,
    #[serde(default)]
    pub payload:     Value,
    #[serde(default)]
    pub priority:    Priority,
    /// Context label for this step's output, `step{n}_output` when absent
    #[serde(default)]
    pub output_key:  Option<String>
}

impl WorkflowStep {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name:        name.into(),
            description: description.into(),
            payload:     Value::Null,
            priority:    Priority::default(),
            output_key:  None
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_output_key(mut self, output_key: impl Into<String>) -> Self {
        self.output_key = Some(output_key.into());
        self
    }

    /// Label under which this step's output lands in the context (`index` is 0-based)
    pub fn output_label(&self, index: usize) -> String {
        self.output_key.clone().unwrap_or_else(|| format!("step{}_output", index + 1))
    }
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self { name: name.into(), description: String::new(), steps }
    }

    /// Reject workflows that cannot run: no steps, or two steps writing the same label
    pub fn validate(&self) -> Result<(), SwarmError> {
        if self.steps.is_empty() {
            return Err(SwarmError::Configuration(format!("workflow '{}' has no steps", self.name)));
        }

        let mut labels = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            let label = step.output_label(index);
            if !labels.insert(label.clone()) {
                return Err(SwarmError::Configuration(format!(
                    "workflow '{}' reuses output label '{}' at step '{}'",
                    self.name, label, step.name
                )));
            }
        }

        Ok(())
    }
}

/// Final state of a workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Every step succeeded
    Completed,
    /// A step failed or timed out; later steps were never distributed
    Failed { step: String, result: TaskResult }
}

/// Outcome of one executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step:    String,
    pub task_id: TaskId,
    pub label:   String,
    pub result:  TaskResult,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration
}

/// Everything a caller learns from one workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub workflow: String,
    pub steps:    Vec<StepReport>,
    /// Accumulated outputs of every successful step
    pub context:  BTreeMap<String, Value>,
    pub status:   WorkflowStatus
}

impl WorkflowReport {
    pub fn is_success(&self) -> bool {
        matches!(self.status, WorkflowStatus::Completed)
    }

    /// The failing result, when the run did not complete
    pub fn failure(&self) -> Option<&TaskResult> {
        match &self.status {
            WorkflowStatus::Completed => None,
            WorkflowStatus::Failed { result, .. } => Some(result)
        }
    }

    /// Output of the last successful step
    pub fn final_output(&self) -> Option<&Value> {
        self.steps.iter().rev().find(|step| step.result.success).map(|step| &step.result.data)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
