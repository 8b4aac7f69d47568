//! Workflow YAML parsing functionality

use std::{fs, path::Path};

use crate::domain::{error::SwarmError, workflow::WorkflowDefinition};

const RESEARCH_PIPELINE: &str = include_str!("../../resource/research_pipeline.yaml");

impl WorkflowDefinition {
    /// Parse and validate a workflow from YAML content.
    ///
    /// # Arguments
    /// * `yaml_content` - The YAML string content to parse
    ///
    /// # Returns
    /// * `Ok(WorkflowDefinition)` - Successfully parsed, runnable workflow
    /// * `Err(SwarmError)` - YAML syntax error, or a workflow that fails validation
    ///
    /// # Example
    /// ```rust
    /// use swarm::domain::workflow::WorkflowDefinition;
    ///
    /// let yaml = r#"
    /// name: "Brief"
    /// steps:
    ///   - name: research
    ///     description: "Research the topic"
    ///   - name: write
    ///     description: "Write using {{ step1_output }}"
    /// "#;
    ///
    /// let workflow = WorkflowDefinition::from_yaml(yaml).unwrap();
    /// assert_eq!(workflow.steps.len(), 2);
    /// ```
    pub fn from_yaml(yaml_content: &str) -> Result<Self, SwarmError> {
        let workflow: WorkflowDefinition = serde_yaml::from_str(yaml_content)?;
        workflow.validate()?;
        Ok(workflow)
    }

    /// Read and parse a workflow file
    pub fn from_file(path: &Path) -> Result<Self, SwarmError> {
        let content = fs::read_to_string(path).map_err(|e| {
            SwarmError::Configuration(format!("Failed to read workflow file {}: {}", path.display(), e))
        })?;

        Self::from_yaml(&content)
            .map_err(|e| SwarmError::Configuration(format!("Invalid workflow file {}: {}", path.display(), e)))
    }

    /// Built-in research -> analysis -> writing pipeline
    pub fn research_pipeline() -> Result<Self, SwarmError> {
        Self::from_yaml(RESEARCH_PIPELINE)
    }
}
