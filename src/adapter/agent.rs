use std::{
    collections::VecDeque,
    fmt::{self, Display, Write},
    sync::Arc
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{Level, event};

use crate::{
    domain::{
        constant::agent,
        task::{Task, TaskErrorKind, TaskResult}
    },
    port::{
        agent::Agent,
        completion::{Completion, Exchange}
    }
};

/// Specialisation of an LLM-backed agent; selects its default system prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Researcher,
    Analyst,
    Writer,
    Reviewer,
    #[default]
    Generalist
}

impl AgentRole {
    pub fn default_system_prompt(&self) -> &'static str {
        match self {
            AgentRole::Researcher => {
                "You are a meticulous researcher. Gather the relevant facts for the task and cite what they rest on."
            }
            AgentRole::Analyst => {
                "You are an analyst. Interpret the material you are given, identify trends and risks, and state your \
                 confidence."
            }
            AgentRole::Writer => "You are a clear, concise writer. Turn the material you are given into polished prose.",
            AgentRole::Reviewer => "You are a critical reviewer. Check the material for errors and gaps and suggest fixes.",
            AgentRole::Generalist => "You are a helpful assistant. Complete the task as asked."
        }
    }
}

impl Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self {
            AgentRole::Researcher => "researcher",
            AgentRole::Analyst => "analyst",
            AgentRole::Writer => "writer",
            AgentRole::Reviewer => "reviewer",
            AgentRole::Generalist => "generalist"
        };
        write!(f, "{}", role)
    }
}

/// Agent that turns each task into a prompt for a completion backend
///
/// Keeps a rolling window of its own prior exchanges and sends them along with
/// every request.
pub struct LlmAgent {
    name:          String,
    role:          AgentRole,
    system_prompt: String,
    completion:    Arc<dyn Completion>,
    history:       VecDeque<Exchange>,
    history_limit: usize
}

impl LlmAgent {
    pub fn new(name: impl Into<String>, role: AgentRole, completion: Arc<dyn Completion>) -> Self {
        Self {
            name: name.into(),
            role,
            system_prompt: role.default_system_prompt().to_string(),
            completion,
            history: VecDeque::new(),
            history_limit: crate::domain::constant::DEFAULT_HISTORY_LIMIT
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self.trim_history();
        self
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn history(&self) -> &VecDeque<Exchange> {
        &self.history
    }

    fn trim_history(&mut self) {
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }

    fn remember(&mut self, user: String, assistant: String) {
        if self.history_limit == 0 {
            return;
        }
        self.history.push_back(Exchange { user, assistant });
        self.trim_history();
    }
}

/// Render a task as the user prompt: description, then input, then context in key order
pub fn build_prompt(task: &Task) -> String {
    let mut prompt = format!("Task: {}", task.description);

    if !task.payload.is_null() {
        let _ = write!(prompt, "\n\nInput:\n{}", value_text(&task.payload));
    }

    if !task.context.is_empty() {
        prompt.push_str("\n\nContext from earlier steps:");
        for (label, value) in &task.context {
            let _ = write!(prompt, "\n- {}: {}", label, value_text(value));
        }
    }

    prompt
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string()
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_task(&mut self, task: &Task) -> TaskResult {
        let prompt = build_prompt(task);
        let history: Vec<Exchange> = self.history.iter().cloned().collect();

        event!(Level::DEBUG, event = agent::COMPLETION_REQUESTED, agent = %self.name, role = %self.role,
               task_id = %task.id, backend = %self.completion.backend_name(), history = history.len());

        match self.completion.complete(&self.system_prompt, &prompt, &history).await {
            Ok(reply) => {
                self.remember(prompt, reply.clone());
                TaskResult::success(task.id.clone(), Value::String(reply))
            }
            Err(e) => {
                event!(Level::WARN, event = agent::COMPLETION_FAILED, agent = %self.name,
                       task_id = %task.id, error = %e);
                TaskResult::failure(task.id.clone(), TaskErrorKind::Failed, e.to_string())
            }
        }
    }
}
