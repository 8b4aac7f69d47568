use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::SwarmError;

/// One prior prompt/answer pair fed back as conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub user:      String,
    pub assistant: String
}

/// Language completion capability consumed by LLM-backed agents
#[async_trait]
pub trait Completion: Send + Sync {
    /// Produce text for `user_prompt` under `system_prompt`, given earlier exchanges
    async fn complete(&self, system_prompt: &str, user_prompt: &str, history: &[Exchange])
    -> Result<String, SwarmError>;

    /// Backend identifier for logs
    fn backend_name(&self) -> &str;
}
