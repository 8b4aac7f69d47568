//! Completion backends
//!
//! - MockCompletion: keyword-triggered canned text, fully offline
//! - HttpCompletion: OpenAI-compatible chat completions over HTTP

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{Level, event};

use crate::{
    config::{CompletionBackend, CompletionConfig},
    domain::{constant::agent, error::SwarmError},
    port::completion::{Completion, Exchange}
};

/// Deterministic stand-in for a language model
///
/// The keyword occurring earliest (case-insensitively) in the user prompt selects
/// the reply. Configured pairs are consulted before the built-in ones.
pub struct MockCompletion {
    configured: Vec<(String, String)>,
    builtin:    Vec<(String, String)>
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::with_replies(Vec::new())
    }

    /// Mock with extra keyword -> reply pairs that take precedence over the built-ins
    pub fn with_replies(replies: Vec<(String, String)>) -> Self {
        let configured = replies.into_iter().map(|(keyword, reply)| (keyword.to_lowercase(), reply)).collect();
        Self { configured, builtin: Self::builtin_replies() }
    }

    fn builtin_replies() -> Vec<(String, String)> {
        [
            ("research", "Research notes: three independent sources agree on the core facts; one open question remains."),
            ("analy", "Analysis: the findings point to a clear trend with moderate confidence and two notable risks."),
            ("review", "Review: the draft is accurate and well structured; tighten the introduction."),
            ("write", "Draft: a concise write-up presenting the key findings, the trend and the recommended next step."),
            ("summar", "Summary: the essential points in three sentences.")
        ]
        .into_iter()
        .map(|(keyword, reply)| (keyword.to_string(), reply.to_string()))
        .collect()
    }

    fn earliest<'a>(replies: &'a [(String, String)], prompt: &str) -> Option<&'a String> {
        replies
            .iter()
            .filter_map(|(keyword, reply)| prompt.find(keyword.as_str()).map(|position| (position, reply)))
            .min_by_key(|(position, _)| *position)
            .map(|(_, reply)| reply)
    }

    fn reply_for(&self, user_prompt: &str) -> String {
        let prompt = user_prompt.to_lowercase();

        Self::earliest(&self.configured, &prompt)
            .or_else(|| Self::earliest(&self.builtin, &prompt))
            .cloned()
            .unwrap_or_else(|| {
                let first_line = user_prompt.lines().next().unwrap_or_default();
                let excerpt: String = first_line.chars().take(120).collect();
                format!("Acknowledged: {}", excerpt)
            })
    }
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Completion for MockCompletion {
    async fn complete(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        _history: &[Exchange]
    ) -> Result<String, SwarmError> {
        Ok(self.reply_for(user_prompt))
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model:       &'a str,
    messages:    Vec<ChatMessage>,
    temperature: f32,
    max_tokens:  u32
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct ChatMessage {
    role:    String,
    content: String
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self { role: role.to_string(), content: content.to_string() }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>
}

/// Reqwest client for an OpenAI-compatible `/chat/completions` endpoint
pub struct HttpCompletion {
    client:  reqwest::Client,
    config:  CompletionConfig,
    api_key: String
}

impl HttpCompletion {
    /// Build a client bound to the configured request timeout
    pub fn new(config: CompletionConfig, api_key: String) -> Result<Self, SwarmError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SwarmError::Completion(format!("failed to build completion HTTP client: {}", e)))?;

        Ok(Self { client, config, api_key })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn build_request<'a>(
        &'a self,
        system_prompt: &str,
        user_prompt: &str,
        history: &[Exchange]
    ) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ChatMessage::new("system", system_prompt));
        for exchange in history {
            messages.push(ChatMessage::new("user", &exchange.user));
            messages.push(ChatMessage::new("assistant", &exchange.assistant));
        }
        messages.push(ChatMessage::new("user", user_prompt));

        ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens
        }
    }
}

#[async_trait]
impl Completion for HttpCompletion {
    async fn complete(&self, system_prompt: &str, user_prompt: &str, history: &[Exchange]) -> Result<String, SwarmError> {
        let request = self.build_request(system_prompt, user_prompt, history);

        event!(Level::DEBUG, event = agent::COMPLETION_REQUESTED, backend = "http",
               model = %self.config.model, history = history.len());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SwarmError::Completion(format!("completion request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SwarmError::Completion(format!("completion backend returned {}: {}", status, body)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| SwarmError::Completion(format!("unreadable completion response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| SwarmError::Completion("completion response had no content".to_string()))
    }

    fn backend_name(&self) -> &str {
        "http"
    }
}

/// Completion Factory - Configuration-driven backend creation
pub struct CompletionFactory;

impl CompletionFactory {
    /// Create the configured backend, falling back to the mock when no API key is available
    pub fn create(config: &CompletionConfig) -> Arc<dyn Completion> {
        let mock = || {
            let replies = config.canned.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            Arc::new(MockCompletion::with_replies(replies)) as Arc<dyn Completion>
        };

        match config.backend {
            CompletionBackend::Mock => {
                event!(Level::DEBUG, event = agent::BACKEND_SELECTED, backend = "mock");
                mock()
            }
            CompletionBackend::OpenAi => match config.api_key() {
                Some(api_key) => match HttpCompletion::new(config.clone(), api_key) {
                    Ok(http) => {
                        event!(Level::INFO, event = agent::BACKEND_SELECTED, backend = "http",
                               base_url = %config.base_url, model = %config.model);
                        Arc::new(http)
                    }
                    Err(e) => {
                        event!(Level::WARN, event = agent::BACKEND_SELECTED, backend = "mock",
                               message = "http_client_unavailable_using_mock", error = %e);
                        mock()
                    }
                },
                None => {
                    event!(Level::WARN, event = agent::BACKEND_SELECTED, backend = "mock",
                           message = "api_key_missing_using_mock", api_key_env = %config.api_key_env);
                    mock()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_mock_is_keyword_triggered_and_deterministic() {
        let mock = MockCompletion::new();

        let first = mock.complete("sys", "Please RESEARCH the market", &[]).await.unwrap();
        let second = mock.complete("other", "please research the market", &[]).await.unwrap();

        assert!(first.starts_with("Research notes"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_mock_configured_replies_take_precedence() {
        let mock = MockCompletion::with_replies(vec![("Research".to_string(), "custom".to_string())]);

        assert_eq!(mock.complete("", "research this", &[]).await.unwrap(), "custom");
    }

    #[tokio::test]
    async fn test_mock_picks_earliest_keyword() {
        let mock = MockCompletion::new();

        let reply = mock.complete("", "Task: Analyze the research notes", &[]).await.unwrap();
        assert!(reply.starts_with("Analysis"));
    }

    #[tokio::test]
    async fn test_mock_fallback_echoes_first_line() {
        let mock = MockCompletion::new();

        let reply = mock.complete("", "ping the pong\nsecond line", &[]).await.unwrap();
        assert_eq!(reply, "Acknowledged: ping the pong");
    }

    #[test]
    fn test_http_request_threads_history_between_system_and_prompt() {
        let completion = HttpCompletion::new(CompletionConfig::default(), "key".to_string()).unwrap();
        let history = vec![Exchange { user: "q1".to_string(), assistant: "a1".to_string() }];

        let request = completion.build_request("be brief", "q2", &history);
        let roles: Vec<&str> = request.messages.iter().map(|m| m.role.as_str()).collect();

        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(request.messages.last().map(|m| m.content.as_str()), Some("q2"));
        assert_eq!(completion.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_factory_falls_back_to_mock_without_api_key() {
        let config = CompletionConfig {
            backend: CompletionBackend::OpenAi,
            api_key_env: "SWARM_ENGINE_TEST_KEY_NEVER_SET".to_string(),
            ..CompletionConfig::default()
        };

        assert_eq!(CompletionFactory::create(&config).backend_name(), "mock");
    }

    #[test]
    fn test_http_client_is_built_with_request_timeout() {
        let config = CompletionConfig { request_timeout_secs: 7, ..CompletionConfig::default() };

        let completion = HttpCompletion::new(config, "key".to_string()).unwrap();

        assert_eq!(completion.config.request_timeout(), Duration::from_secs(7));
        assert_eq!(completion.backend_name(), "http");
    }
}
