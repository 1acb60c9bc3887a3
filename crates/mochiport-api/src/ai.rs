use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use mochiport_types::models::MessageRole;
use mochiport_types::text::{truncate_chars, word_count};

pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Mochiport, a helpful assistant. Answer clearly and \
     concisely, and help the user keep track of follow-ups, drafts and reminders.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_TOKENS: u32 = 800;
const TEMPERATURE: f32 = 0.7;

/// One entry of the prompt sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiReply {
    pub content: String,
    pub model: String,
    pub token_count: Option<u32>,
}

/// A chat completion backend.
#[async_trait]
pub trait AiService: Send + Sync {
    /// Short name reported by the health endpoint.
    fn name(&self) -> &'static str;

    async fn complete(&self, turns: &[ChatTurn]) -> Result<AiReply>;
}

// -- Azure OpenAI --

#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
}

pub struct AzureOpenAiService {
    client: Client,
    config: AzureOpenAiConfig,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [ChatTurn],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct CompletionUsage {
    total_tokens: u32,
}

impl AzureOpenAiService {
    pub fn new(config: AzureOpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.deployment,
            self.config.api_version
        )
    }
}

#[async_trait]
impl AiService for AzureOpenAiService {
    fn name(&self) -> &'static str {
        "azure-openai"
    }

    async fn complete(&self, turns: &[ChatTurn]) -> Result<AiReply> {
        let body = CompletionRequest {
            messages: turns,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        debug!("Sending {} turns to deployment {}", turns.len(), self.config.deployment);
        let resp = self
            .client
            .post(self.url())
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach Azure OpenAI")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err_body = resp.text().await.unwrap_or_default();
            error!("Azure OpenAI request failed ({}): {}", status, err_body);
            bail!("Azure OpenAI returned {}", status);
        }

        let parsed: CompletionResponse = resp.json().await.context("Malformed completion response")?;
        parse_completion(parsed, &self.config.deployment)
    }
}

fn parse_completion(resp: CompletionResponse, deployment: &str) -> Result<AiReply> {
    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .unwrap_or_default();
    if content.is_empty() {
        bail!("Completion contained no content");
    }

    Ok(AiReply {
        content,
        model: resp.model.unwrap_or_else(|| deployment.to_string()),
        token_count: resp.usage.map(|u| u.total_tokens),
    })
}

// -- Mock --

/// Deterministic stand-in used in development and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockAiService;

#[async_trait]
impl AiService for MockAiService {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, turns: &[ChatTurn]) -> Result<AiReply> {
        let last = turns
            .iter()
            .rev()
            .find(|t| t.role == MessageRole::User)
            .map(|t| t.content.as_str())
            .unwrap_or_default();

        let content = format!(
            "This is a mock response to: \"{}\"",
            truncate_chars(last, 100)
        );
        let token_count = turns.iter().map(|t| word_count(&t.content)).sum::<usize>()
            + word_count(&content);

        Ok(AiReply {
            content,
            model: "mock".to_string(),
            token_count: u32::try_from(token_count).ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(endpoint: &str) -> AzureOpenAiService {
        AzureOpenAiService::new(AzureOpenAiConfig {
            endpoint: endpoint.into(),
            api_key: "key".into(),
            deployment: "gpt-4o".into(),
            api_version: DEFAULT_API_VERSION.into(),
        })
        .unwrap()
    }

    #[test]
    fn azure_url_layout() {
        assert_eq!(
            service("https://example.openai.azure.com/").url(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn request_uses_lowercase_roles() {
        let turns = [ChatTurn::new(MessageRole::System, "be nice"), ChatTurn::new(MessageRole::User, "hi")];
        let body = serde_json::to_value(CompletionRequest {
            messages: &turns,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        })
        .unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["max_tokens"], 800);
    }

    #[test]
    fn parses_completion_with_usage() {
        let resp: CompletionResponse = serde_json::from_value(serde_json::json!({
            "model": "gpt-4o-2024",
            "choices": [{ "message": { "role": "assistant", "content": " Hello there " } }],
            "usage": { "prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7 }
        }))
        .unwrap();
        let reply = parse_completion(resp, "gpt-4o").unwrap();
        assert_eq!(reply.content, "Hello there");
        assert_eq!(reply.model, "gpt-4o-2024");
        assert_eq!(reply.token_count, Some(7));
    }

    #[test]
    fn empty_completion_is_an_error() {
        let resp: CompletionResponse =
            serde_json::from_value(serde_json::json!({ "choices": [] })).unwrap();
        assert!(parse_completion(resp, "gpt-4o").is_err());
    }

    #[tokio::test]
    async fn mock_echoes_last_user_turn() {
        let turns = vec![
            ChatTurn::new(MessageRole::System, "prompt"),
            ChatTurn::new(MessageRole::User, "first"),
            ChatTurn::new(MessageRole::Assistant, "reply"),
            ChatTurn::new(MessageRole::User, "second question"),
        ];
        let reply = MockAiService.complete(&turns).await.unwrap();
        assert_eq!(reply.content, "This is a mock response to: \"second question\"");
        assert_eq!(reply.model, "mock");
        assert!(reply.token_count.unwrap() > 0);
    }
}
