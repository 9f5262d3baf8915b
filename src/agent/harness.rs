//! Generic OpenAI-compatible chat-completion client.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::chat::{ChatClient, ChatMessage, ToolSpec};
use crate::runtime::error::{LlmError, LlmResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Connection settings for the chat endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    /// Bearer token, when the endpoint requires one.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Request timeout.
    pub timeout_secs: Option<u64>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: None,
        }
    }
}

impl ChatSettings {
    /// Read `LLM_BASE_URL`, `LLM_API_KEY`, `LLM_MODEL_NAME`, and
    /// `LLM_TIMEOUT_SECS`, falling back to defaults for unset or blank values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_value("LLM_BASE_URL").unwrap_or(defaults.base_url),
            api_key: env_value("LLM_API_KEY"),
            model: env_value("LLM_MODEL_NAME").unwrap_or(defaults.model),
            timeout_secs: env_value("LLM_TIMEOUT_SECS").and_then(|value| value.parse().ok()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Chat collaborator speaking the OpenAI chat-completions protocol.
pub struct OpenAiChatClient {
    settings: ChatSettings,
    client: Client,
}

impl OpenAiChatClient {
    /// Build a client for `settings`.
    pub fn new(settings: ChatSettings) -> LlmResult<Self> {
        let client = build_client(settings.timeout_secs)
            .map_err(|err| LlmError::Request(format!("failed to construct HTTP client: {err}")))?;
        Ok(Self { settings, client })
    }

    /// Build a client from environment settings.
    pub fn from_env() -> LlmResult<Self> {
        Self::new(ChatSettings::from_env())
    }

    /// Settings in use.
    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    fn headers(&self) -> LlmResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = self.settings.api_key.as_ref() {
            let value = format!("Bearer {key}");
            let header_value = HeaderValue::from_str(&value)
                .map_err(|err| LlmError::Request(format!("invalid API key header: {err}")))?;
            headers.insert(AUTHORIZATION, header_value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn ask(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> LlmResult<ChatMessage> {
        let endpoint = self.settings.endpoint();
        let body = request_body(&self.settings.model, messages, tools);

        let response = self
            .client
            .post(&endpoint)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|err| LlmError::Request(format!("request to {endpoint} failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            return Err(LlmError::Request(format!(
                "endpoint {endpoint} returned {status}: {text}"
            )));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|err| LlmError::ResponseParse(format!("failed to parse completion payload: {err}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| LlmError::ResponseParse("completion payload has no choices".to_string()))
    }
}

fn build_client(timeout_secs: Option<u64>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build()
}

fn request_body(model: &str, messages: &[ChatMessage], tools: &[ToolSpec]) -> serde_json::Value {
    let mut body = json!({
        "model": model,
        "messages": messages,
        "temperature": 0,
    });
    if !tools.is_empty() {
        body["tools"] = json!(tools);
    }
    body
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::chat::ToolCall;

    #[test]
    fn endpoint_joins_base_url() {
        let settings = ChatSettings {
            base_url: "http://localhost:11434/v1/".to_string(),
            ..ChatSettings::default()
        };
        assert_eq!(settings.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn body_omits_empty_tool_list() {
        let body = request_body("m", &[ChatMessage::user("hi")], &[]);
        assert!(body.get("tools").is_none());
        assert_eq!(body["temperature"], 0);
        assert_eq!(body["messages"][0]["role"], "user");

        let tool = ToolSpec::function("open", "Open a URL", json!({"type": "object"}));
        let body = request_body("m", &[], &[tool]);
        assert_eq!(body["tools"][0]["function"]["name"], "open");
    }

    #[test]
    fn completion_message_with_tool_calls_decodes() {
        let payload = r#"{"choices":[{"message":{"role":"assistant","content":null,"tool_calls":[{"id":"1","type":"function","function":{"name":"open","arguments":"{\"url\":\"x\"}"}}]}}]}"#;
        let completion: ChatCompletion = serde_json::from_str(payload).unwrap();
        let message = &completion.choices[0].message;
        assert_eq!(message.tool_calls, vec![ToolCall::new("1", "open", r#"{"url":"x"}"#)]);
    }
}
