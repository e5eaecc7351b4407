use std::error::Error;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::api::{to_api_messages, ChatCompletionResponse, ChatRequest};
use crate::core::message::Turn;
use crate::utils::url::construct_api_url;

/// A completion request that failed in transport or was refused by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for RemoteError {}

/// Maps a full turn history to the text of one new assistant turn.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, turns: &[Turn]) -> Result<String, RemoteError>;
}

pub struct CompletionParams {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
}

pub struct HttpCompletionClient {
    client: reqwest::Client,
    chat_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Option<Duration>,
}

impl HttpCompletionClient {
    pub fn new(client: reqwest::Client, params: CompletionParams) -> Self {
        let CompletionParams {
            base_url,
            model,
            api_key,
            timeout,
        } = params;

        Self {
            client,
            chat_url: construct_api_url(&base_url, "chat/completions"),
            model,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, turns: &[Turn]) -> Result<String, RemoteError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: to_api_messages(turns),
            stream: false,
        };

        let mut http_request = self
            .client
            .post(&self.chat_url)
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {api_key}"));
        }
        if let Some(timeout) = self.timeout {
            http_request = http_request.timeout(timeout);
        }

        debug!(url = %self.chat_url, turns = turns.len(), "sending completion request");

        let response = http_request
            .json(&request)
            .send()
            .await
            .map_err(|err| RemoteError::new(format!("Request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            debug!(%status, "completion endpoint returned an error");
            return Err(RemoteError::new(format!(
                "{} (HTTP {})",
                format_api_error(&error_text),
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|err| RemoteError::new(format!("Failed to read response: {err}")))?;
        parse_completion_body(&body)
    }
}

pub(crate) fn parse_completion_body(body: &str) -> Result<String, RemoteError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|err| {
        RemoteError::new(format!("Malformed completion response: {err}"))
    })?;

    parsed
        .first_content()
        .map(str::to_owned)
        .ok_or_else(|| RemoteError::new("Completion response contained no choices"))
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Render an error body from the completion endpoint as a readable message.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            if let Some(summary) = extract_error_summary(&json_value) {
                if !summary.is_empty() {
                    return format!("API Error: {summary}\n```json\n{pretty_json}\n```");
                }
            }
            return format!("API Error:\n```json\n{pretty_json}\n```");
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{trimmed}\n```")
    } else {
        format!("API Error:\n```\n{trimmed}\n```")
    }
}
