//! Upstream chat completion call and reply normalization

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::prompt::{SYSTEM_PROMPT, TOOL_NAME, tool_choice, tool_definition};
use super::{ChatReply, ChatRequest, EMPTY_REPLY_RESPONSE, Role, Suggestions};
use crate::config::ChatConfig;
use crate::{Error, Result};

/// Forwards chat turns to the LLM gateway with a forced structured reply
pub struct ChatRelay {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<SecretString>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<UpstreamMessage<'a>>,
    tools: Vec<serde_json::Value>,
    tool_choice: serde_json::Value,
}

#[derive(Serialize)]
struct UpstreamMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<AssistantMessage>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    #[serde(default)]
    name: Option<String>,
    arguments: Option<String>,
}

/// Arguments of the forced `medical_response` call
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredArgs {
    pub response: String,
    #[serde(default)]
    pub is_emergency: Option<bool>,
    #[serde(default)]
    pub suggestions: Option<Suggestions>,
}

/// What the model actually produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamReply {
    /// The forced function call was present
    Structured(StructuredArgs),
    /// Only free text came back (degraded mode)
    Unstructured(Option<String>),
}

impl UpstreamReply {
    /// Normalize into the relay reply shape
    #[must_use]
    pub fn into_reply(self) -> ChatReply {
        match self {
            Self::Structured(args) => ChatReply {
                response: args.response,
                is_emergency: args.is_emergency.unwrap_or(false),
                suggestions: args.suggestions.unwrap_or_default(),
            },
            Self::Unstructured(text) => ChatReply {
                response: text
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| EMPTY_REPLY_RESPONSE.to_string()),
                is_emergency: false,
                suggestions: Suggestions::default(),
            },
        }
    }
}

impl ChatRelay {
    /// Create a chat relay from configuration
    #[must_use]
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Whether a gateway credential is configured
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Forward one turn upstream and normalize the reply
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty message, `RateLimited` on 429,
    /// `Unavailable` on 402, and `Upstream`/`Chat` for other failures
    pub async fn complete(&self, request: &ChatRequest) -> Result<ChatReply> {
        if request.message.trim().is_empty() {
            return Err(Error::InvalidInput("message is required".to_string()));
        }

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Config("chat gateway credential not configured".to_string()))?;

        tracing::info!(
            query = %truncate(&request.message, 100),
            history = request.history.len(),
            "processing medical query"
        );

        let body = build_request(&self.model, request);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat gateway request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat gateway error");
            return Err(classify_status(status));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse chat gateway response");
            e
        })?;

        tracing::debug!("chat gateway response received");
        Ok(interpret(completion)?.into_reply())
    }
}

fn build_request<'a>(model: &'a str, request: &'a ChatRequest) -> CompletionRequest<'a> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(UpstreamMessage {
        role: "system",
        content: SYSTEM_PROMPT,
    });
    messages.extend(request.history.iter().map(|entry| UpstreamMessage {
        role: entry.role.as_str(),
        content: &entry.content,
    }));
    messages.push(UpstreamMessage {
        role: Role::User.as_str(),
        content: &request.message,
    });

    CompletionRequest {
        model,
        messages,
        tools: vec![tool_definition()],
        tool_choice: tool_choice(),
    }
}

/// Map a non-success gateway status to an error kind
fn classify_status(status: StatusCode) -> Error {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            Error::RateLimited("Rate limit exceeded. Please try again in a moment.".to_string())
        }
        StatusCode::PAYMENT_REQUIRED => Error::Unavailable(
            "Service temporarily unavailable. Please try again later.".to_string(),
        ),
        other => Error::Upstream {
            status: other.as_u16(),
            message: format!("AI request failed: {}", other.as_u16()),
        },
    }
}

/// Pick the structured call out of a completion, or fall back to its text
fn interpret(completion: CompletionResponse) -> Result<UpstreamReply> {
    let Some(message) = completion.choices.into_iter().next().and_then(|c| c.message) else {
        return Ok(UpstreamReply::Unstructured(None));
    };

    let arguments = message
        .tool_calls
        .into_iter()
        .flatten()
        .filter_map(|call| call.function)
        .find(|f| f.name.as_deref().is_none_or(|n| n == TOOL_NAME))
        .and_then(|f| f.arguments)
        .filter(|a| !a.trim().is_empty());

    match arguments {
        Some(raw) => {
            let args: StructuredArgs = serde_json::from_str(&raw)
                .map_err(|e| Error::Chat(format!("malformed {TOOL_NAME} arguments: {e}")))?;
            Ok(UpstreamReply::Structured(args))
        }
        None => Ok(UpstreamReply::Unstructured(message.content)),
    }
}

/// Shorten text for logging without splitting a character
pub(crate) fn truncate(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(idx, _)| &text[..idx])
}
