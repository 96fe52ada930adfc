//! Conversation engine: ordered message history and one chat turn at a time

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::{ChatReply, ChatRelay, ChatRequest, HistoryEntry, Role, Suggestions};
use crate::{Error, Result};

/// Number of prior messages forwarded as context
pub const HISTORY_WINDOW: usize = 10;

/// Assistant text appended when a turn fails
pub const APOLOGY: &str =
    "I'm sorry, I'm having trouble responding right now. Please try again in a moment.";

/// Anything that can answer a chat request
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one turn and return the structured reply
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply>;
}

#[async_trait]
impl ChatBackend for ChatRelay {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        self.complete(request).await
    }
}

/// Callback notified of failures that were converted into a fallback reply
pub type ErrorObserver = Arc<dyn Fn(&Error) + Send + Sync>;

/// One conversational turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_emergency: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Suggestions>,
}

impl Message {
    /// A user utterance
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            is_emergency: None,
            suggestions: None,
        }
    }

    /// An assistant message built from a relay reply
    #[must_use]
    pub fn assistant(reply: ChatReply) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: reply.response,
            timestamp: Utc::now(),
            is_emergency: Some(reply.is_emergency),
            suggestions: Some(reply.suggestions),
        }
    }

    /// The fixed apology shown when a turn fails
    #[must_use]
    pub fn apology() -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: APOLOGY.to_string(),
            timestamp: Utc::now(),
            is_emergency: None,
            suggestions: None,
        }
    }

    /// Whether the assistant flagged this turn as urgent
    #[must_use]
    pub fn is_emergency(&self) -> bool {
        self.is_emergency.unwrap_or(false)
    }

    fn to_history(&self) -> HistoryEntry {
        HistoryEntry {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Owns the session's message history
///
/// `send_message` takes `&mut self`, so a single engine can never run two
/// turns at once and history appends stay ordered.
pub struct ConversationEngine {
    backend: Arc<dyn ChatBackend>,
    messages: Vec<Message>,
    busy: bool,
    on_error: Option<ErrorObserver>,
}

impl ConversationEngine {
    /// Create an engine with empty history
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            messages: Vec::new(),
            busy: false,
            on_error: None,
        }
    }

    /// Register the error observer
    #[must_use]
    pub fn on_error(mut self, observer: ErrorObserver) -> Self {
        self.on_error = Some(observer);
        self
    }

    /// Full history, oldest first
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Whether a turn is in flight
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// Drop all history
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// The most recent messages forwarded as context, oldest first
    #[must_use]
    pub fn history_window(&self) -> Vec<HistoryEntry> {
        let start = self.messages.len().saturating_sub(HISTORY_WINDOW);
        self.messages[start..].iter().map(Message::to_history).collect()
    }

    /// Run one turn
    ///
    /// Blank input is ignored. Otherwise exactly one user and one assistant
    /// message are appended; on failure the assistant message is the fixed
    /// apology, the observer is notified and `None` is returned.
    pub async fn send_message(&mut self, text: &str) -> Option<Message> {
        if text.trim().is_empty() {
            return None;
        }

        let request = ChatRequest {
            message: text.to_string(),
            history: self.history_window(),
        };

        self.messages.push(Message::user(text));
        self.busy = true;

        let result = self.backend.chat(&request).await;
        self.busy = false;

        match result {
            Ok(reply) => {
                let message = Message::assistant(reply);
                tracing::debug!(
                    id = %message.id,
                    emergency = message.is_emergency(),
                    "assistant reply appended"
                );
                self.messages.push(message.clone());
                Some(message)
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat turn failed, appending apology");
                if let Some(observer) = &self.on_error {
                    observer(&e);
                }
                self.messages.push(Message::apology());
                None
            }
        }
    }
}
