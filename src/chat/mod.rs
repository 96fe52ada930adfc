//! Chat relay: structured medical replies from the LLM gateway
//!
//! The wire types here are shared by the relay server and the relay client.

mod prompt;
mod relay;

pub use prompt::{SYSTEM_PROMPT, TOOL_NAME, tool_definition};
pub use relay::{ChatRelay, StructuredArgs, UpstreamReply};
pub(crate) use relay::truncate;

use serde::{Deserialize, Serialize};

/// Safe reply returned in the body of a failed chat relay call
pub const RELAY_FALLBACK_RESPONSE: &str = "I'm sorry, I'm having a little trouble right now. Please try again in a moment, and don't worry - I'm here to help you.";

/// Reply used when the model answers with neither a structured call nor text
pub const EMPTY_REPLY_RESPONSE: &str =
    "I'm here to help you. Could you please tell me more about how you're feeling?";

/// Speaker of a conversational turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A prior turn forwarded as context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Optional suggestion lists attached to an assistant reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestions {
    /// Over-the-counter medications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medications: Option<Vec<String>>,

    /// Things the user should do
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dos: Option<Vec<String>>,

    /// Things the user should avoid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donts: Option<Vec<String>>,
}

impl Suggestions {
    /// True when no list carries any entry
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [&self.medications, &self.dos, &self.donts]
            .iter()
            .all(|list| list.as_ref().is_none_or(Vec::is_empty))
    }
}

/// Chat relay request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Normalized chat relay reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub is_emergency: bool,
    #[serde(default)]
    pub suggestions: Suggestions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_uses_camel_case_on_the_wire() {
        let reply = ChatReply {
            response: "Rest well".to_string(),
            is_emergency: true,
            suggestions: Suggestions {
                dos: Some(vec!["Rest".to_string()]),
                ..Suggestions::default()
            },
        };

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["isEmergency"], true);
        assert_eq!(json["suggestions"]["dos"][0], "Rest");
        assert!(json["suggestions"].get("medications").is_none());
    }

    #[test]
    fn reply_defaults_missing_fields() {
        let reply: ChatReply = serde_json::from_str(r#"{"response":"hi"}"#).unwrap();
        assert!(!reply.is_emergency);
        assert!(reply.suggestions.is_empty());
    }

    #[test]
    fn suggestions_with_only_empty_lists_are_empty() {
        let suggestions = Suggestions {
            medications: Some(Vec::new()),
            dos: None,
            donts: Some(Vec::new()),
        };
        assert!(suggestions.is_empty());
    }

    #[test]
    fn history_roles_are_lowercase() {
        let entry = HistoryEntry {
            role: Role::Assistant,
            content: "Hello".to_string(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"Hello"}"#);
    }
}
