use serde::{Deserialize, Serialize};
use std::fmt;

use super::tenant::TenantId;
use crate::domain::errors::{ChatError, ChatResult};

/// Hard cap on stored message length, in characters.
pub const MAX_MESSAGE_CHARS: usize = 5000;

/// Author of a message. Closed set; there is no free-form sender string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Agent,
    System,
}

impl SenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderType::User => "user",
            SenderType::Agent => "agent",
            SenderType::System => "system",
        }
    }
}

impl fmt::Display for SenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SenderType {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(SenderType::User),
            "agent" => Ok(SenderType::Agent),
            "system" => Ok(SenderType::System),
            other => Err(ChatError::Persistence(format!("Unknown sender type: {}", other))),
        }
    }
}

/// Side of the conversation acknowledging messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderType {
    User,
    Agent,
}

impl ReaderType {
    /// Messages this reader acknowledges are the ones the other side wrote.
    pub fn acknowledges(&self) -> SenderType {
        match self {
            ReaderType::Agent => SenderType::User,
            ReaderType::User => SenderType::Agent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub tenant_id: TenantId,
    pub sender_type: SenderType,
    pub sender_id: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}

/// Row to insert, produced by the pipeline after sanitisation.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: i64,
    pub tenant_id: TenantId,
    pub sender_type: SenderType,
    pub sender_id: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}

/// Trim and cap a raw chat body. Empty bodies are rejected.
pub fn sanitize_message(raw: &str) -> ChatResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ChatError::validation("Message cannot be empty"));
    }

    if trimmed.chars().count() <= MAX_MESSAGE_CHARS {
        return Ok(trimmed.to_string());
    }

    // Truncation can expose trailing whitespace
    let truncated: String = trimmed.chars().take(MAX_MESSAGE_CHARS).collect();
    Ok(truncated.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_trims() {
        assert_eq!(sanitize_message("  Hello \n").unwrap(), "Hello");
    }

    #[test]
    fn test_sanitize_rejects_blank() {
        assert!(matches!(sanitize_message(""), Err(ChatError::Validation(_))));
        assert!(matches!(sanitize_message(" \t\n "), Err(ChatError::Validation(_))));
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        let raw = "é".repeat(MAX_MESSAGE_CHARS + 10);
        let clean = sanitize_message(&raw).unwrap();
        assert_eq!(clean.chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_reader_acknowledges_other_side() {
        assert_eq!(ReaderType::Agent.acknowledges(), SenderType::User);
        assert_eq!(ReaderType::User.acknowledges(), SenderType::Agent);
    }
}
