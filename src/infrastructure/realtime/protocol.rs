use serde::{Deserialize, Deserializer};

use crate::domain::entities::ReaderType;
use crate::domain::errors::{ChatError, ChatResult};

/// Widgets send guest ids both as strings and as bare numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseId {
    Text(String),
    Int(i64),
}

fn loose_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<LooseId>::deserialize(deserializer)?.map(|id| match id {
        LooseId::Text(text) => text,
        LooseId::Int(n) => n.to_string(),
    }))
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IdentifyUser {
    pub session_id: String,
    #[serde(default, deserialize_with = "loose_id")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "loose_id")]
    pub guest_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IdentifyAgent {
    pub agent_id: Option<i64>,
    pub agent_email: Option<String>,
    pub agent_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UserMessage {
    pub conversation_id: Option<i64>,
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentMessage {
    pub conversation_id: i64,
    pub session_id: Option<String>,
    pub agent_id: Option<i64>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MarkRead {
    pub conversation_id: i64,
    pub reader_type: ReaderType,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ConversationRef {
    pub conversation_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TypingSignal {
    pub conversation_id: Option<i64>,
    pub session_id: Option<String>,
}

/// Client → server events, framed as `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    IdentifyUser(IdentifyUser),
    IdentifyAgent(IdentifyAgent),
    UserMessage(UserMessage),
    AgentMessage(AgentMessage),
    MarkRead(MarkRead),
    TakeConversation(ConversationRef),
    CloseConversation(ConversationRef),
    Typing(TypingSignal),
    StoppedTyping(TypingSignal),
    WatchConversation(ConversationRef),
    UnwatchConversation(ConversationRef),
    LoadHistory(ConversationRef),
}

impl ClientEvent {
    pub fn parse(frame: &str) -> ChatResult<Self> {
        serde_json::from_str(frame)
            .map_err(|e| ChatError::validation(format!("Malformed event: {}", e)))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::IdentifyUser(_) => "identify-user",
            ClientEvent::IdentifyAgent(_) => "identify-agent",
            ClientEvent::UserMessage(_) => "user-message",
            ClientEvent::AgentMessage(_) => "agent-message",
            ClientEvent::MarkRead(_) => "mark-read",
            ClientEvent::TakeConversation(_) => "take-conversation",
            ClientEvent::CloseConversation(_) => "close-conversation",
            ClientEvent::Typing(_) => "typing",
            ClientEvent::StoppedTyping(_) => "stopped-typing",
            ClientEvent::WatchConversation(_) => "watch-conversation",
            ClientEvent::UnwatchConversation(_) => "unwatch-conversation",
            ClientEvent::LoadHistory(_) => "load-history",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identify_user_with_numeric_guest() {
        let event = ClientEvent::parse(
            r#"{"event":"identify-user","data":{"session_id":"s1","guest_id":42}}"#,
        )
        .unwrap();

        assert_eq!(
            event,
            ClientEvent::IdentifyUser(IdentifyUser {
                session_id: "s1".to_string(),
                user_id: None,
                guest_id: Some("42".to_string()),
            })
        );
    }

    #[test]
    fn test_parse_mark_read() {
        let event = ClientEvent::parse(
            r#"{"event":"mark-read","data":{"conversation_id":3,"reader_type":"agent"}}"#,
        )
        .unwrap();

        match event {
            ClientEvent::MarkRead(mark) => {
                assert_eq!(mark.conversation_id, 3);
                assert_eq!(mark.reader_type, ReaderType::Agent);
                assert_eq!(mark.session_id, None);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_stopped_typing_with_empty_data() {
        let event = ClientEvent::parse(r#"{"event":"stopped-typing","data":{}}"#).unwrap();
        assert_eq!(event, ClientEvent::StoppedTyping(TypingSignal::default()));
        assert_eq!(event.name(), "stopped-typing");
    }

    #[test]
    fn test_unknown_event_is_validation_error() {
        let err = ClientEvent::parse(r#"{"event":"delete-everything","data":{}}"#).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let err = ClientEvent::parse(r#"{"event":"user-message","data":{"session_id":"s1"}}"#)
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
    }
}
