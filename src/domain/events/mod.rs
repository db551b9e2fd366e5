use serde::{Deserialize, Serialize};

use crate::domain::entities::{
    AgentProfile, ConversationStatus, ConversationSummary, Message, ReaderType, SenderType,
    TenantId,
};
use crate::domain::errors::ChatError;

/// Message as delivered to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagePayload {
    pub id: i64,
    pub conversation_id: i64,
    pub session_id: String,
    pub sender_type: SenderType,
    pub sender_id: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}

impl MessagePayload {
    pub fn new(message: &Message, session_id: &str) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            session_id: session_id.to_string(),
            sender_type: message.sender_type,
            sender_id: message.sender_id.clone(),
            message: message.message.clone(),
            is_read: message.is_read,
            created_at: message.created_at.clone(),
        }
    }
}

/// Server → client events. Serialised as `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ChatEvent {
    ConversationReady {
        conversation_id: i64,
        session_id: String,
        status: ConversationStatus,
        is_new: bool,
        within_business_hours: bool,
    },
    AgentRegistered {
        agent: AgentProfile,
        tenant_id: TenantId,
        conversations: Vec<ConversationSummary>,
        online_agents: Vec<i64>,
    },
    NewMessage(MessagePayload),
    NewUserMessage(MessagePayload),
    NewAgentMessage(MessagePayload),
    MessagesRead {
        conversation_id: i64,
        reader_type: ReaderType,
        count: u64,
    },
    AgentJoined {
        conversation_id: i64,
        agent_id: i64,
        agent_name: String,
    },
    ConversationClosed {
        conversation_id: i64,
        closed_by: i64,
        agent_name: String,
    },
    TypingUpdate {
        conversation_id: Option<i64>,
        session_id: String,
        sender_type: SenderType,
        agent_id: Option<i64>,
        is_typing: bool,
    },
    AgentStatus {
        agent_id: i64,
        online: bool,
    },
    ConversationHistory {
        conversation_id: i64,
        messages: Vec<MessagePayload>,
    },
    Error {
        message: String,
        code: String,
    },
}

impl ChatEvent {
    pub fn error(err: &ChatError) -> Self {
        ChatEvent::Error {
            message: err.public_message(),
            code: err.code().to_string(),
        }
    }

    /// Wire name of the event, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::ConversationReady { .. } => "conversation-ready",
            ChatEvent::AgentRegistered { .. } => "agent-registered",
            ChatEvent::NewMessage(_) => "new-message",
            ChatEvent::NewUserMessage(_) => "new-user-message",
            ChatEvent::NewAgentMessage(_) => "new-agent-message",
            ChatEvent::MessagesRead { .. } => "messages-read",
            ChatEvent::AgentJoined { .. } => "agent-joined",
            ChatEvent::ConversationClosed { .. } => "conversation-closed",
            ChatEvent::TypingUpdate { .. } => "typing-update",
            ChatEvent::AgentStatus { .. } => "agent-status",
            ChatEvent::ConversationHistory { .. } => "conversation-history",
            ChatEvent::Error { .. } => "error",
        }
    }
}
