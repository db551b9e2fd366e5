use serde::{Deserialize, Serialize};
use std::fmt;

use super::tenant::TenantId;
use crate::domain::errors::{ChatError, ChatResult};

/// Conversation status.
///
/// `Pending` is never entered automatically; only callers of
/// `ConversationService::mark_pending` put a conversation there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Open,
    Pending,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Open => "open",
            ConversationStatus::Pending => "pending",
            ConversationStatus::Closed => "closed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversationStatus::Closed)
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ConversationStatus::Open),
            "pending" => Ok(ConversationStatus::Pending),
            "closed" => Ok(ConversationStatus::Closed),
            other => Err(ChatError::Persistence(format!(
                "Unknown conversation status: {}",
                other
            ))),
        }
    }
}

/// Who is on the end-user side of a conversation: an authenticated user, a
/// guest, or neither. Never both.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Participant {
    User(String),
    Guest(String),
    #[default]
    Anonymous,
}

impl Participant {
    pub fn from_ids(user_id: Option<String>, guest_id: Option<String>) -> ChatResult<Self> {
        let user_id = user_id.filter(|s| !s.trim().is_empty());
        let guest_id = guest_id.filter(|s| !s.trim().is_empty());

        match (user_id, guest_id) {
            (Some(_), Some(_)) => Err(ChatError::validation(
                "Provide either user_id or guest_id, not both",
            )),
            (Some(user), None) => Ok(Participant::User(user)),
            (None, Some(guest)) => Ok(Participant::Guest(guest)),
            (None, None) => Ok(Participant::Anonymous),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Participant::User(id) => Some(id),
            _ => None,
        }
    }

    pub fn guest_id(&self) -> Option<&str> {
        match self {
            Participant::Guest(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub tenant_id: TenantId,
    pub session_id: String,
    pub user_id: Option<String>,
    pub guest_id: Option<String>,
    pub status: ConversationStatus,
    pub agent_id: Option<i64>,
    pub last_message: Option<String>,
    pub last_message_time: Option<String>,
    pub unread_count: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub closed_at: Option<String>,
}

impl Conversation {
    pub fn belongs_to(&self, tenant_id: TenantId) -> bool {
        self.tenant_id == tenant_id
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_terminal() || !self.is_active
    }

    /// Identifier recorded as `sender_id` for messages from the end user.
    pub fn end_user_id(&self) -> &str {
        self.user_id
            .as_deref()
            .or(self.guest_id.as_deref())
            .unwrap_or(&self.session_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewConversation {
    pub tenant_id: TenantId,
    pub session_id: String,
    pub participant: Participant,
}

/// Result of an attempt to put an agent on a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentOutcome {
    Assigned,
    AlreadyAssigned,
    AssignedToOther(i64),
    /// The agent already holds as many active conversations as allowed.
    AtCapacity,
}

/// Compact view sent to agent dashboards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    pub id: i64,
    pub session_id: String,
    pub status: ConversationStatus,
    pub agent_id: Option<i64>,
    pub last_message: Option<String>,
    pub last_message_time: Option<String>,
    pub unread_count: i64,
}

impl From<&Conversation> for ConversationSummary {
    fn from(conv: &Conversation) -> Self {
        Self {
            id: conv.id,
            session_id: conv.session_id.clone(),
            status: conv.status,
            agent_id: conv.agent_id,
            last_message: conv.last_message.clone(),
            last_message_time: conv.last_message_time.clone(),
            unread_count: conv.unread_count,
        }
    }
}
