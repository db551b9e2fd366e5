use serde::{Deserialize, Serialize};
use std::fmt;

use super::tenant::TenantId;
use crate::domain::errors::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Inactive,
    Invited,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Active => "active",
            AgentStatus::Inactive => "inactive",
            AgentStatus::Invited => "invited",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AgentStatus::Active),
            "inactive" => Ok(AgentStatus::Inactive),
            "invited" => Ok(AgentStatus::Invited),
            other => Err(ChatError::Persistence(format!("Unknown agent status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Owner,
    Agent,
    AgentReadonly,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Owner => "owner",
            AgentRole::Agent => "agent",
            AgentRole::AgentReadonly => "agent_readonly",
        }
    }

    /// Read-only agents can watch and acknowledge, never write or transition.
    pub fn can_reply(&self) -> bool {
        !matches!(self, AgentRole::AgentReadonly)
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentRole {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(AgentRole::Owner),
            "agent" => Ok(AgentRole::Agent),
            "agent_readonly" => Ok(AgentRole::AgentReadonly),
            other => Err(ChatError::Persistence(format!("Unknown agent role: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub tenant_id: TenantId,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub status: AgentStatus,
    pub role: AgentRole,
    pub max_concurrent_chats: i64,
    pub last_seen_at: Option<String>,
    #[serde(skip_serializing)]
    pub invite_token: Option<String>,
    pub invite_expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Agent {
    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}

/// How an agent connection identifies itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentIdentity {
    Id(i64),
    Email(String),
}

#[derive(Debug, Clone)]
pub struct NewAgentInvite {
    pub tenant_id: TenantId,
    pub name: String,
    pub email: String,
    pub role: AgentRole,
    pub max_concurrent_chats: i64,
    pub invite_token: String,
    pub invite_expires_at: String,
}

/// Profile sent to the agent's own connection after registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: AgentRole,
}

impl From<&Agent> for AgentProfile {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name.clone(),
            email: agent.email.clone(),
            avatar: agent.avatar.clone(),
            role: agent.role,
        }
    }
}
