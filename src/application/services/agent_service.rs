use chrono::Utc;
use std::sync::Arc;

use crate::domain::entities::{Agent, AgentIdentity, AgentRole, NewAgentInvite, TenantId};
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::ports::agent_repository::AgentRepository;
use crate::shared::utils::{
    format_timestamp, generate_invite_token, now_timestamp, parse_timestamp,
    validate_and_normalize_email,
};

pub const DEFAULT_MAX_CONCURRENT_CHATS: i64 = 5;

#[derive(Clone)]
pub struct AgentService {
    agent_repo: Arc<dyn AgentRepository>,
    invite_ttl: chrono::Duration,
}

impl AgentService {
    pub fn new(agent_repo: Arc<dyn AgentRepository>, invite_ttl: chrono::Duration) -> Self {
        Self {
            agent_repo,
            invite_ttl,
        }
    }

    /// Resolve an agent connection's identity inside the connection's tenant.
    ///
    /// Agents of other tenants are indistinguishable from unknown agents.
    #[tracing::instrument(skip(self))]
    pub async fn identify_agent(
        &self,
        tenant_id: TenantId,
        identity: AgentIdentity,
    ) -> ChatResult<Agent> {
        let agent = match &identity {
            AgentIdentity::Id(id) => self.agent_repo.get_agent(tenant_id, *id).await?,
            AgentIdentity::Email(email) => {
                let email = validate_and_normalize_email(email)?;
                self.agent_repo.get_agent_by_email(tenant_id, &email).await?
            }
        };

        let mut agent = agent.ok_or_else(|| {
            tracing::warn!("Agent {:?} does not belong to tenant {}", identity, tenant_id);
            ChatError::unauthorized("Agent does not belong to this tenant")
        })?;

        if !agent.is_active() {
            tracing::warn!("Agent {} tried to connect with status {}", agent.id, agent.status);
            return Err(ChatError::unauthorized(format!(
                "Agent account is {}",
                agent.status
            )));
        }

        let seen_at = now_timestamp();
        self.agent_repo.touch_last_seen(agent.id, &seen_at).await?;
        agent.last_seen_at = Some(seen_at);

        tracing::info!("Agent {} identified for tenant {}", agent.id, tenant_id);
        Ok(agent)
    }

    /// Create an `invited` agent carrying a fresh token.
    #[tracing::instrument(skip(self))]
    pub async fn invite_agent(
        &self,
        tenant_id: TenantId,
        name: &str,
        email: &str,
        role: AgentRole,
        max_concurrent_chats: Option<i64>,
    ) -> ChatResult<Agent> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::validation("Agent name cannot be empty"));
        }

        let max_concurrent_chats = max_concurrent_chats.unwrap_or(DEFAULT_MAX_CONCURRENT_CHATS);
        if max_concurrent_chats < 1 {
            return Err(ChatError::validation(
                "max_concurrent_chats must be at least 1",
            ));
        }

        let invite = NewAgentInvite {
            tenant_id,
            name: name.to_string(),
            email: validate_and_normalize_email(email)?,
            role,
            max_concurrent_chats,
            invite_token: generate_invite_token(),
            invite_expires_at: format_timestamp(Utc::now() + self.invite_ttl),
        };

        let agent = self.agent_repo.create_invited_agent(&invite).await?;
        tracing::info!("Agent {} invited to tenant {}", agent.id, tenant_id);

        Ok(agent)
    }

    /// Consume an invite token. Expired tokens leave the agent untouched.
    #[tracing::instrument(skip(self, token))]
    pub async fn accept_invite(&self, token: &str) -> ChatResult<Agent> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ChatError::validation("Invite token is required"));
        }

        let agent = self
            .agent_repo
            .get_agent_by_invite_token(token)
            .await?
            .ok_or_else(|| ChatError::not_found("Invitation not found"))?;

        let expires_at = agent
            .invite_expires_at
            .as_deref()
            .and_then(parse_timestamp)
            .ok_or_else(|| ChatError::validation("Invitation has expired"))?;

        if expires_at <= Utc::now() {
            tracing::warn!("Expired invite used for agent {}", agent.id);
            return Err(ChatError::validation("Invitation has expired"));
        }

        self.agent_repo.activate_agent(agent.id).await?;
        tracing::info!("Agent {} accepted invite for tenant {}", agent.id, agent.tenant_id);

        self.agent_repo
            .get_agent(agent.tenant_id, agent.id)
            .await?
            .ok_or_else(|| ChatError::not_found(format!("Agent {} not found", agent.id)))
    }
}
