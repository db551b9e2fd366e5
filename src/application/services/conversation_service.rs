use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::application::services::conversation_locks::ConversationLocks;
use crate::application::services::message_service::{MessageSender, MessageService};
use crate::domain::entities::{
    Agent, AssignmentOutcome, Conversation, ConversationStatus, ConversationSummary, Message,
    NewConversation, Participant, TenantChatConfig, TenantId,
};
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::events::{ChatEvent, MessagePayload};
use crate::domain::ports::connection_registry::{ChannelScope, ConnectionRegistry};
use crate::domain::ports::conversation_repository::ConversationRepository;
use crate::domain::ports::message_repository::MessageRepository;

const MAX_SESSION_ID_LEN: usize = 255;

/// Readonly agents may watch and read but never act on a conversation.
pub fn ensure_can_reply(agent: &Agent) -> ChatResult<()> {
    if agent.role.can_reply() {
        Ok(())
    } else {
        Err(ChatError::unauthorized(format!(
            "Agent {} has read-only access",
            agent.id
        )))
    }
}

fn validate_session_id(session_id: &str) -> ChatResult<String> {
    let session_id = session_id.trim();
    if session_id.is_empty() {
        return Err(ChatError::validation("session_id is required"));
    }
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(ChatError::validation(format!(
            "session_id cannot exceed {} bytes",
            MAX_SESSION_ID_LEN
        )));
    }
    Ok(session_id.to_string())
}

/// Where a user message ends up after closed-conversation rollover.
#[derive(Debug, Clone)]
pub struct ResolvedConversation {
    pub conversation: Conversation,
    pub created: bool,
    pub rolled_over: bool,
}

/// Conversation lifecycle: open → (pending ↔ open) → closed.
#[derive(Clone)]
pub struct ConversationService {
    conversation_repo: Arc<dyn ConversationRepository>,
    message_repo: Arc<dyn MessageRepository>,
    messages: MessageService,
    registry: Arc<dyn ConnectionRegistry>,
    locks: ConversationLocks,
}

impl ConversationService {
    pub fn new(
        conversation_repo: Arc<dyn ConversationRepository>,
        message_repo: Arc<dyn MessageRepository>,
        messages: MessageService,
        registry: Arc<dyn ConnectionRegistry>,
        locks: ConversationLocks,
    ) -> Self {
        Self {
            conversation_repo,
            message_repo,
            messages,
            registry,
            locks,
        }
    }

    /// The unique active conversation of a session, created on first contact.
    #[tracing::instrument(skip(self))]
    pub async fn find_or_create_conversation(
        &self,
        tenant_id: TenantId,
        session_id: &str,
        participant: Participant,
    ) -> ChatResult<(Conversation, bool)> {
        let create = NewConversation {
            tenant_id,
            session_id: validate_session_id(session_id)?,
            participant,
        };

        self.conversation_repo.find_or_create_active(&create).await
    }

    /// Append the tenant's automatic greeting as a system message.
    /// Returns `None` when auto-response is off for the tenant.
    #[tracing::instrument(skip(self, config, conversation), fields(conversation_id = conversation.id))]
    pub async fn greet(
        &self,
        config: &TenantChatConfig,
        conversation: &Conversation,
        now: DateTime<Utc>,
    ) -> ChatResult<Option<Message>> {
        if !config.auto_response_enabled || !conversation.belongs_to(config.tenant_id) {
            return Ok(None);
        }

        let guard = self.locks.acquire(conversation.id).await;
        let message = self
            .messages
            .send_locked(
                &guard,
                conversation,
                MessageSender::System,
                &config.auto_response(now),
            )
            .await?;

        Ok(Some(message))
    }

    /// Conversation visible to the tenant. Other tenants' rows read as missing.
    pub async fn get_for_tenant(
        &self,
        tenant_id: TenantId,
        conversation_id: i64,
    ) -> ChatResult<Conversation> {
        self.conversation_repo
            .get_conversation(conversation_id)
            .await?
            .filter(|conv| conv.belongs_to(tenant_id))
            .ok_or_else(|| {
                ChatError::not_found(format!("Conversation {} not found", conversation_id))
            })
    }

    /// Conversation a user message should land in.
    ///
    /// A closed conversation of the same session rolls over to the session's
    /// active one, created if needed.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_for_user_message(
        &self,
        tenant_id: TenantId,
        session_id: &str,
        conversation_id: Option<i64>,
        participant: Participant,
    ) -> ChatResult<ResolvedConversation> {
        let Some(conversation_id) = conversation_id else {
            let (conversation, created) = self
                .find_or_create_conversation(tenant_id, session_id, participant)
                .await?;
            return Ok(ResolvedConversation {
                conversation,
                created,
                rolled_over: false,
            });
        };

        let conversation = self.get_for_tenant(tenant_id, conversation_id).await?;
        if conversation.session_id != session_id.trim() {
            return Err(ChatError::not_found(format!(
                "Conversation {} not found",
                conversation_id
            )));
        }

        if !conversation.is_closed() {
            return Ok(ResolvedConversation {
                conversation,
                created: false,
                rolled_over: false,
            });
        }

        let (active, created) = self
            .find_or_create_conversation(tenant_id, session_id, participant)
            .await?;
        tracing::info!(
            "Conversation {} is closed, session {} continues in {}",
            conversation_id,
            session_id,
            active.id
        );
        Ok(ResolvedConversation {
            conversation: active,
            created,
            rolled_over: true,
        })
    }

    /// Put an agent on a conversation unless someone already holds it.
    /// Re-assigning the same agent is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn assign_agent(
        &self,
        tenant_id: TenantId,
        conversation_id: i64,
        agent_id: i64,
    ) -> ChatResult<AssignmentOutcome> {
        let _guard = self.locks.acquire(conversation_id).await;
        let conversation = self.get_for_tenant(tenant_id, conversation_id).await?;
        if conversation.agent_id == Some(agent_id) {
            return Ok(AssignmentOutcome::AlreadyAssigned);
        }

        let outcome = self
            .conversation_repo
            .assign_agent(conversation.id, agent_id, None)
            .await?;
        if outcome == AssignmentOutcome::Assigned {
            tracing::info!("Agent {} assigned to conversation {}", agent_id, conversation.id);
        }
        Ok(outcome)
    }

    /// Explicit pickup by an agent: capacity and role checked, then
    /// `agent-joined` and a system message.
    #[tracing::instrument(skip(self, agent), fields(agent_id = agent.id))]
    pub async fn take_conversation(
        &self,
        tenant_id: TenantId,
        conversation_id: i64,
        agent: &Agent,
    ) -> ChatResult<Conversation> {
        ensure_can_reply(agent)?;

        let guard = self.locks.acquire(conversation_id).await;
        let conversation = self.get_for_tenant(tenant_id, conversation_id).await?;

        if conversation.is_closed() {
            return Err(ChatError::validation(format!(
                "Conversation {} is closed",
                conversation_id
            )));
        }

        match conversation.agent_id {
            Some(current) if current == agent.id => return Ok(conversation),
            Some(_) => {
                return Err(ChatError::Conflict(format!(
                    "Conversation {} is already taken by another agent",
                    conversation_id
                )))
            }
            None => {}
        }

        // Capacity is counted by the claiming UPDATE itself
        match self
            .conversation_repo
            .assign_agent(conversation.id, agent.id, Some(agent.max_concurrent_chats))
            .await?
        {
            AssignmentOutcome::Assigned => {}
            AssignmentOutcome::AlreadyAssigned => return Ok(conversation),
            AssignmentOutcome::AssignedToOther(_) => {
                return Err(ChatError::Conflict(format!(
                    "Conversation {} is already taken by another agent",
                    conversation_id
                )))
            }
            AssignmentOutcome::AtCapacity => {
                tracing::warn!(
                    "Agent {} at capacity ({} active)",
                    agent.id,
                    agent.max_concurrent_chats
                );
                return Err(ChatError::Conflict(format!(
                    "Agent {} already handles {} conversations",
                    agent.id, agent.max_concurrent_chats
                )));
            }
        }

        let assigned = self.get_for_tenant(tenant_id, conversation_id).await?;
        tracing::info!("Agent {} took conversation {}", agent.id, assigned.id);

        let joined = ChatEvent::AgentJoined {
            conversation_id: assigned.id,
            agent_id: agent.id,
            agent_name: agent.name.clone(),
        };
        self.registry
            .broadcast(
                &ChannelScope::session(tenant_id, assigned.session_id.clone()),
                joined.clone(),
            )
            .await;
        self.registry
            .broadcast(&ChannelScope::agents(tenant_id), joined)
            .await;

        self.messages
            .send_locked(
                &guard,
                &assigned,
                MessageSender::System,
                &format!("{} joined the conversation", agent.name),
            )
            .await?;

        self.get_for_tenant(tenant_id, conversation_id).await
    }

    /// Terminal transition. The system notice is the conversation's last
    /// message. Closing a closed conversation returns `false`.
    #[tracing::instrument(skip(self, agent), fields(agent_id = agent.id))]
    pub async fn close_conversation(
        &self,
        tenant_id: TenantId,
        conversation_id: i64,
        agent: &Agent,
    ) -> ChatResult<bool> {
        ensure_can_reply(agent)?;

        let guard = self.locks.acquire(conversation_id).await;
        let conversation = self.get_for_tenant(tenant_id, conversation_id).await?;

        if conversation.is_closed() {
            tracing::debug!("Conversation {} already closed", conversation_id);
            return Ok(false);
        }

        self.messages
            .send_locked(
                &guard,
                &conversation,
                MessageSender::System,
                &format!("{} closed the conversation", agent.name),
            )
            .await?;

        if !self
            .conversation_repo
            .close_conversation(conversation.id)
            .await?
        {
            return Ok(false);
        }

        tracing::info!("Conversation {} closed by agent {}", conversation.id, agent.id);

        let closed = ChatEvent::ConversationClosed {
            conversation_id: conversation.id,
            closed_by: agent.id,
            agent_name: agent.name.clone(),
        };
        self.registry
            .broadcast(
                &ChannelScope::session(tenant_id, conversation.session_id.clone()),
                closed.clone(),
            )
            .await;
        self.registry
            .broadcast(&ChannelScope::agents(tenant_id), closed)
            .await;

        Ok(true)
    }

    /// Only path into `pending`. Assignment moves it back to `open`.
    #[tracing::instrument(skip(self))]
    pub async fn mark_pending(
        &self,
        tenant_id: TenantId,
        conversation_id: i64,
    ) -> ChatResult<Conversation> {
        let _guard = self.locks.acquire(conversation_id).await;
        let conversation = self.get_for_tenant(tenant_id, conversation_id).await?;

        if conversation.is_closed()
            || !self
                .conversation_repo
                .update_status(conversation.id, ConversationStatus::Pending)
                .await?
        {
            return Err(ChatError::validation(format!(
                "Conversation {} is closed",
                conversation_id
            )));
        }

        self.get_for_tenant(tenant_id, conversation_id).await
    }

    pub async fn list_active(&self, tenant_id: TenantId) -> ChatResult<Vec<ConversationSummary>> {
        let conversations = self
            .conversation_repo
            .list_active_conversations(tenant_id)
            .await?;
        Ok(conversations.iter().map(ConversationSummary::from).collect())
    }

    /// Full replay ascending by id. With `session_id` the conversation must
    /// belong to that session.
    pub async fn history(
        &self,
        tenant_id: TenantId,
        conversation_id: i64,
        session_id: Option<&str>,
    ) -> ChatResult<Vec<MessagePayload>> {
        let conversation = self.get_for_tenant(tenant_id, conversation_id).await?;
        if session_id.is_some_and(|s| s != conversation.session_id) {
            return Err(ChatError::not_found(format!(
                "Conversation {} not found",
                conversation_id
            )));
        }

        let messages = self.message_repo.list_messages(conversation.id).await?;
        Ok(messages
            .iter()
            .map(|m| MessagePayload::new(m, &conversation.session_id))
            .collect())
    }
}
