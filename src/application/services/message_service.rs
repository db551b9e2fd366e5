use metrics::counter;
use std::sync::Arc;

use crate::application::services::conversation_locks::{ConversationGuard, ConversationLocks};
use crate::application::services::presence_service::PresenceService;
use crate::domain::entities::{
    sanitize_message, Conversation, Message, NewMessage, SenderType, TenantId,
};
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::events::{ChatEvent, MessagePayload};
use crate::domain::ports::connection_registry::{ChannelScope, ConnectionRegistry};
use crate::domain::ports::conversation_repository::ConversationRepository;
use crate::domain::ports::message_repository::MessageRepository;
use crate::shared::metrics::MESSAGES_PERSISTED;
use crate::shared::utils::now_timestamp;

/// Author of a message entering the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSender {
    User,
    Agent(i64),
    System,
}

impl MessageSender {
    pub fn sender_type(&self) -> SenderType {
        match self {
            MessageSender::User => SenderType::User,
            MessageSender::Agent(_) => SenderType::Agent,
            MessageSender::System => SenderType::System,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SendMessage {
    pub tenant_id: TenantId,
    pub conversation_id: i64,
    pub sender: MessageSender,
    pub text: String,
}

/// validate → persist → fan out.
#[derive(Clone)]
pub struct MessageService {
    message_repo: Arc<dyn MessageRepository>,
    conversation_repo: Arc<dyn ConversationRepository>,
    registry: Arc<dyn ConnectionRegistry>,
    presence: PresenceService,
    locks: ConversationLocks,
}

impl MessageService {
    pub fn new(
        message_repo: Arc<dyn MessageRepository>,
        conversation_repo: Arc<dyn ConversationRepository>,
        registry: Arc<dyn ConnectionRegistry>,
        presence: PresenceService,
        locks: ConversationLocks,
    ) -> Self {
        Self {
            message_repo,
            conversation_repo,
            registry,
            presence,
            locks,
        }
    }

    #[tracing::instrument(
        skip(self, request),
        fields(tenant_id = %request.tenant_id, conversation_id = request.conversation_id)
    )]
    pub async fn send_message(&self, request: SendMessage) -> ChatResult<Message> {
        let guard = self.locks.acquire(request.conversation_id).await;

        let conversation = self
            .conversation_repo
            .get_conversation(request.conversation_id)
            .await?
            .filter(|conv| conv.belongs_to(request.tenant_id))
            .ok_or_else(|| {
                ChatError::not_found(format!(
                    "Conversation {} not found",
                    request.conversation_id
                ))
            })?;

        self.send_locked(&guard, &conversation, request.sender, &request.text)
            .await
    }

    /// Pipeline body for callers already holding the conversation lock.
    ///
    /// Nothing is broadcast unless the insert and the summary update both
    /// committed.
    pub async fn send_locked(
        &self,
        guard: &ConversationGuard,
        conversation: &Conversation,
        sender: MessageSender,
        text: &str,
    ) -> ChatResult<Message> {
        if guard.conversation_id() != conversation.id {
            return Err(ChatError::Persistence(format!(
                "Lock for conversation {} used on conversation {}",
                guard.conversation_id(),
                conversation.id
            )));
        }

        let body = sanitize_message(text)?;

        if conversation.is_closed() {
            return Err(ChatError::validation(format!(
                "Conversation {} is closed",
                conversation.id
            )));
        }

        let read_live =
            sender == MessageSender::User && self.presence.is_watched(conversation.id).await;
        let unread_increment = if sender == MessageSender::User && !read_live {
            1
        } else {
            0
        };

        let new_message = NewMessage {
            conversation_id: conversation.id,
            tenant_id: conversation.tenant_id,
            sender_type: sender.sender_type(),
            sender_id: match sender {
                MessageSender::User => Some(conversation.end_user_id().to_string()),
                MessageSender::Agent(agent_id) => Some(agent_id.to_string()),
                MessageSender::System => None,
            },
            message: body,
            is_read: read_live,
            created_at: now_timestamp(),
        };

        // An agent replying to an unassigned conversation takes it over
        let claim_agent = match sender {
            MessageSender::Agent(agent_id) if conversation.agent_id.is_none() => Some(agent_id),
            _ => None,
        };

        let message = self
            .message_repo
            .append_message(&new_message, unread_increment, claim_agent)
            .await?;

        if let Some(agent_id) = claim_agent {
            tracing::info!(
                "Agent {} assigned to conversation {} by reply",
                agent_id,
                conversation.id
            );
        }

        counter!(MESSAGES_PERSISTED, "sender_type" => message.sender_type.as_str())
            .increment(1);
        tracing::info!(
            "Message {} persisted on conversation {} ({})",
            message.id,
            message.conversation_id,
            message.sender_type
        );

        self.fan_out(conversation, &message).await;

        Ok(message)
    }

    /// Targets derive from the persisted message's tenant, never from the caller.
    async fn fan_out(&self, conversation: &Conversation, message: &Message) {
        let payload = MessagePayload::new(message, &conversation.session_id);

        let session_scope = ChannelScope::session(message.tenant_id, &conversation.session_id);
        let agents_scope = ChannelScope::agents(message.tenant_id);

        let agent_event = match message.sender_type {
            SenderType::User => ChatEvent::NewUserMessage(payload.clone()),
            SenderType::Agent => ChatEvent::NewAgentMessage(payload.clone()),
            SenderType::System => ChatEvent::NewMessage(payload.clone()),
        };

        let to_session = self
            .registry
            .broadcast(&session_scope, ChatEvent::NewMessage(payload))
            .await;
        let to_agents = self.registry.broadcast(&agents_scope, agent_event).await;

        tracing::debug!(
            "Message {} delivered to {} session and {} agent connection(s)",
            message.id,
            to_session,
            to_agents
        );
    }
}
