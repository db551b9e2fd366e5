use std::sync::Arc;

use crate::application::services::conversation_locks::ConversationLocks;
use crate::domain::entities::{ReaderType, TenantId};
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::events::ChatEvent;
use crate::domain::ports::connection_registry::{ChannelScope, ConnectionRegistry};
use crate::domain::ports::conversation_repository::ConversationRepository;
use crate::domain::ports::message_repository::MessageRepository;

#[derive(Clone)]
pub struct ReadReceiptService {
    message_repo: Arc<dyn MessageRepository>,
    conversation_repo: Arc<dyn ConversationRepository>,
    registry: Arc<dyn ConnectionRegistry>,
    locks: ConversationLocks,
}

impl ReadReceiptService {
    pub fn new(
        message_repo: Arc<dyn MessageRepository>,
        conversation_repo: Arc<dyn ConversationRepository>,
        registry: Arc<dyn ConnectionRegistry>,
        locks: ConversationLocks,
    ) -> Self {
        Self {
            message_repo,
            conversation_repo,
            registry,
            locks,
        }
    }

    /// Acknowledge everything the other side wrote.
    ///
    /// Agents reading also reset `unread_count`; users reading leave it alone.
    /// `session_id`, when given, restricts the call to that session's
    /// conversation. Returns the number of messages flipped; a repeat call
    /// flips nothing and broadcasts nothing.
    #[tracing::instrument(skip(self))]
    pub async fn mark_read(
        &self,
        tenant_id: TenantId,
        conversation_id: i64,
        reader_type: ReaderType,
        session_id: Option<&str>,
    ) -> ChatResult<u64> {
        let _guard = self.locks.acquire(conversation_id).await;

        let conversation = self
            .conversation_repo
            .get_conversation(conversation_id)
            .await?
            .filter(|conv| conv.belongs_to(tenant_id))
            .filter(|conv| session_id.map_or(true, |s| conv.session_id == s))
            .ok_or_else(|| {
                ChatError::not_found(format!("Conversation {} not found", conversation_id))
            })?;

        let reset_unread = reader_type == ReaderType::Agent && conversation.unread_count != 0;
        let count = self
            .message_repo
            .mark_messages_read(conversation.id, reader_type.acknowledges(), reset_unread)
            .await?;

        if count == 0 {
            tracing::debug!("Nothing new to mark read on conversation {}", conversation.id);
            return Ok(0);
        }

        let event = ChatEvent::MessagesRead {
            conversation_id: conversation.id,
            reader_type,
            count,
        };
        let scope = match reader_type {
            ReaderType::Agent => ChannelScope::session(tenant_id, conversation.session_id.clone()),
            ReaderType::User => ChannelScope::agents(tenant_id),
        };
        self.registry.broadcast(&scope, event).await;

        tracing::info!(
            "{} message(s) marked read on conversation {} by {:?}",
            count,
            conversation.id,
            reader_type
        );
        Ok(count)
    }
}
