use crate::domain::entities::{Message, NewMessage, SenderType};
use crate::domain::errors::ChatResult;

#[async_trait::async_trait]
pub trait MessageRepository: Send + Sync {
    /// Insert the message and refresh the parent conversation's
    /// `last_message`, `last_message_time` and `unread_count` in one
    /// transaction. `claim_agent` is put on the conversation in the same
    /// transaction when nobody holds it yet.
    async fn append_message(
        &self,
        message: &NewMessage,
        unread_increment: i64,
        claim_agent: Option<i64>,
    ) -> ChatResult<Message>;

    /// Every message of a conversation, ascending by id.
    async fn list_messages(&self, conversation_id: i64) -> ChatResult<Vec<Message>>;

    /// Flip `is_read` on unread messages written by `sender_type`.
    /// With `reset_unread` the conversation's `unread_count` goes back to 0
    /// in the same transaction. Returns the number of messages flipped.
    async fn mark_messages_read(
        &self,
        conversation_id: i64,
        sender_type: SenderType,
        reset_unread: bool,
    ) -> ChatResult<u64>;
}
