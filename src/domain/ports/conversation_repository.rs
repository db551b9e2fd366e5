use crate::domain::entities::{
    AssignmentOutcome, Conversation, ConversationStatus, NewConversation, TenantId,
};
use crate::domain::errors::ChatResult;

#[async_trait::async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Upsert keyed by `(tenant_id, session_id, is_active = true)`.
    /// Returns the active conversation and whether this call created it.
    async fn find_or_create_active(
        &self,
        create: &NewConversation,
    ) -> ChatResult<(Conversation, bool)>;

    async fn get_conversation(&self, id: i64) -> ChatResult<Option<Conversation>>;

    async fn get_active_by_session(
        &self,
        tenant_id: TenantId,
        session_id: &str,
    ) -> ChatResult<Option<Conversation>>;

    async fn list_active_conversations(&self, tenant_id: TenantId) -> ChatResult<Vec<Conversation>>;

    /// Put an agent on an active conversation if nobody holds it yet.
    /// With a `capacity`, the agent's active count is checked in the same
    /// statement as the claim.
    async fn assign_agent(
        &self,
        conversation_id: i64,
        agent_id: i64,
        capacity: Option<i64>,
    ) -> ChatResult<AssignmentOutcome>;

    /// Change the status of an active conversation. Returns false when the
    /// conversation is closed or missing.
    async fn update_status(
        &self,
        conversation_id: i64,
        status: ConversationStatus,
    ) -> ChatResult<bool>;

    /// Terminal transition. Returns false when it was already closed.
    async fn close_conversation(&self, conversation_id: i64) -> ChatResult<bool>;

    async fn count_active_for_agent(&self, agent_id: i64) -> ChatResult<i64>;
}
