use crate::domain::entities::{Agent, NewAgentInvite, TenantId};
use crate::domain::errors::ChatResult;

#[async_trait::async_trait]
pub trait AgentRepository: Send + Sync {
    async fn get_agent(&self, tenant_id: TenantId, agent_id: i64) -> ChatResult<Option<Agent>>;

    async fn get_agent_by_email(&self, tenant_id: TenantId, email: &str)
        -> ChatResult<Option<Agent>>;

    async fn get_agent_by_invite_token(&self, token: &str) -> ChatResult<Option<Agent>>;

    async fn create_invited_agent(&self, invite: &NewAgentInvite) -> ChatResult<Agent>;

    /// Invited → active, consuming the token.
    async fn activate_agent(&self, agent_id: i64) -> ChatResult<()>;

    async fn touch_last_seen(&self, agent_id: i64, seen_at: &str) -> ChatResult<()>;
}
