use crate::domain::entities::{Tenant, TenantChatConfig, TenantId};
use crate::domain::errors::ChatResult;

#[async_trait::async_trait]
pub trait TenantRepository: Send + Sync {
    async fn get_tenant(&self, tenant_id: TenantId) -> ChatResult<Option<Tenant>>;

    async fn get_chat_config(&self, tenant_id: TenantId) -> ChatResult<Option<TenantChatConfig>>;

    /// Insert the config unless one exists, then return the stored row.
    async fn insert_chat_config_if_missing(
        &self,
        config: &TenantChatConfig,
    ) -> ChatResult<TenantChatConfig>;
}
