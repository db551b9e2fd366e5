use std::sync::Arc;

use crate::domain::entities::{Tenant, TenantChatConfig, TenantId};
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::ports::tenant_repository::TenantRepository;

#[derive(Clone)]
pub struct TenantService {
    tenant_repo: Arc<dyn TenantRepository>,
}

impl TenantService {
    pub fn new(tenant_repo: Arc<dyn TenantRepository>) -> Self {
        Self { tenant_repo }
    }

    /// Gate applied once per connection: the tenant must exist and be active.
    #[tracing::instrument(skip(self))]
    pub async fn verify_active_tenant(&self, tenant_id: TenantId) -> ChatResult<Tenant> {
        let tenant = self
            .tenant_repo
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| ChatError::unauthorized(format!("Unknown tenant {}", tenant_id)))?;

        if !tenant.is_active {
            tracing::warn!("Rejected connection for inactive tenant {}", tenant_id);
            return Err(ChatError::unauthorized(format!(
                "Tenant {} is not active",
                tenant_id
            )));
        }

        Ok(tenant)
    }

    /// Stored chat config, created with defaults on first access.
    #[tracing::instrument(skip(self))]
    pub async fn get_or_create_config(&self, tenant_id: TenantId) -> ChatResult<TenantChatConfig> {
        if let Some(config) = self.tenant_repo.get_chat_config(tenant_id).await? {
            return Ok(config);
        }

        tracing::info!("Creating default chat config for tenant {}", tenant_id);
        self.tenant_repo
            .insert_chat_config_if_missing(&TenantChatConfig::with_defaults(tenant_id))
            .await
    }

    /// Active-tenant check followed by config resolution.
    pub async fn load_active_config(&self, tenant_id: TenantId) -> ChatResult<TenantChatConfig> {
        self.verify_active_tenant(tenant_id).await?;
        self.get_or_create_config(tenant_id).await
    }
}
