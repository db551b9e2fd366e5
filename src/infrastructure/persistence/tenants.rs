use async_trait::async_trait;
use sqlx::{any::AnyRow, Row};

use super::{bool_to_int, int_to_bool, nullable, Database};
use crate::domain::entities::{Tenant, TenantChatConfig, TenantId};
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::ports::tenant_repository::TenantRepository;
use crate::shared::utils::now_timestamp;

fn row_to_chat_config(row: &AnyRow) -> ChatResult<TenantChatConfig> {
    let business_hours: String = row.try_get("business_hours")?;
    let allowed_domains: String = row.try_get("allowed_domains")?;

    Ok(TenantChatConfig {
        tenant_id: TenantId::new(row.try_get("tenant_id")?)?,
        widget_color: row.try_get("widget_color")?,
        widget_position: row.try_get("widget_position")?,
        welcome_message: nullable(row, "welcome_message"),
        business_hours: serde_json::from_str(&business_hours).map_err(|e| {
            ChatError::Persistence(format!("Corrupt business_hours column: {}", e))
        })?,
        timezone: row.try_get("timezone")?,
        auto_response_enabled: int_to_bool(row.try_get("auto_response_enabled")?),
        capture_leads: int_to_bool(row.try_get("capture_leads")?),
        allowed_domains: serde_json::from_str(&allowed_domains).map_err(|e| {
            ChatError::Persistence(format!("Corrupt allowed_domains column: {}", e))
        })?,
        max_agents: row.try_get("max_agents")?,
        integration_type: row.try_get("integration_type")?,
    })
}

#[async_trait]
impl TenantRepository for Database {
    async fn get_tenant(&self, tenant_id: TenantId) -> ChatResult<Option<Tenant>> {
        let row = sqlx::query("SELECT id, name, is_active FROM tenants WHERE id = ?")
            .bind(tenant_id.get())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Tenant {
                id: TenantId::new(row.try_get("id")?)?,
                name: row.try_get("name")?,
                is_active: int_to_bool(row.try_get("is_active")?),
            })),
            None => Ok(None),
        }
    }

    async fn get_chat_config(&self, tenant_id: TenantId) -> ChatResult<Option<TenantChatConfig>> {
        let row = sqlx::query(
            "SELECT tenant_id, widget_color, widget_position, welcome_message, business_hours,
                    timezone, auto_response_enabled, capture_leads, allowed_domains, max_agents,
                    integration_type
             FROM tenant_chat_configs
             WHERE tenant_id = ?",
        )
        .bind(tenant_id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_chat_config).transpose()
    }

    async fn insert_chat_config_if_missing(
        &self,
        config: &TenantChatConfig,
    ) -> ChatResult<TenantChatConfig> {
        let now = now_timestamp();
        let business_hours = serde_json::to_string(&config.business_hours)
            .map_err(|e| ChatError::Persistence(format!("Cannot encode business hours: {}", e)))?;
        let allowed_domains = serde_json::to_string(&config.allowed_domains)
            .map_err(|e| ChatError::Persistence(format!("Cannot encode allowed domains: {}", e)))?;

        sqlx::query(
            "INSERT INTO tenant_chat_configs
                (tenant_id, widget_color, widget_position, welcome_message, business_hours, timezone,
                 auto_response_enabled, capture_leads, allowed_domains, max_agents, integration_type,
                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT DO NOTHING",
        )
        .bind(config.tenant_id.get())
        .bind(&config.widget_color)
        .bind(&config.widget_position)
        .bind(config.welcome_message.as_deref())
        .bind(&business_hours)
        .bind(&config.timezone)
        .bind(bool_to_int(config.auto_response_enabled))
        .bind(bool_to_int(config.capture_leads))
        .bind(&allowed_domains)
        .bind(config.max_agents)
        .bind(&config.integration_type)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get_chat_config(config.tenant_id).await?.ok_or_else(|| {
            ChatError::Persistence(format!(
                "Chat config for tenant {} missing after insert",
                config.tenant_id
            ))
        })
    }
}
