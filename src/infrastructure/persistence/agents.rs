use async_trait::async_trait;
use sqlx::{any::AnyRow, Row};

use super::{nullable, Database};
use crate::domain::entities::{Agent, NewAgentInvite, TenantId};
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::ports::agent_repository::AgentRepository;
use crate::shared::utils::now_timestamp;

const AGENT_COLUMNS: &str = "id, tenant_id, name, email, avatar, status, role, max_concurrent_chats,
     last_seen_at, invite_token, invite_expires_at, created_at, updated_at";

fn row_to_agent(row: &AnyRow) -> ChatResult<Agent> {
    let status: String = row.try_get("status")?;
    let role: String = row.try_get("role")?;

    Ok(Agent {
        id: row.try_get("id")?,
        tenant_id: TenantId::new(row.try_get("tenant_id")?)?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        avatar: nullable(row, "avatar"),
        status: status.parse()?,
        role: role.parse()?,
        max_concurrent_chats: row.try_get("max_concurrent_chats")?,
        last_seen_at: nullable(row, "last_seen_at"),
        invite_token: nullable(row, "invite_token"),
        invite_expires_at: nullable(row, "invite_expires_at"),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl AgentRepository for Database {
    async fn get_agent(&self, tenant_id: TenantId, agent_id: i64) -> ChatResult<Option<Agent>> {
        let query = format!(
            "SELECT {} FROM agents WHERE id = ? AND tenant_id = ?",
            AGENT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(agent_id)
            .bind(tenant_id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_agent).transpose()
    }

    async fn get_agent_by_email(
        &self,
        tenant_id: TenantId,
        email: &str,
    ) -> ChatResult<Option<Agent>> {
        let query = format!(
            "SELECT {} FROM agents WHERE email = ? AND tenant_id = ?",
            AGENT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(email)
            .bind(tenant_id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_agent).transpose()
    }

    async fn get_agent_by_invite_token(&self, token: &str) -> ChatResult<Option<Agent>> {
        let query = format!("SELECT {} FROM agents WHERE invite_token = ?", AGENT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_agent).transpose()
    }

    async fn create_invited_agent(&self, invite: &NewAgentInvite) -> ChatResult<Agent> {
        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO agents
                (tenant_id, name, email, status, role, max_concurrent_chats, invite_token, invite_expires_at, created_at, updated_at)
             VALUES (?, ?, ?, 'invited', ?, ?, ?, ?, ?, ?)",
        )
        .bind(invite.tenant_id.get())
        .bind(&invite.name)
        .bind(&invite.email)
        .bind(invite.role.as_str())
        .bind(invite.max_concurrent_chats)
        .bind(&invite.invite_token)
        .bind(&invite.invite_expires_at)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match ChatError::from(e) {
            ChatError::Conflict(_) => ChatError::Conflict(format!(
                "An agent with email {} already exists for this tenant",
                invite.email
            )),
            other => other,
        })?;

        // Read back on the same connection before the insert is committed
        let query = format!(
            "SELECT {} FROM agents WHERE email = ? AND tenant_id = ?",
            AGENT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(&invite.email)
            .bind(invite.tenant_id.get())
            .fetch_one(&mut *tx)
            .await?;
        let agent = row_to_agent(&row)?;

        tx.commit().await?;

        Ok(agent)
    }

    async fn activate_agent(&self, agent_id: i64) -> ChatResult<()> {
        let now = now_timestamp();

        let result = sqlx::query(
            "UPDATE agents
             SET status = 'active', invite_token = NULL, invite_expires_at = NULL, updated_at = ?
             WHERE id = ? AND status = 'invited'",
        )
        .bind(&now)
        .bind(agent_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ChatError::Conflict(format!(
                "Agent {} is not awaiting activation",
                agent_id
            )));
        }

        Ok(())
    }

    async fn touch_last_seen(&self, agent_id: i64, seen_at: &str) -> ChatResult<()> {
        sqlx::query("UPDATE agents SET last_seen_at = ? WHERE id = ?")
            .bind(seen_at)
            .bind(agent_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
