use async_trait::async_trait;
use sqlx::{any::AnyRow, Row};

use super::{int_to_bool, nullable, Database};
use crate::domain::entities::{
    AssignmentOutcome, Conversation, ConversationStatus, NewConversation, TenantId,
};
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::ports::conversation_repository::ConversationRepository;
use crate::shared::utils::now_timestamp;

const CONVERSATION_COLUMNS: &str = "id, tenant_id, session_id, user_id, guest_id, status, agent_id,
     last_message, last_message_time, unread_count, is_active, created_at, updated_at, closed_at";

/// Find-or-create retries when the active row disappears between the
/// insert and the read (closed concurrently by an agent).
const FIND_OR_CREATE_ATTEMPTS: usize = 3;

fn row_to_conversation(row: &AnyRow) -> ChatResult<Conversation> {
    let status: String = row.try_get("status")?;

    Ok(Conversation {
        id: row.try_get("id")?,
        tenant_id: TenantId::new(row.try_get("tenant_id")?)?,
        session_id: row.try_get("session_id")?,
        user_id: nullable(row, "user_id"),
        guest_id: nullable(row, "guest_id"),
        status: status.parse()?,
        agent_id: nullable(row, "agent_id"),
        last_message: nullable(row, "last_message"),
        last_message_time: nullable(row, "last_message_time"),
        unread_count: row.try_get("unread_count")?,
        is_active: int_to_bool(row.try_get("is_active")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        closed_at: nullable(row, "closed_at"),
    })
}

#[async_trait]
impl ConversationRepository for Database {
    async fn find_or_create_active(
        &self,
        create: &NewConversation,
    ) -> ChatResult<(Conversation, bool)> {
        for _ in 0..FIND_OR_CREATE_ATTEMPTS {
            let now = now_timestamp();

            // The partial unique index on (tenant_id, session_id) WHERE is_active = 1
            // turns duplicate identify events into no-ops.
            let result = sqlx::query(
                "INSERT INTO conversations
                    (tenant_id, session_id, user_id, guest_id, status, unread_count, is_active, created_at, updated_at)
                 VALUES (?, ?, ?, ?, 'open', 0, 1, ?, ?)
                 ON CONFLICT DO NOTHING",
            )
            .bind(create.tenant_id.get())
            .bind(&create.session_id)
            .bind(create.participant.user_id())
            .bind(create.participant.guest_id())
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await?;

            let created = result.rows_affected() == 1;

            if let Some(conversation) = self
                .get_active_by_session(create.tenant_id, &create.session_id)
                .await?
            {
                if created {
                    tracing::info!(
                        "Conversation created: id={}, tenant_id={}, session_id={}",
                        conversation.id,
                        conversation.tenant_id,
                        conversation.session_id
                    );
                }
                return Ok((conversation, created));
            }

            tracing::debug!(
                "Active conversation for session {} vanished before read, retrying",
                create.session_id
            );
        }

        Err(ChatError::Persistence(format!(
            "Could not resolve an active conversation for session {}",
            create.session_id
        )))
    }

    async fn get_conversation(&self, id: i64) -> ChatResult<Option<Conversation>> {
        let query = format!("SELECT {} FROM conversations WHERE id = ?", CONVERSATION_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_conversation).transpose()
    }

    async fn get_active_by_session(
        &self,
        tenant_id: TenantId,
        session_id: &str,
    ) -> ChatResult<Option<Conversation>> {
        let query = format!(
            "SELECT {} FROM conversations
             WHERE tenant_id = ? AND session_id = ? AND is_active = 1",
            CONVERSATION_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(tenant_id.get())
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_conversation).transpose()
    }

    async fn list_active_conversations(&self, tenant_id: TenantId) -> ChatResult<Vec<Conversation>> {
        let query = format!(
            "SELECT {} FROM conversations
             WHERE tenant_id = ? AND is_active = 1
             ORDER BY COALESCE(last_message_time, created_at) DESC, id DESC",
            CONVERSATION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(tenant_id.get())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_conversation).collect()
    }

    async fn assign_agent(
        &self,
        conversation_id: i64,
        agent_id: i64,
        capacity: Option<i64>,
    ) -> ChatResult<AssignmentOutcome> {
        let now = now_timestamp();

        let result = match capacity {
            Some(max) => {
                sqlx::query(
                    "UPDATE conversations
                     SET agent_id = ?, status = 'open', updated_at = ?
                     WHERE id = ? AND is_active = 1 AND agent_id IS NULL
                       AND (SELECT COUNT(*) FROM conversations
                            WHERE agent_id = ? AND is_active = 1) < ?",
                )
                .bind(agent_id)
                .bind(&now)
                .bind(conversation_id)
                .bind(agent_id)
                .bind(max)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE conversations
                     SET agent_id = ?, status = 'open', updated_at = ?
                     WHERE id = ? AND is_active = 1 AND agent_id IS NULL",
                )
                .bind(agent_id)
                .bind(&now)
                .bind(conversation_id)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 1 {
            return Ok(AssignmentOutcome::Assigned);
        }

        let conversation = self
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| ChatError::not_found(format!("Conversation {} not found", conversation_id)))?;

        if conversation.is_closed() {
            return Err(ChatError::validation(format!(
                "Conversation {} is closed",
                conversation_id
            )));
        }

        match conversation.agent_id {
            Some(current) if current == agent_id => Ok(AssignmentOutcome::AlreadyAssigned),
            Some(other) => Ok(AssignmentOutcome::AssignedToOther(other)),
            None if capacity.is_some() => Ok(AssignmentOutcome::AtCapacity),
            None => Err(ChatError::Persistence(format!(
                "Assignment of conversation {} did not apply",
                conversation_id
            ))),
        }
    }

    async fn update_status(
        &self,
        conversation_id: i64,
        status: ConversationStatus,
    ) -> ChatResult<bool> {
        let now = now_timestamp();

        let result = sqlx::query(
            "UPDATE conversations
             SET status = ?, updated_at = ?
             WHERE id = ? AND is_active = 1",
        )
        .bind(status.as_str())
        .bind(&now)
        .bind(conversation_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn close_conversation(&self, conversation_id: i64) -> ChatResult<bool> {
        let now = now_timestamp();

        let result = sqlx::query(
            "UPDATE conversations
             SET status = 'closed', is_active = 0, closed_at = ?, updated_at = ?
             WHERE id = ? AND is_active = 1",
        )
        .bind(&now)
        .bind(&now)
        .bind(conversation_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_active_for_agent(&self, agent_id: i64) -> ChatResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM conversations WHERE agent_id = ? AND is_active = 1",
        )
        .bind(agent_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("count")?)
    }
}
