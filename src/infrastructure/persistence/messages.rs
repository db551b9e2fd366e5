use async_trait::async_trait;
use sqlx::{any::AnyRow, Row};

use super::{bool_to_int, int_to_bool, nullable, Database};
use crate::domain::entities::{Message, NewMessage, SenderType, TenantId};
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::ports::message_repository::MessageRepository;
use crate::shared::utils::now_timestamp;

fn row_to_message(row: &AnyRow) -> ChatResult<Message> {
    let sender_type: String = row.try_get("sender_type")?;

    Ok(Message {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        tenant_id: TenantId::new(row.try_get("tenant_id")?)?,
        sender_type: sender_type.parse()?,
        sender_id: nullable(row, "sender_id"),
        message: row.try_get("message")?,
        is_read: int_to_bool(row.try_get("is_read")?),
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl MessageRepository for Database {
    async fn append_message(
        &self,
        message: &NewMessage,
        unread_increment: i64,
        claim_agent: Option<i64>,
    ) -> ChatResult<Message> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO messages (conversation_id, tenant_id, sender_type, sender_id, message, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message.conversation_id)
        .bind(message.tenant_id.get())
        .bind(message.sender_type.as_str())
        .bind(message.sender_id.as_deref())
        .bind(&message.message)
        .bind(bool_to_int(message.is_read))
        .bind(&message.created_at)
        .execute(&mut *tx)
        .await?;

        let id = inserted.last_insert_id().ok_or_else(|| {
            ChatError::Persistence("Message insert returned no row id".to_string())
        })?;

        // Single statement so concurrent sends never lose an increment
        let updated = sqlx::query(
            "UPDATE conversations
             SET last_message = ?, last_message_time = ?, unread_count = unread_count + ?,
                 status = CASE WHEN agent_id IS NULL AND ? IS NOT NULL THEN 'open' ELSE status END,
                 agent_id = COALESCE(agent_id, ?),
                 updated_at = ?
             WHERE id = ? AND tenant_id = ? AND is_active = 1",
        )
        .bind(&message.message)
        .bind(&message.created_at)
        .bind(unread_increment)
        .bind(claim_agent)
        .bind(claim_agent)
        .bind(&message.created_at)
        .bind(message.conversation_id)
        .bind(message.tenant_id.get())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Dropping the transaction rolls the insert back
            return Err(ChatError::validation(format!(
                "Conversation {} is closed",
                message.conversation_id
            )));
        }

        tx.commit().await?;

        Ok(Message {
            id,
            conversation_id: message.conversation_id,
            tenant_id: message.tenant_id,
            sender_type: message.sender_type,
            sender_id: message.sender_id.clone(),
            message: message.message.clone(),
            is_read: message.is_read,
            created_at: message.created_at.clone(),
        })
    }

    async fn list_messages(&self, conversation_id: i64) -> ChatResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, tenant_id, sender_type, sender_id, message, is_read, created_at
             FROM messages
             WHERE conversation_id = ?
             ORDER BY id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_message).collect()
    }

    async fn mark_messages_read(
        &self,
        conversation_id: i64,
        sender_type: SenderType,
        reset_unread: bool,
    ) -> ChatResult<u64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE messages
             SET is_read = 1
             WHERE conversation_id = ? AND sender_type = ? AND is_read = 0",
        )
        .bind(conversation_id)
        .bind(sender_type.as_str())
        .execute(&mut *tx)
        .await?;

        if reset_unread {
            sqlx::query(
                "UPDATE conversations
                 SET unread_count = 0, updated_at = ?
                 WHERE id = ? AND unread_count <> 0",
            )
            .bind(now_timestamp())
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(result.rows_affected())
    }
}
