use relaydesk::domain::entities::{AgentRole, TenantId};
use relaydesk::infrastructure::persistence::Database;
use sqlx::Row;
use std::path::PathBuf;
use uuid::Uuid;

/// Fresh SQLite file with migrations applied. Removed on drop.
pub struct TestDatabase {
    db: Database,
    path: PathBuf,
}

impl TestDatabase {
    pub fn db(&self) -> Database {
        self.db.clone()
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

pub async fn setup_test_db() -> TestDatabase {
    // Install drivers for AnyPool (required for tests)
    sqlx::any::install_default_drivers();

    // Unique file per test for parallel execution
    let path = std::env::temp_dir().join(format!("relaydesk_test_{}.db", Uuid::new_v4()));
    let db_url = format!("sqlite://{}?mode=rwc", path.display());

    let db = Database::connect(&db_url)
        .await
        .expect("Failed to connect to test database");
    db.run_migrations()
        .await
        .expect("Failed to run migrations");

    TestDatabase { db, path }
}

pub async fn create_tenant(db: &Database, id: i64, name: &str, is_active: bool) -> TenantId {
    sqlx::query("INSERT INTO tenants (id, name, is_active) VALUES (?, ?, ?)")
        .bind(id)
        .bind(name)
        .bind(if is_active { 1i64 } else { 0i64 })
        .execute(db.pool())
        .await
        .expect("Failed to create tenant");

    TenantId::new(id).unwrap()
}

pub async fn set_tenant_active(db: &Database, tenant_id: TenantId, is_active: bool) {
    sqlx::query("UPDATE tenants SET is_active = ? WHERE id = ?")
        .bind(if is_active { 1i64 } else { 0i64 })
        .bind(tenant_id.get())
        .execute(db.pool())
        .await
        .expect("Failed to update tenant");
}

/// Insert an agent directly, bypassing the invite flow.
pub async fn create_agent(
    db: &Database,
    tenant_id: TenantId,
    name: &str,
    email: &str,
    role: AgentRole,
    status: &str,
    max_concurrent_chats: i64,
) -> i64 {
    let now = "2026-01-01T00:00:00.000Z";
    let result = sqlx::query(
        "INSERT INTO agents (tenant_id, name, email, status, role, max_concurrent_chats, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(tenant_id.get())
    .bind(name)
    .bind(email)
    .bind(status)
    .bind(role.as_str())
    .bind(max_concurrent_chats)
    .bind(now)
    .bind(now)
    .execute(db.pool())
    .await
    .expect("Failed to create agent");

    result.last_insert_id().expect("Agent insert returned no row id")
}

pub async fn create_active_agent(db: &Database, tenant_id: TenantId, name: &str) -> i64 {
    let email = format!("{}@tenant{}.example.com", name.to_lowercase(), tenant_id.get());
    create_agent(db, tenant_id, name, &email, AgentRole::Agent, "active", 5).await
}

/// Turn on the automatic greeting with every weekday closed, so the
/// offline notice is always the greeting.
pub async fn enable_offline_auto_response(db: &Database, tenant_id: TenantId) {
    let closed_day = r#"{"enabled":false,"open":"09:00","close":"17:00"}"#;
    let hours = format!(
        r#"{{"monday":{d},"tuesday":{d},"wednesday":{d},"thursday":{d},"friday":{d},"saturday":{d},"sunday":{d}}}"#,
        d = closed_day
    );

    sqlx::query(
        "INSERT INTO tenant_chat_configs (tenant_id, business_hours, auto_response_enabled, created_at, updated_at)
         VALUES (?, ?, 1, '2026-01-01T00:00:00.000Z', '2026-01-01T00:00:00.000Z')
         ON CONFLICT (tenant_id) DO UPDATE SET business_hours = excluded.business_hours, auto_response_enabled = 1",
    )
    .bind(tenant_id.get())
    .bind(hours)
    .execute(db.pool())
    .await
    .expect("Failed to configure auto-response");
}

pub async fn unread_count(db: &Database, conversation_id: i64) -> i64 {
    let row = sqlx::query("SELECT unread_count FROM conversations WHERE id = ?")
        .bind(conversation_id)
        .fetch_one(db.pool())
        .await
        .expect("Conversation missing");
    row.try_get("unread_count").unwrap()
}

pub async fn message_count(db: &Database, conversation_id: i64) -> i64 {
    let row = sqlx::query("SELECT COUNT(*) as count FROM messages WHERE conversation_id = ?")
        .bind(conversation_id)
        .fetch_one(db.pool())
        .await
        .expect("Count failed");
    row.try_get("count").unwrap()
}
