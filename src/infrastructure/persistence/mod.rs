use sqlx::{
    any::{AnyConnectOptions, AnyPoolOptions, AnyRow},
    AnyPool, ConnectOptions, Row,
};
use std::str::FromStr;
use tracing::log::LevelFilter;

use crate::domain::errors::ChatError;

mod agents;
mod conversations;
mod messages;
mod tenants;

pub struct Database {
    pub(crate) pool: AnyPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        // Ensure drivers are installed for AnyPool
        sqlx::any::install_default_drivers();

        let connect_options = AnyConnectOptions::from_str(database_url)?
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, std::time::Duration::from_secs(1));

        let pool = AnyPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    // Foreign keys are per-connection in SQLite
                    if conn.backend_name() == "SQLite" {
                        sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                        sqlx::query("PRAGMA busy_timeout = 5000")
                            .execute(&mut *conn)
                            .await?;
                    }
                    Ok(())
                })
            })
            .connect_with(connect_options)
            .await?;

        if database_url.starts_with("sqlite") {
            sqlx::query("PRAGMA journal_mode = WAL")
                .execute(&pool)
                .await?;
        }

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("migrations/sqlite").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

// Convert from sqlx errors
impl From<sqlx::Error> for ChatError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ChatError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message();
                if message.contains("UNIQUE") || message.contains("unique") {
                    ChatError::Conflict("Record already exists".to_string())
                } else {
                    tracing::error!("Database error: {}", message);
                    ChatError::Persistence(format!("Database error: {}", message))
                }
            }
            other => {
                tracing::error!("Store unavailable: {}", other);
                ChatError::Persistence(other.to_string())
            }
        }
    }
}

impl From<sqlx::migrate::MigrateError> for ChatError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        ChatError::Persistence(format!("Migration failed: {}", err))
    }
}

/// SQLite stores booleans as integers; read them back as such.
pub(crate) fn int_to_bool(value: i64) -> bool {
    value != 0
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

/// Decode a nullable column. `AnyRow` reports SQL NULL as its own type,
/// which `Option<T>` does not accept through `try_get`.
pub(crate) fn nullable<T>(row: &AnyRow, column: &str) -> Option<T>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Any> + sqlx::Type<sqlx::Any>,
{
    row.try_get::<Option<T>, _>(column).ok().flatten()
}
