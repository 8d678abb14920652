//! `SQLite` implementation of [`AutomationRegistry`].
//!
//! Records are stored as JSON documents in a `key`/`value` table so that
//! fields this crate does not know about are written back unchanged.

use sqlx::SqlitePool;

use homeflow_app::ports::AutomationRegistry;
use homeflow_domain::automation::Automation;
use homeflow_domain::error::{DecodeError, HomeflowError};
use homeflow_domain::id::AutomationId;

use crate::error::StorageError;

/// `SQLite`-backed automation registry.
pub struct SqliteAutomationRegistry {
    pool: SqlitePool,
}

impl SqliteAutomationRegistry {
    /// Create a new registry backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a raw document under `key`, bypassing serialization.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn put_raw(&self, key: &str, value: &str) -> Result<(), HomeflowError> {
        sqlx::query(
            "INSERT INTO automations (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }
}

impl AutomationRegistry for SqliteAutomationRegistry {
    async fn keys(&self) -> Result<Vec<AutomationId>, HomeflowError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT key FROM automations ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|(key,)| AutomationId::from(key)).collect())
    }

    async fn get(&self, id: &AutomationId) -> Result<Option<Automation>, HomeflowError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM automations WHERE key = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        row.map(|(value,)| serde_json::from_str(&value))
            .transpose()
            .map_err(|err| HomeflowError::Decode(DecodeError::Json(err)))
    }

    async fn put(&self, automation: &Automation) -> Result<(), HomeflowError> {
        let value = serde_json::to_string(automation).map_err(StorageError::from)?;
        self.put_raw(automation.id.as_str(), &value).await
    }
}
