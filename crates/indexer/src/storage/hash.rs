//! Hash (field map) operations.

use super::Storage;
use anyhow::{Context, Result};

impl Storage {
    /// Set a hash field, replacing any previous value.
    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO hashes (key, field, value)
            VALUES (?, ?, ?)
            ON CONFLICT(key, field) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(field)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to set {} field {}", key, field))?;

        Ok(())
    }

    /// Get a hash field.
    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM hashes WHERE key = ? AND field = ?")
                .bind(key)
                .bind(field)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Failed to get {} field {}", key, field))?;

        Ok(value)
    }

    /// Number of fields in a hash.
    pub async fn hlen(&self, key: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hashes WHERE key = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {}", key))?;

        Ok(count as u64)
    }
}
