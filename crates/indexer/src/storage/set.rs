//! Set operations.

use super::Storage;
use anyhow::{Context, Result};

impl Storage {
    /// Add a member. Returns `true` if it was not already present.
    pub async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO sets (key, member)
            VALUES (?, ?)
            ON CONFLICT(key, member) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(member)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to add {} to {}", member, key))?;

        Ok(result.rows_affected() > 0)
    }

    /// All members, ordered by member.
    pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let members: Vec<String> =
            sqlx::query_scalar("SELECT member FROM sets WHERE key = ? ORDER BY member")
                .bind(key)
                .fetch_all(&self.pool)
                .await
                .with_context(|| format!("Failed to list {}", key))?;

        Ok(members)
    }

    /// Number of members.
    pub async fn scard(&self, key: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sets WHERE key = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {}", key))?;

        Ok(count as u64)
    }
}
