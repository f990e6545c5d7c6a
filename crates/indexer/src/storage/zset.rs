//! Sorted-set operations.
//!
//! Ranges are addressed by offset and limit. Equal scores are ordered by
//! member, ascending for [`Storage::zrange`] and descending for
//! [`Storage::zrevrange`].

use super::{ScoredMember, Storage};
use anyhow::{Context, Result};
use sqlx::Row;

impl Storage {
    /// Add a member or replace its score.
    pub async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO zsets (key, member, score)
            VALUES (?, ?, ?)
            ON CONFLICT(key, member) DO UPDATE SET score = excluded.score
            "#,
        )
        .bind(key)
        .bind(member)
        .bind(score)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to add {} to {}", member, key))?;

        Ok(())
    }

    /// Increment a member's score (creating it at 0) and return the new score.
    pub async fn zincrby(&self, key: &str, member: &str, increment: f64) -> Result<f64> {
        let score: f64 = sqlx::query_scalar(
            r#"
            INSERT INTO zsets (key, member, score)
            VALUES (?, ?, ?)
            ON CONFLICT(key, member) DO UPDATE SET score = zsets.score + excluded.score
            RETURNING score
            "#,
        )
        .bind(key)
        .bind(member)
        .bind(increment)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to increment {} in {}", member, key))?;

        Ok(score)
    }

    /// Score of a member, if present.
    pub async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let score: Option<f64> =
            sqlx::query_scalar("SELECT score FROM zsets WHERE key = ? AND member = ?")
                .bind(key)
                .bind(member)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Failed to read score of {} in {}", member, key))?;

        Ok(score)
    }

    /// Number of members.
    pub async fn zcard(&self, key: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM zsets WHERE key = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {}", key))?;

        Ok(count as u64)
    }

    /// Members in ascending score order.
    pub async fn zrange(&self, key: &str, offset: u64, limit: u64) -> Result<Vec<ScoredMember>> {
        self.zrange_ordered(key, offset, limit, false).await
    }

    /// Members in descending score order.
    pub async fn zrevrange(&self, key: &str, offset: u64, limit: u64) -> Result<Vec<ScoredMember>> {
        self.zrange_ordered(key, offset, limit, true).await
    }

    async fn zrange_ordered(
        &self,
        key: &str,
        offset: u64,
        limit: u64,
        descending: bool,
    ) -> Result<Vec<ScoredMember>> {
        let sql = if descending {
            "SELECT member, score FROM zsets WHERE key = ? ORDER BY score DESC, member DESC LIMIT ? OFFSET ?"
        } else {
            "SELECT member, score FROM zsets WHERE key = ? ORDER BY score ASC, member ASC LIMIT ? OFFSET ?"
        };

        let rows = sqlx::query(sql)
            .bind(key)
            .bind(limit.min(i64::MAX as u64) as i64)
            .bind(offset.min(i64::MAX as u64) as i64)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to range over {}", key))?;

        Ok(rows
            .into_iter()
            .map(|row| ScoredMember {
                member: row.get("member"),
                score: row.get("score"),
            })
            .collect())
    }
}
