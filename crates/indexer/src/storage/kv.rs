//! Scalar key-value operations and whole-key deletion.

use super::Storage;
use anyhow::{Context, Result};

impl Storage {
    /// Get a scalar value.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to get {}", key))?;

        Ok(value)
    }

    /// Set a scalar value, replacing any previous one.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to set {}", key))?;

        Ok(())
    }

    /// Set an integer scalar only if it is greater than the stored one.
    ///
    /// Returns `true` if the value was written.
    pub async fn set_if_greater(&self, key: &str, value: u64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO kv (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            WHERE CAST(kv.value AS INTEGER) < CAST(excluded.value AS INTEGER)
            "#,
        )
        .bind(key)
        .bind(value.to_string())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to advance {}", key))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a key from every structure (scalar, hash, sorted set, set).
    ///
    /// Returns the number of rows removed.
    pub async fn del(&self, key: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await.context("Failed to begin delete")?;
        let mut removed = 0;

        for statement in [
            "DELETE FROM kv WHERE key = ?",
            "DELETE FROM hashes WHERE key = ?",
            "DELETE FROM zsets WHERE key = ?",
            "DELETE FROM sets WHERE key = ?",
        ] {
            removed += sqlx::query(statement)
                .bind(key)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to delete {}", key))?
                .rows_affected();
        }

        tx.commit().await.context("Failed to commit delete")?;

        Ok(removed)
    }

    /// Delete every key starting with `prefix`, from every structure.
    ///
    /// Returns the number of rows removed.
    pub async fn del_prefix(&self, prefix: &str) -> Result<u64> {
        let prefix_len = prefix.chars().count() as i64;
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin prefix delete")?;
        let mut removed = 0;

        for statement in [
            "DELETE FROM kv WHERE substr(key, 1, ?) = ?",
            "DELETE FROM hashes WHERE substr(key, 1, ?) = ?",
            "DELETE FROM zsets WHERE substr(key, 1, ?) = ?",
            "DELETE FROM sets WHERE substr(key, 1, ?) = ?",
        ] {
            removed += sqlx::query(statement)
                .bind(prefix_len)
                .bind(prefix)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to delete keys under {}", prefix))?
                .rows_affected();
        }

        tx.commit()
            .await
            .context("Failed to commit prefix delete")?;

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::test_support::setup_storage;

    #[tokio::test]
    async fn test_get_set_overwrite() {
        let (storage, _temp_db) = setup_storage().await;

        assert_eq!(storage.get("a").await.unwrap(), None);
        storage.set("a", "1").await.unwrap();
        storage.set("a", "2").await.unwrap();
        assert_eq!(storage.get("a").await.unwrap().as_deref(), Some("2"));

        storage.close().await;
    }

    #[tokio::test]
    async fn test_set_if_greater_never_decreases() {
        let (storage, _temp_db) = setup_storage().await;

        assert!(storage.set_if_greater("cursor", 9).await.unwrap());
        assert!(storage.set_if_greater("cursor", 100).await.unwrap());
        assert!(!storage.set_if_greater("cursor", 99).await.unwrap());
        assert!(!storage.set_if_greater("cursor", 100).await.unwrap());
        assert_eq!(storage.get("cursor").await.unwrap().as_deref(), Some("100"));

        storage.close().await;
    }

    #[tokio::test]
    async fn test_del_removes_key_from_all_structures() {
        let (storage, _temp_db) = setup_storage().await;

        storage.set("k", "v").await.unwrap();
        storage.hset("k", "f", "v").await.unwrap();
        storage.zadd("k", "m", 1.0).await.unwrap();
        storage.sadd("k", "m").await.unwrap();
        storage.sadd("other", "m").await.unwrap();

        assert_eq!(storage.del("k").await.unwrap(), 4);
        assert_eq!(storage.get("k").await.unwrap(), None);
        assert_eq!(storage.hget("k", "f").await.unwrap(), None);
        assert_eq!(storage.zcard("k").await.unwrap(), 0);
        assert_eq!(storage.scard("k").await.unwrap(), 0);
        assert_eq!(storage.scard("other").await.unwrap(), 1);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_del_prefix_spares_other_keys() {
        let (storage, _temp_db) = setup_storage().await;

        storage.zadd("songs:trending:yt", "a", 1.0).await.unwrap();
        storage.zadd("songs:trending:sc", "b", 2.0).await.unwrap();
        storage.zadd("songs:list:by-score", "a", 3.0).await.unwrap();
        storage.set("songs:trending", "bare").await.unwrap();

        assert_eq!(storage.del_prefix("songs:trending:").await.unwrap(), 2);
        assert_eq!(storage.zcard("songs:trending:yt").await.unwrap(), 0);
        assert_eq!(storage.zcard("songs:trending:sc").await.unwrap(), 0);
        assert_eq!(storage.zcard("songs:list:by-score").await.unwrap(), 1);
        assert_eq!(
            storage.get("songs:trending").await.unwrap().as_deref(),
            Some("bare")
        );

        storage.close().await;
    }
}
