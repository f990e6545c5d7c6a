//! Indexer cursor and scheduler bookkeeping.

use super::{keys, Storage};
use anyhow::{Context, Result};

impl Storage {
    /// Highest fully processed block, `None` if nothing was indexed yet.
    pub async fn get_cursor(&self) -> Result<Option<u64>> {
        let Some(value) = self.get(keys::CURSOR).await? else {
            return Ok(None);
        };

        let block = value
            .parse::<u64>()
            .with_context(|| format!("Corrupt block cursor: {}", value))?;
        Ok(Some(block))
    }

    /// Move the cursor forward to `block`.
    ///
    /// A `block` at or below the stored cursor is ignored; returns `true` if
    /// the cursor moved. Only [`Storage::reset_cursor`] can move it back.
    pub async fn advance_cursor(&self, block: u64) -> Result<bool> {
        self.set_if_greater(keys::CURSOR, block).await
    }

    /// Forget the cursor so the next pass replays from the start block.
    pub async fn reset_cursor(&self) -> Result<()> {
        self.del(keys::CURSOR).await?;
        Ok(())
    }

    /// Last-run unix timestamp of a scheduled job.
    pub async fn get_last_run(&self, key: &str) -> Result<Option<i64>> {
        let Some(value) = self.get(key).await? else {
            return Ok(None);
        };

        let ts = value
            .parse::<i64>()
            .with_context(|| format!("Corrupt last-run timestamp in {}: {}", key, value))?;
        Ok(Some(ts))
    }

    /// Record a job's last-run unix timestamp.
    pub async fn set_last_run(&self, key: &str, timestamp: i64) -> Result<()> {
        self.set(key, &timestamp.to_string()).await
    }
}
