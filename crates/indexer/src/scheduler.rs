//! Interval scheduling for background jobs.
//!
//! Each [`IntervalJob`] polls on its own cadence and runs its [`Job`] at most
//! once per minimum interval. The last-run timestamp lives in storage, so a
//! restart does not re-run a job whose interval has not elapsed.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::storage::{keys, Storage};

/// A unit of background work.
#[async_trait]
pub trait Job: Send + Sync {
    /// Run once to completion.
    async fn run(&self) -> Result<()>;
}

/// Wall clock returning unix seconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Clock backed by the system time.
pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp())
}

/// Result of a single scheduling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Minimum interval has not elapsed.
    NotDue,
    /// Job ran and succeeded.
    Ran,
    /// Job ran and failed; the failure was logged.
    Failed,
    /// Last-run timestamp could not be read; nothing ran.
    Skipped,
}

/// Runs a job no more often than `min_interval`, checking every `poll_interval`.
pub struct IntervalJob {
    name: String,
    last_run_key: String,
    min_interval: Duration,
    poll_interval: Duration,
    job: Arc<dyn Job>,
    storage: Storage,
    clock: Clock,
}

impl IntervalJob {
    /// Schedule `job` under `name`; the poll interval defaults to `min_interval`.
    pub fn new(
        name: impl Into<String>,
        job: Arc<dyn Job>,
        storage: Storage,
        min_interval: Duration,
    ) -> Self {
        let name = name.into();
        Self {
            last_run_key: keys::job_last_run(&name),
            name,
            min_interval,
            poll_interval: min_interval,
            job,
            storage,
            clock: system_clock(),
        }
    }

    /// Check for due work every `poll_interval` instead.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Use `clock` instead of the system time.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Job name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Poll forever. Job failures are logged, never returned.
    pub async fn run(&self) {
        info!(
            "Job {} scheduled: every {:?}, polling every {:?}",
            self.name, self.min_interval, self.poll_interval
        );

        loop {
            self.tick().await;
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// One scheduling decision at the current clock time.
    pub async fn tick(&self) -> TickOutcome {
        let now = (self.clock)();
        self.tick_at(now).await
    }

    /// One scheduling decision at `now` (unix seconds).
    ///
    /// Runs the job when no last run is recorded (or it is 0) or when
    /// `now >= last_run + min_interval`. The completion time (`now` plus the
    /// job's duration) is recorded as the last run whether the job succeeded
    /// or not, so a slow job still waits a full interval before rerunning.
    pub async fn tick_at(&self, now: i64) -> TickOutcome {
        let last_run = match self.storage.get_last_run(&self.last_run_key).await {
            Ok(last_run) => last_run.unwrap_or(0),
            Err(e) => {
                warn!("Job {}: failed to read last run, skipping: {:#}", self.name, e);
                return TickOutcome::Skipped;
            }
        };

        let min_secs = i64::try_from(self.min_interval.as_secs()).unwrap_or(i64::MAX);
        if last_run != 0 && now < last_run.saturating_add(min_secs) {
            return TickOutcome::NotDue;
        }

        debug!("Job {} running", self.name);
        let started = Instant::now();
        let outcome = match self.job.run().await {
            Ok(()) => TickOutcome::Ran,
            Err(e) => {
                warn!("Job {} failed: {:#}", self.name, e);
                TickOutcome::Failed
            }
        };

        let elapsed = i64::try_from(started.elapsed().as_secs()).unwrap_or(i64::MAX);
        let finished = now.saturating_add(elapsed);
        if let Err(e) = self.storage.set_last_run(&self.last_run_key, finished).await {
            warn!("Job {}: failed to record last run: {:#}", self.name, e);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::setup_storage;
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

    struct CountingJob {
        runs: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingJob {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            })
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Job for CountingJob {
        async fn run(&self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_runs_once_per_interval() {
        let (storage, _temp_db) = setup_storage().await;
        let job = CountingJob::new();
        let scheduled = IntervalJob::new(
            "poll-contract",
            job.clone(),
            storage.clone(),
            Duration::from_secs(3),
        );

        assert_eq!(scheduled.tick_at(1_000).await, TickOutcome::Ran);
        assert_eq!(scheduled.tick_at(1_001).await, TickOutcome::NotDue);
        assert_eq!(scheduled.tick_at(1_002).await, TickOutcome::NotDue);
        assert_eq!(scheduled.tick_at(1_003).await, TickOutcome::Ran);
        assert_eq!(job.runs(), 2);

        let key = keys::job_last_run("poll-contract");
        assert_eq!(storage.get_last_run(&key).await.unwrap(), Some(1_003));

        storage.close().await;
    }

    #[tokio::test]
    async fn test_failure_still_records_last_run() {
        let (storage, _temp_db) = setup_storage().await;
        let job = CountingJob::new();
        job.fail.store(true, Ordering::SeqCst);
        let scheduled = IntervalJob::new(
            "update-song-score",
            job.clone(),
            storage.clone(),
            Duration::from_secs(5),
        );

        assert_eq!(scheduled.tick_at(100).await, TickOutcome::Failed);
        // No immediate retry after a failure.
        assert_eq!(scheduled.tick_at(101).await, TickOutcome::NotDue);
        assert_eq!(scheduled.tick_at(105).await, TickOutcome::Failed);
        assert_eq!(job.runs(), 2);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_persisted_last_run_survives_restart() {
        let (storage, _temp_db) = setup_storage().await;
        storage
            .set_last_run(&keys::job_last_run("report-trending"), 10_000)
            .await
            .unwrap();

        let job = CountingJob::new();
        let scheduled = IntervalJob::new(
            "report-trending",
            job.clone(),
            storage.clone(),
            Duration::from_secs(86_400),
        )
        .with_poll_interval(Duration::from_secs(10));

        assert_eq!(scheduled.tick_at(10_010).await, TickOutcome::NotDue);
        assert_eq!(scheduled.tick_at(96_400).await, TickOutcome::Ran);
        assert_eq!(job.runs(), 1);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_zero_last_run_always_runs() {
        let (storage, _temp_db) = setup_storage().await;
        storage
            .set_last_run(&keys::job_last_run("poll-contract"), 0)
            .await
            .unwrap();

        let job = CountingJob::new();
        let scheduled = IntervalJob::new(
            "poll-contract",
            job.clone(),
            storage.clone(),
            Duration::from_secs(3),
        );
        assert_eq!(scheduled.tick_at(1).await, TickOutcome::Ran);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_corrupt_last_run_skips_tick() {
        let (storage, _temp_db) = setup_storage().await;
        storage
            .set(&keys::job_last_run("poll-contract"), "yesterday")
            .await
            .unwrap();

        let job = CountingJob::new();
        let scheduled = IntervalJob::new(
            "poll-contract",
            job.clone(),
            storage.clone(),
            Duration::from_secs(3),
        );
        assert_eq!(scheduled.tick_at(1_000).await, TickOutcome::Skipped);
        assert_eq!(job.runs(), 0);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_tick_uses_injected_clock() {
        let (storage, _temp_db) = setup_storage().await;
        let now = Arc::new(AtomicI64::new(500));
        let clock_now = now.clone();

        let job = CountingJob::new();
        let scheduled = IntervalJob::new(
            "poll-contract",
            job.clone(),
            storage.clone(),
            Duration::from_secs(3),
        )
        .with_clock(Arc::new(move || clock_now.load(Ordering::SeqCst)));

        assert_eq!(scheduled.tick().await, TickOutcome::Ran);
        now.store(502, Ordering::SeqCst);
        assert_eq!(scheduled.tick().await, TickOutcome::NotDue);
        now.store(503, Ordering::SeqCst);
        assert_eq!(scheduled.tick().await, TickOutcome::Ran);
        assert_eq!(job.runs(), 2);

        storage.close().await;
    }

    struct SlowJob(Duration);

    #[async_trait]
    impl Job for SlowJob {
        async fn run(&self) -> Result<()> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_interval_measured_from_completion() {
        let (storage, _temp_db) = setup_storage().await;
        let scheduled = IntervalJob::new(
            "poll-contract",
            Arc::new(SlowJob(Duration::from_secs(2))),
            storage.clone(),
            Duration::from_secs(3),
        );

        assert_eq!(scheduled.tick_at(100).await, TickOutcome::Ran);
        let key = keys::job_last_run("poll-contract");
        assert_eq!(storage.get_last_run(&key).await.unwrap(), Some(102));

        // Three seconds after the start, but only one after completion.
        assert_eq!(scheduled.tick_at(103).await, TickOutcome::NotDue);
        assert_eq!(scheduled.tick_at(104).await, TickOutcome::NotDue);

        storage.close().await;
    }
}
