//! A throwaway `db_dir` with all three databases.

#![allow(dead_code)]

use super::fixtures::{seed_default, SignalFixture};
use chrono::{DateTime, Utc};
use hitrank::background_jobs::jobs::{HistoryRetentionJob, RankingSnapshotJob};
use hitrank::background_jobs::{run_job, run_jobs_concurrently, BackgroundJob, JobContext, JobOutcome};
use hitrank::config::{RankingSettings, RetentionSettings};
use hitrank::ranking_store::{Interval, RankingRow, RankingStore, SqliteRankingStore};
use hitrank::server_store::SqliteServerStore;
use hitrank::signal_store::{EntityType, SqliteSignalStore};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestEnv {
    pub fixture: SignalFixture,
    pub ranking_store: Arc<SqliteRankingStore>,
    pub server_store: Arc<SqliteServerStore>,
    pub settings: RankingSettings,
    pub retention: RetentionSettings,
    _temp_dir: TempDir, // Keep temp dir alive
}

impl TestEnv {
    /// Empty signal database.
    pub fn empty() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let fixture = SignalFixture::create(&temp_dir.path().join("signals.db")).unwrap();
        Self::with_fixture(temp_dir, fixture)
    }

    /// Signal database seeded with the default fixture.
    pub fn seeded() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let fixture = seed_default(&temp_dir.path().join("signals.db")).unwrap();
        Self::with_fixture(temp_dir, fixture)
    }

    fn with_fixture(temp_dir: TempDir, fixture: SignalFixture) -> Self {
        let ranking_store =
            Arc::new(SqliteRankingStore::new(temp_dir.path().join("rankings.db")).unwrap());
        let server_store =
            Arc::new(SqliteServerStore::new(temp_dir.path().join("server.db")).unwrap());
        Self {
            fixture,
            ranking_store,
            server_store,
            settings: RankingSettings::default(),
            retention: RetentionSettings::default(),
            _temp_dir: temp_dir,
        }
    }

    pub fn db_dir(&self) -> PathBuf {
        self._temp_dir.path().to_path_buf()
    }

    /// A fresh context, as one scheduled tick would build it.
    pub fn context(&self, run_at: DateTime<Utc>) -> JobContext {
        let signal_store = SqliteSignalStore::open(self.db_dir().join("signals.db")).unwrap();
        JobContext::new(
            Arc::new(signal_store),
            self.ranking_store.clone(),
            self.server_store.clone(),
            self.settings.clone(),
            self.retention.clone(),
            run_at,
        )
    }

    /// Both snapshot jobs concurrently, then retention.
    pub async fn run_tick(&self, run_at: DateTime<Utc>) -> Vec<JobOutcome> {
        self.run_tick_with(self.context(run_at)).await
    }

    pub async fn run_tick_with(&self, ctx: JobContext) -> Vec<JobOutcome> {
        let jobs: Vec<Arc<dyn BackgroundJob>> = RankingSnapshotJob::all()
            .into_iter()
            .map(|job| Arc::new(job) as Arc<dyn BackgroundJob>)
            .collect();
        let mut outcomes = run_jobs_concurrently(jobs, &ctx, "test").await;
        outcomes.push(run_job(Arc::new(HistoryRetentionJob::new()), ctx, "test").await);
        outcomes
    }

    pub fn current(&self, entity_type: EntityType) -> Vec<RankingRow> {
        self.ranking_store.current_snapshot(entity_type).unwrap()
    }

    pub fn current_artist_ids(&self) -> Vec<i64> {
        self.current(EntityType::Artist)
            .iter()
            .map(|r| r.entity_id)
            .collect()
    }

    pub fn archived_artist_ids(&self, interval: Interval) -> Vec<i64> {
        self.ranking_store
            .latest_history(EntityType::Artist, interval)
            .unwrap()
            .iter()
            .map(|r| r.row.entity_id)
            .collect()
    }
}

pub fn assert_all_succeeded(outcomes: &[JobOutcome]) {
    for outcome in outcomes {
        assert!(
            outcome.is_success(),
            "{} failed: {:?}",
            outcome.job_id,
            outcome.result
        );
    }
}
