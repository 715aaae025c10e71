//! Leaderboard snapshot job.
//!
//! Ranks every entity of one type and swaps the result in as the current
//! leaderboard, archiving the outgoing one into the history intervals due on
//! this tick.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError},
    JobAuditLogger,
};
use crate::ranking::{rank_entities, Deadline, RankingError};
use crate::ranking_store::{SnapshotOutcome, SnapshotRequest};
use crate::signal_store::EntityType;
use std::sync::Arc;
use tracing::info;

pub struct RankingSnapshotJob {
    entity_type: EntityType,
}

impl RankingSnapshotJob {
    pub fn new(entity_type: EntityType) -> Self {
        Self { entity_type }
    }

    /// One job per entity type, in `EntityType::ALL` order.
    pub fn all() -> Vec<Self> {
        EntityType::ALL.into_iter().map(Self::new).collect()
    }

    fn run(&self, ctx: &JobContext, audit: &JobAuditLogger) -> Result<SnapshotOutcome, RankingError> {
        ctx.settings.validate()?;
        let deadline = Deadline::from_settings(&ctx.settings);

        let signals = ctx.signals()?;
        deadline.check()?;

        let entries = rank_entities(
            &signals,
            self.entity_type,
            &ctx.settings,
            ctx.run_at,
            &deadline,
        )?;
        audit.log_progress(serde_json::json!({
            "stage": "ranked",
            "entries": entries.len(),
            "elapsed_ms": deadline.elapsed_ms(),
        }));

        ctx.ranking_store.replace_snapshot(SnapshotRequest {
            entity_type: self.entity_type,
            entries: &entries,
            intervals: &ctx.intervals,
            run_at: ctx.run_at,
            run_id: ctx.run_id,
            deadline: &deadline,
        })
    }
}

impl BackgroundJob for RankingSnapshotJob {
    fn id(&self) -> &'static str {
        match self.entity_type {
            EntityType::Artist => "ranking_snapshot_artist",
            EntityType::Label => "ranking_snapshot_label",
        }
    }

    fn name(&self) -> &'static str {
        match self.entity_type {
            EntityType::Artist => "Artist Ranking Snapshot",
            EntityType::Label => "Label Ranking Snapshot",
        }
    }

    fn description(&self) -> &'static str {
        "Rank entities from raw signals and replace the current leaderboard, archiving the previous one"
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        let audit = JobAuditLogger::new(Arc::clone(&ctx.server_store), self.id());
        let intervals: Vec<&str> = ctx.intervals.iter().map(|i| i.as_str()).collect();
        audit.log_started(Some(serde_json::json!({
            "entity_type": self.entity_type.as_str(),
            "run_at": ctx.run_at.timestamp(),
            "intervals": intervals,
        })));

        match self.run(ctx, &audit) {
            Ok(outcome) => {
                info!(
                    "Ranked {} {}s, archived into {} interval(s)",
                    outcome.written,
                    self.entity_type,
                    outcome.archived.len()
                );
                let archived: serde_json::Map<String, serde_json::Value> = outcome
                    .archived
                    .iter()
                    .map(|(interval, rows)| (interval.as_str().to_string(), (*rows).into()))
                    .collect();
                audit.log_completed(Some(serde_json::json!({
                    "entity_type": self.entity_type.as_str(),
                    "written": outcome.written,
                    "archived": archived,
                    "snapshot_at": outcome.snapshot_at,
                })));
                Ok(())
            }
            Err(e) => {
                audit.log_failed(
                    &e.to_string(),
                    Some(serde_json::json!({ "entity_type": self.entity_type.as_str() })),
                );
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RankingSettings, RetentionSettings};
    use crate::ranking_store::{Interval, RankingStore, SqliteRankingStore};
    use crate::server_store::{JobAuditEventType, ServerStore, SqliteServerStore};
    use crate::signal_store::{MemorySignalStore, ReleaseRecord};
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::TempDir;

    struct TestEnv {
        ctx: JobContext,
        ranking_store: Arc<SqliteRankingStore>,
        server_store: Arc<SqliteServerStore>,
        _temp_dir: TempDir,
    }

    fn release(id: i64, entity_id: i64) -> ReleaseRecord {
        ReleaseRecord {
            id,
            entity_id,
            release_date: NaiveDate::from_ymd_opt(2024, 2, 1),
        }
    }

    fn create_env(settings: RankingSettings) -> TestEnv {
        let temp_dir = TempDir::new().unwrap();
        let mut signals = MemorySignalStore::new();
        signals
            .add_label(1, "Northern Lights")
            .add_artist(10, "Ada Stone", Some(1))
            .add_artist(11, "Bex Harlow", Some(1))
            .add_artist(12, "Quiet One", None);
        signals.releases = vec![release(100, 10), release(101, 11), release(102, 11)];

        let ranking_store =
            Arc::new(SqliteRankingStore::new(temp_dir.path().join("rankings.db")).unwrap());
        let server_store =
            Arc::new(SqliteServerStore::new(temp_dir.path().join("server.db")).unwrap());
        let ctx = JobContext::new(
            Arc::new(signals),
            ranking_store.clone(),
            server_store.clone(),
            settings,
            RetentionSettings::default(),
            // A Monday: daily and weekly are due
            Utc.with_ymd_and_hms(2024, 3, 4, 6, 0, 0).unwrap(),
        );
        TestEnv {
            ctx,
            ranking_store,
            server_store,
            _temp_dir: temp_dir,
        }
    }

    #[test]
    fn test_job_ids_are_distinct_per_entity_type() {
        let jobs = RankingSnapshotJob::all();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id(), "ranking_snapshot_artist");
        assert_eq!(jobs[1].id(), "ranking_snapshot_label");
    }

    #[test]
    fn test_execute_writes_leaderboard_and_audit_trail() {
        let env = create_env(RankingSettings::default());
        let job = RankingSnapshotJob::new(EntityType::Artist);

        job.execute(&env.ctx).unwrap();

        let rows = env.ranking_store.current_snapshot(EntityType::Artist).unwrap();
        let order: Vec<i64> = rows.iter().map(|r| r.entity_id).collect();
        assert_eq!(order, vec![11, 10, 12]);
        let ranks: Vec<u32> = rows.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(rows[2].total_score, 0.0);

        let status = env.ranking_store.get_status(EntityType::Artist).unwrap().unwrap();
        assert_eq!(status.entity_count, 3);
        assert_eq!(status.last_ranked_at, env.ctx.run_at.timestamp());

        let audit = env
            .server_store
            .get_job_audit_log_by_job("ranking_snapshot_artist", 10, 0)
            .unwrap();
        let events: Vec<JobAuditEventType> = audit.iter().rev().map(|e| e.event_type).collect();
        assert_eq!(
            events,
            vec![
                JobAuditEventType::Started,
                JobAuditEventType::Progress,
                JobAuditEventType::Completed,
            ]
        );
        assert_eq!(audit[0].details.as_ref().unwrap()["written"], 3);
    }

    #[test]
    fn test_second_run_archives_into_due_intervals() {
        let env = create_env(RankingSettings::default());
        let job = RankingSnapshotJob::new(EntityType::Artist);

        job.execute(&env.ctx).unwrap();
        job.execute(&env.ctx).unwrap();

        for interval in [Interval::Daily, Interval::Weekly] {
            let archived = env
                .ranking_store
                .latest_history(EntityType::Artist, interval)
                .unwrap();
            assert_eq!(archived.len(), 3, "{} archive", interval);
        }
        assert!(env
            .ranking_store
            .latest_history(EntityType::Artist, Interval::Monthly)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_invalid_config_fails_without_touching_snapshot() {
        let settings = RankingSettings {
            top_n: 0,
            ..RankingSettings::default()
        };
        let env = create_env(settings);
        let job = RankingSnapshotJob::new(EntityType::Label);

        let result = job.execute(&env.ctx);
        assert!(matches!(result, Err(JobError::InvalidConfig(_))));
        assert!(env
            .ranking_store
            .current_snapshot(EntityType::Label)
            .unwrap()
            .is_empty());
        assert!(env.ranking_store.get_status(EntityType::Label).unwrap().is_none());

        let audit = env
            .server_store
            .get_job_audit_log_by_job("ranking_snapshot_label", 10, 0)
            .unwrap();
        assert_eq!(audit[0].event_type, JobAuditEventType::Failed);
    }
}
