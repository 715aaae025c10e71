//! History retention job.
//!
//! Deletes archived leaderboard rows older than each interval's maximum age,
//! and old job audit entries.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError},
    JobAuditLogger,
};
use crate::ranking_store::Interval;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Unix timestamp `days` before `run_at`, or `None` when that lies before
/// the earliest representable time (nothing can be that old).
fn cutoff_timestamp(run_at: DateTime<Utc>, days: u32) -> Option<i64> {
    Duration::try_days(days.into())
        .and_then(|age| run_at.checked_sub_signed(age))
        .map(|cutoff| cutoff.timestamp())
}

/// Background job that enforces the history retention policy.
///
/// Every interval is pruned independently: a failure on one interval is
/// logged and reported, but the remaining intervals are still pruned.
pub struct HistoryRetentionJob;

impl HistoryRetentionJob {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HistoryRetentionJob {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundJob for HistoryRetentionJob {
    fn id(&self) -> &'static str {
        "history_retention"
    }

    fn name(&self) -> &'static str {
        "History Retention"
    }

    fn description(&self) -> &'static str {
        "Delete archived rankings and audit entries older than the retention policy"
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        let audit = JobAuditLogger::new(Arc::clone(&ctx.server_store), self.id());
        audit.log_started(None);

        let mut pruned = serde_json::Map::new();
        let mut failures = Vec::new();

        for interval in Interval::ALL {
            let Some(days) = ctx.retention.max_age_days(interval) else {
                debug!("{} history is kept forever", interval);
                continue;
            };
            let Some(cutoff) = cutoff_timestamp(ctx.run_at, days) else {
                warn!(
                    "{} retention of {} days reaches before the earliest date, keeping all rows",
                    interval, days
                );
                continue;
            };
            match ctx.ranking_store.prune_history(interval, cutoff) {
                Ok(deleted) => {
                    if deleted > 0 {
                        info!(
                            "Pruned {} {} history rows older than {} days",
                            deleted, interval, days
                        );
                    }
                    pruned.insert(interval.as_str().to_string(), deleted.into());
                }
                Err(e) => {
                    warn!("Failed to prune {} history: {:#}", interval, e);
                    failures.push(format!("{}: {:#}", interval, e));
                }
            }
        }

        let mut audit_deleted = 0;
        if let Some(cutoff) = ctx
            .retention
            .audit_log_days
            .and_then(|days| cutoff_timestamp(ctx.run_at, days))
        {
            match ctx.server_store.cleanup_old_job_audit_entries(cutoff) {
                Ok(deleted) => {
                    if deleted > 0 {
                        info!("Deleted {} old job audit entries", deleted);
                    }
                    audit_deleted = deleted;
                }
                Err(e) => {
                    warn!("Failed to clean up job audit log: {:#}", e);
                    failures.push(format!("audit log: {:#}", e));
                }
            }
        }

        let details = serde_json::json!({
            "pruned": pruned,
            "audit_entries_deleted": audit_deleted,
        });
        if failures.is_empty() {
            audit.log_completed(Some(details));
            Ok(())
        } else {
            let error_msg = failures.join("; ");
            audit.log_failed(&error_msg, Some(details));
            Err(JobError::ExecutionFailed(error_msg))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RankingSettings, RetentionSettings};
    use crate::ranking::{CompositeScore, Deadline, RankedEntry};
    use crate::ranking_store::{RankingStore, SnapshotRequest, SqliteRankingStore};
    use crate::server_store::SqliteServerStore;
    use crate::signal_store::{EntityType, MemorySignalStore};
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn entry(id: i64, total: f64) -> RankedEntry {
        RankedEntry {
            rank: 1,
            score: CompositeScore {
                entity_id: id,
                entity_name: format!("Artist {}", id),
                entity_type: EntityType::Artist,
                base_score: total,
                boost_score: 0.0,
                total_score: total,
                components: BTreeMap::new(),
            },
        }
    }

    fn snapshot(store: &SqliteRankingStore, run_at: DateTime<Utc>) {
        let deadline = Deadline::new(std::time::Duration::from_secs(60));
        store
            .replace_snapshot(SnapshotRequest {
                entity_type: EntityType::Artist,
                entries: &[entry(1, 10.0)],
                intervals: &Interval::ALL,
                run_at,
                run_id: None,
                deadline: &deadline,
            })
            .unwrap();
    }

    #[test]
    fn test_prunes_each_interval_by_its_own_age() {
        let temp_dir = TempDir::new().unwrap();
        let ranking_store =
            Arc::new(SqliteRankingStore::new(temp_dir.path().join("rankings.db")).unwrap());
        let server_store =
            Arc::new(SqliteServerStore::new(temp_dir.path().join("server.db")).unwrap());

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        // Two runs 200 days ago: the second archives into every interval
        let old = now - Duration::days(200);
        snapshot(&ranking_store, old);
        snapshot(&ranking_store, old);

        let ctx = JobContext::new(
            Arc::new(MemorySignalStore::new()),
            ranking_store.clone(),
            server_store,
            RankingSettings::default(),
            RetentionSettings::default(),
            now,
        );
        HistoryRetentionJob::new().execute(&ctx).unwrap();

        // Daily keeps 90 days, weekly 730, monthly 1825, yearly forever
        assert!(ranking_store
            .latest_history(EntityType::Artist, Interval::Daily)
            .unwrap()
            .is_empty());
        for interval in [Interval::Weekly, Interval::Monthly, Interval::Yearly] {
            assert_eq!(
                ranking_store
                    .latest_history(EntityType::Artist, interval)
                    .unwrap()
                    .len(),
                1,
                "{} history",
                interval
            );
        }
    }

    #[test]
    fn test_keep_forever_skips_interval() {
        let temp_dir = TempDir::new().unwrap();
        let ranking_store =
            Arc::new(SqliteRankingStore::new(temp_dir.path().join("rankings.db")).unwrap());
        let server_store =
            Arc::new(SqliteServerStore::new(temp_dir.path().join("server.db")).unwrap());

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let old = now - Duration::days(4000);
        snapshot(&ranking_store, old);
        snapshot(&ranking_store, old);

        let retention = RetentionSettings {
            daily_days: None,
            weekly_days: None,
            monthly_days: None,
            yearly_days: None,
            audit_log_days: None,
        };
        let ctx = JobContext::new(
            Arc::new(MemorySignalStore::new()),
            ranking_store.clone(),
            server_store,
            RankingSettings::default(),
            retention,
            now,
        );
        HistoryRetentionJob::new().execute(&ctx).unwrap();

        for interval in Interval::ALL {
            assert_eq!(
                ranking_store
                    .latest_history(EntityType::Artist, interval)
                    .unwrap()
                    .len(),
                1
            );
        }
    }

    #[test]
    fn test_unrepresentable_age_does_not_block_other_intervals() {
        let temp_dir = TempDir::new().unwrap();
        let ranking_store =
            Arc::new(SqliteRankingStore::new(temp_dir.path().join("rankings.db")).unwrap());
        let server_store =
            Arc::new(SqliteServerStore::new(temp_dir.path().join("server.db")).unwrap());

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let old = now - Duration::days(4000);
        snapshot(&ranking_store, old);
        snapshot(&ranking_store, old);

        let retention = RetentionSettings {
            daily_days: Some(u32::MAX),
            weekly_days: Some(30),
            monthly_days: None,
            yearly_days: None,
            audit_log_days: Some(u32::MAX),
        };
        let ctx = JobContext::new(
            Arc::new(MemorySignalStore::new()),
            ranking_store.clone(),
            server_store,
            RankingSettings::default(),
            retention,
            now,
        );
        HistoryRetentionJob::new().execute(&ctx).unwrap();

        assert_eq!(
            ranking_store
                .latest_history(EntityType::Artist, Interval::Daily)
                .unwrap()
                .len(),
            1
        );
        assert!(ranking_store
            .latest_history(EntityType::Artist, Interval::Weekly)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_cutoff_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(
            cutoff_timestamp(now, 30),
            Some((now - Duration::days(30)).timestamp())
        );
        assert_eq!(cutoff_timestamp(now, u32::MAX), None);
    }
}
