use super::models::{JobAuditEntry, JobAuditEventType, JobRun, JobRunStatus};
use super::schema::SERVER_VERSIONED_SCHEMAS;
use super::ServerStore;
use crate::sqlite_persistence::open_versioned;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

const JOB_RUN_COLUMNS: &str =
    "id, job_id, started_at, finished_at, status, error_message, triggered_by";

pub struct SqliteServerStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteServerStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path, SERVER_VERSIONED_SCHEMAS, "server")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn from_timestamp(ts: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(ts, 0).unwrap_or_default()
    }

    fn row_to_job_run(row: &rusqlite::Row) -> rusqlite::Result<JobRun> {
        let status_str: String = row.get("status")?;
        let status = JobRunStatus::parse(&status_str).unwrap_or(JobRunStatus::Failed);
        let finished_at: Option<i64> = row.get("finished_at")?;

        Ok(JobRun {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            started_at: Self::from_timestamp(row.get("started_at")?),
            finished_at: finished_at.map(Self::from_timestamp),
            status,
            error_message: row.get("error_message")?,
            triggered_by: row.get("triggered_by")?,
        })
    }

    fn row_to_audit_entry(row: &rusqlite::Row) -> rusqlite::Result<JobAuditEntry> {
        let event_type_str: String = row.get("event_type")?;
        let event_type =
            JobAuditEventType::parse(&event_type_str).unwrap_or(JobAuditEventType::Progress);
        let details_str: Option<String> = row.get("details")?;
        let details = details_str.and_then(|s| serde_json::from_str(&s).ok());

        Ok(JobAuditEntry {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            event_type,
            timestamp: row.get("timestamp")?,
            duration_ms: row.get("duration_ms")?,
            details,
            error: row.get("error")?,
        })
    }
}

impl ServerStore for SqliteServerStore {
    fn record_job_start(&self, job_id: &str, triggered_by: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO job_runs (job_id, started_at, status, triggered_by)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                job_id,
                Utc::now().timestamp(),
                JobRunStatus::Running.as_str(),
                triggered_by
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn record_job_finish(
        &self,
        run_id: i64,
        status: JobRunStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE job_runs SET finished_at = ?1, status = ?2, error_message = ?3 WHERE id = ?4",
            params![Utc::now().timestamp(), status.as_str(), error_message, run_id],
        )?;
        Ok(())
    }

    fn get_running_jobs(&self) -> Result<Vec<JobRun>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM job_runs WHERE status = ?1 ORDER BY started_at DESC, id DESC",
            JOB_RUN_COLUMNS
        ))?;
        let jobs = stmt
            .query_map(
                params![JobRunStatus::Running.as_str()],
                Self::row_to_job_run,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    fn get_job_history(&self, job_id: &str, limit: usize) -> Result<Vec<JobRun>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM job_runs WHERE job_id = ?1
             ORDER BY started_at DESC, id DESC LIMIT ?2",
            JOB_RUN_COLUMNS
        ))?;
        let jobs = stmt
            .query_map(params![job_id, limit as i64], Self::row_to_job_run)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    fn get_last_run(&self, job_id: &str) -> Result<Option<JobRun>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM job_runs WHERE job_id = ?1
             ORDER BY started_at DESC, id DESC LIMIT 1",
            JOB_RUN_COLUMNS
        ))?;
        let job = stmt
            .query_row(params![job_id], Self::row_to_job_run)
            .optional()?;
        Ok(job)
    }

    fn mark_stale_jobs_failed(&self, started_before: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE job_runs SET status = ?1, finished_at = ?2, error_message = ?3
             WHERE status = ?4 AND started_at < ?5",
            params![
                JobRunStatus::Failed.as_str(),
                Utc::now().timestamp(),
                "Job was interrupted (process exited)",
                JobRunStatus::Running.as_str(),
                started_before
            ],
        )?;
        Ok(count)
    }

    fn log_job_audit(
        &self,
        job_id: &str,
        event_type: JobAuditEventType,
        duration_ms: Option<i64>,
        details: Option<&serde_json::Value>,
        error: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let details_str = details.map(|d| d.to_string());
        conn.execute(
            "INSERT INTO job_audit_log (job_id, event_type, timestamp, duration_ms, details, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                job_id,
                event_type.as_str(),
                Utc::now().timestamp(),
                duration_ms,
                details_str,
                error
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_job_audit_log_by_job(
        &self,
        job_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<JobAuditEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, job_id, event_type, timestamp, duration_ms, details, error
             FROM job_audit_log
             WHERE job_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2 OFFSET ?3",
        )?;
        let entries = stmt
            .query_map(
                params![job_id, limit as i64, offset as i64],
                Self::row_to_audit_entry,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn cleanup_old_job_audit_entries(&self, before_timestamp: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM job_audit_log WHERE timestamp < ?1",
            params![before_timestamp],
        )?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct TestStore {
        store: SqliteServerStore,
        _temp_dir: TempDir, // Keep temp dir alive
    }

    fn create_test_store() -> TestStore {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteServerStore::new(temp_dir.path().join("server.db")).unwrap();
        TestStore {
            store,
            _temp_dir: temp_dir,
        }
    }

    #[test]
    fn test_record_job_start_and_finish() {
        let test = create_test_store();
        let store = &test.store;

        let run_id = store.record_job_start("ranking_snapshot_artist", "cli").unwrap();
        assert!(run_id > 0);

        let running = store.get_running_jobs().unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].status, JobRunStatus::Running);

        store
            .record_job_finish(run_id, JobRunStatus::Completed, None)
            .unwrap();

        assert!(store.get_running_jobs().unwrap().is_empty());
        let history = store.get_job_history("ranking_snapshot_artist", 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, JobRunStatus::Completed);
        assert_eq!(history[0].triggered_by, "cli");
        assert!(history[0].finished_at.is_some());
    }

    #[test]
    fn test_record_job_failure_with_error() {
        let test = create_test_store();
        let store = &test.store;

        let run_id = store.record_job_start("history_retention", "cli").unwrap();
        store
            .record_job_finish(
                run_id,
                JobRunStatus::Failed,
                Some("disk full".to_string()),
            )
            .unwrap();

        let last_run = store.get_last_run("history_retention").unwrap().unwrap();
        assert_eq!(last_run.status, JobRunStatus::Failed);
        assert_eq!(last_run.error_message.as_deref(), Some("disk full"));
        assert!(store.get_last_run("never_ran").unwrap().is_none());
    }

    #[test]
    fn test_job_history_newest_first_and_limited() {
        let test = create_test_store();
        let store = &test.store;

        let mut ids = Vec::new();
        for _ in 0..5 {
            let run_id = store.record_job_start("repeat", "cli").unwrap();
            store
                .record_job_finish(run_id, JobRunStatus::Completed, None)
                .unwrap();
            ids.push(run_id);
        }

        let history = store.get_job_history("repeat", 3).unwrap();
        let got: Vec<i64> = history.iter().map(|r| r.id).collect();
        assert_eq!(got, vec![ids[4], ids[3], ids[2]]);
    }

    #[test]
    fn test_mark_stale_jobs_failed() {
        let test = create_test_store();
        let store = &test.store;

        store.record_job_start("stale_1", "cli").unwrap();
        store.record_job_start("stale_2", "cli").unwrap();

        assert_eq!(store.mark_stale_jobs_failed(Utc::now().timestamp() + 1).unwrap(), 2);
        assert!(store.get_running_jobs().unwrap().is_empty());
        let last = store.get_last_run("stale_1").unwrap().unwrap();
        assert_eq!(last.status, JobRunStatus::Failed);
        assert!(last.error_message.unwrap().contains("interrupted"));
    }

    #[test]
    fn test_mark_stale_jobs_failed_leaves_recent_runs_of_other_process() {
        let test = create_test_store();
        let run_id = test.store.record_job_start("ranking_snapshot_artist", "cron").unwrap();

        // A second process opening the same database
        let other =
            SqliteServerStore::new(test._temp_dir.path().join("server.db")).unwrap();
        let timeout_ago = Utc::now().timestamp() - 900;
        assert_eq!(other.mark_stale_jobs_failed(timeout_ago).unwrap(), 0);

        let run = test
            .store
            .get_last_run("ranking_snapshot_artist")
            .unwrap()
            .unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.status, JobRunStatus::Running);
        assert!(run.error_message.is_none());
    }

    #[test]
    fn test_audit_log_round_trip_and_cleanup() {
        let test = create_test_store();
        let store = &test.store;

        let details = serde_json::json!({ "entity_type": "artist", "written": 3 });
        store
            .log_job_audit("job_a", JobAuditEventType::Started, None, None, None)
            .unwrap();
        store
            .log_job_audit(
                "job_a",
                JobAuditEventType::Completed,
                Some(120),
                Some(&details),
                None,
            )
            .unwrap();
        store
            .log_job_audit("job_b", JobAuditEventType::Failed, Some(5), None, Some("boom"))
            .unwrap();

        let entries = store.get_job_audit_log_by_job("job_a", 10, 0).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event_type, JobAuditEventType::Completed);
        assert_eq!(entries[0].duration_ms, Some(120));
        assert_eq!(entries[0].details.as_ref().unwrap()["written"], 3);
        assert_eq!(entries[1].event_type, JobAuditEventType::Started);

        let paged = store.get_job_audit_log_by_job("job_a", 1, 1).unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].event_type, JobAuditEventType::Started);

        let failed = store.get_job_audit_log_by_job("job_b", 10, 0).unwrap();
        assert_eq!(failed[0].error.as_deref(), Some("boom"));

        // Everything logged so far is older than a minute from now
        let deleted = store
            .cleanup_old_job_audit_entries(Utc::now().timestamp() + 60)
            .unwrap();
        assert_eq!(deleted, 3);
        assert!(store
            .get_job_audit_log_by_job("job_a", 10, 0)
            .unwrap()
            .is_empty());
    }
}
