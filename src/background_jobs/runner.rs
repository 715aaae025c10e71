//! Runs jobs on the blocking pool and records each run in the server store.

use super::context::JobContext;
use super::job::{BackgroundJob, JobError};
use crate::server_store::JobRunStatus;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Result of one job run.
#[derive(Debug)]
pub struct JobOutcome {
    pub job_id: &'static str,
    /// Row id in `job_runs`, absent if the start could not be recorded.
    pub run_id: Option<i64>,
    pub result: Result<(), JobError>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs a single job to completion.
///
/// The run is recorded as `running` before the job starts and finished as
/// `completed` or `failed` afterwards. A panic inside the job is reported as
/// a failure instead of tearing down the caller.
pub async fn run_job(
    job: Arc<dyn BackgroundJob>,
    ctx: JobContext,
    triggered_by: &str,
) -> JobOutcome {
    let job_id = job.id();
    let server_store = Arc::clone(&ctx.server_store);

    let run_id = match server_store.record_job_start(job_id, triggered_by) {
        Ok(id) => Some(id),
        Err(e) => {
            error!("Failed to record job start for {}: {}", job_id, e);
            None
        }
    };
    let ctx = match run_id {
        Some(id) => ctx.with_run_id(id),
        None => ctx,
    };

    info!("Starting job {} ({})", job_id, job.name());
    let start_time = Instant::now();
    let result = tokio::task::spawn_blocking(move || job.execute(&ctx)).await;
    let elapsed = start_time.elapsed();

    let result = match result {
        Ok(Ok(())) => {
            info!("Job {} completed successfully in {:?}", job_id, elapsed);
            Ok(())
        }
        Ok(Err(e)) => {
            error!("Job {} failed after {:?}: {}", job_id, elapsed, e);
            Err(e)
        }
        Err(e) => {
            error!("Job {} panicked after {:?}: {}", job_id, elapsed, e);
            Err(JobError::ExecutionFailed(format!("Task panic: {}", e)))
        }
    };

    if let Some(run_id) = run_id {
        let (status, error_msg) = match &result {
            Ok(()) => (JobRunStatus::Completed, None),
            Err(e) => (JobRunStatus::Failed, Some(e.to_string())),
        };
        if let Err(e) = server_store.record_job_finish(run_id, status, error_msg) {
            error!("Failed to record job finish for {}: {}", job_id, e);
        }
    }

    JobOutcome {
        job_id,
        run_id,
        result,
    }
}

/// Runs independent jobs concurrently, each on its own blocking thread.
///
/// Outcomes are returned in the order the jobs were given.
pub async fn run_jobs_concurrently(
    jobs: Vec<Arc<dyn BackgroundJob>>,
    ctx: &JobContext,
    triggered_by: &str,
) -> Vec<JobOutcome> {
    let handles: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            let job_id = job.id();
            let ctx = ctx.clone();
            let triggered_by = triggered_by.to_string();
            let handle = tokio::spawn(async move { run_job(job, ctx, &triggered_by).await });
            (job_id, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (job_id, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Runner task for {} failed: {}", job_id, e);
                JobOutcome {
                    job_id,
                    run_id: None,
                    result: Err(JobError::ExecutionFailed(format!("Task panic: {}", e))),
                }
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RankingSettings, RetentionSettings};
    use crate::ranking_store::SqliteRankingStore;
    use crate::server_store::{ServerStore, SqliteServerStore};
    use crate::signal_store::MemorySignalStore;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    struct StubJob {
        id: &'static str,
        fail: bool,
        panic: bool,
    }

    impl BackgroundJob for StubJob {
        fn id(&self) -> &'static str {
            self.id
        }

        fn name(&self) -> &'static str {
            "Stub"
        }

        fn description(&self) -> &'static str {
            "Test job"
        }

        fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
            assert!(ctx.run_id.is_some());
            if self.panic {
                panic!("stub panic");
            }
            if self.fail {
                return Err(JobError::ExecutionFailed("stub failure".to_string()));
            }
            Ok(())
        }
    }

    fn stub(id: &'static str, fail: bool, panic: bool) -> Arc<dyn BackgroundJob> {
        Arc::new(StubJob { id, fail, panic })
    }

    fn create_context(temp_dir: &TempDir) -> (JobContext, Arc<SqliteServerStore>) {
        let server_store =
            Arc::new(SqliteServerStore::new(temp_dir.path().join("server.db")).unwrap());
        let ranking_store =
            Arc::new(SqliteRankingStore::new(temp_dir.path().join("rankings.db")).unwrap());
        let ctx = JobContext::new(
            Arc::new(MemorySignalStore::default()),
            ranking_store,
            server_store.clone(),
            RankingSettings::default(),
            RetentionSettings::default(),
            Utc.with_ymd_and_hms(2024, 3, 4, 6, 0, 0).unwrap(),
        );
        (ctx, server_store)
    }

    #[tokio::test]
    async fn test_successful_job_is_recorded_completed() {
        let temp_dir = TempDir::new().unwrap();
        let (ctx, server_store) = create_context(&temp_dir);

        let outcome = run_job(stub("ok_job", false, false), ctx, "test").await;
        assert!(outcome.is_success());

        let last = server_store.get_last_run("ok_job").unwrap().unwrap();
        assert_eq!(Some(last.id), outcome.run_id);
        assert_eq!(last.status, JobRunStatus::Completed);
        assert_eq!(last.triggered_by, "test");
    }

    #[tokio::test]
    async fn test_failed_and_panicking_jobs_are_recorded_failed() {
        let temp_dir = TempDir::new().unwrap();
        let (ctx, server_store) = create_context(&temp_dir);

        let outcomes = run_jobs_concurrently(
            vec![
                stub("failing_job", true, false),
                stub("panicking_job", false, true),
                stub("fine_job", false, false),
            ],
            &ctx,
            "test",
        )
        .await;

        let ids: Vec<&str> = outcomes.iter().map(|o| o.job_id).collect();
        assert_eq!(ids, vec!["failing_job", "panicking_job", "fine_job"]);
        assert!(!outcomes[0].is_success());
        assert!(!outcomes[1].is_success());
        assert!(outcomes[2].is_success());

        let failing = server_store.get_last_run("failing_job").unwrap().unwrap();
        assert_eq!(failing.status, JobRunStatus::Failed);
        assert!(failing.error_message.unwrap().contains("stub failure"));

        let panicking = server_store.get_last_run("panicking_job").unwrap().unwrap();
        assert_eq!(panicking.status, JobRunStatus::Failed);
        assert!(panicking.error_message.unwrap().contains("panic"));

        assert!(server_store.get_running_jobs().unwrap().is_empty());
    }
}
