use super::context::JobContext;
use crate::ranking::RankingError;

/// Errors that can occur during job execution.
#[derive(Debug)]
pub enum JobError {
    ExecutionFailed(String),
    InvalidConfig(String),
    Timeout,
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::ExecutionFailed(msg) => write!(f, "Execution failed: {}", msg),
            JobError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            JobError::Timeout => write!(f, "Job timed out"),
        }
    }
}

impl std::error::Error for JobError {}

impl From<RankingError> for JobError {
    fn from(err: RankingError) -> Self {
        match err {
            RankingError::Config(msg) => JobError::InvalidConfig(msg),
            RankingError::Timeout { .. } => JobError::Timeout,
            other => JobError::ExecutionFailed(other.to_string()),
        }
    }
}

/// A unit of batch work.
///
/// Jobs are executed synchronously in a blocking context.
pub trait BackgroundJob: Send + Sync {
    /// Unique identifier for this job, used as the key in job history.
    fn id(&self) -> &'static str;

    /// Human-readable name for this job.
    fn name(&self) -> &'static str;

    /// Description of what this job does.
    fn description(&self) -> &'static str;

    /// Execute the job.
    ///
    /// Called from `spawn_blocking`; the job runs to completion or fails as
    /// a whole.
    fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_errors_map_to_job_errors() {
        assert!(matches!(
            JobError::from(RankingError::config("bad weight")),
            JobError::InvalidConfig(msg) if msg == "bad weight"
        ));
        assert!(matches!(
            JobError::from(RankingError::Timeout { elapsed_ms: 10 }),
            JobError::Timeout
        ));
        let err = JobError::from(RankingError::Persistence(anyhow::anyhow!("disk full")));
        assert!(err.to_string().contains("disk full"));
    }
}
