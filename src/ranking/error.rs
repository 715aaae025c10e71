use thiserror::Error;

/// Failures that abort a ranking run.
///
/// Malformed source rows are not represented here: they are defaulted to a
/// zero contribution at the store boundary and never stop a run.
#[derive(Debug, Error)]
pub enum RankingError {
    /// Invalid settings, unknown interval or entity type. Raised before any
    /// snapshot table is touched.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The signal store could not be read at all.
    #[error("Signal source unavailable: {0:#}")]
    SourceUnavailable(anyhow::Error),

    /// Archive, clear or write failed; the snapshot transaction was rolled back.
    #[error("Snapshot persistence failed: {0:#}")]
    Persistence(anyhow::Error),

    #[error("Run exceeded its deadline after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },
}

impl RankingError {
    pub fn config(msg: impl Into<String>) -> Self {
        RankingError::Config(msg.into())
    }
}
