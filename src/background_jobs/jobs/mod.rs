//! Specific background job implementations.

pub mod history_retention;
pub mod ranking_snapshot;

pub use history_retention::HistoryRetentionJob;
pub use ranking_snapshot::RankingSnapshotJob;
