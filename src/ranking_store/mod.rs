//! Storage of computed leaderboards and their interval history.

mod models;
mod schema;
mod sqlite_ranking_store;

pub use models::*;
pub use schema::RANKING_VERSIONED_SCHEMAS;
pub use sqlite_ranking_store::SqliteRankingStore;

use crate::ranking::RankingError;
use crate::signal_store::EntityType;
use anyhow::Result;

pub trait RankingStore: Send + Sync {
    /// Current leaderboard of an entity type, ordered by rank.
    fn current_snapshot(&self, entity_type: EntityType) -> Result<Vec<RankingRow>>;

    /// Archives the current leaderboard into every requested interval,
    /// replaces it with `request.entries` and updates the status marker, all
    /// in one transaction. On any error nothing is changed.
    fn replace_snapshot(&self, request: SnapshotRequest<'_>) -> Result<SnapshotOutcome, RankingError>;

    /// Rows of the most recent archive of an interval, ordered by rank.
    fn latest_history(
        &self,
        entity_type: EntityType,
        interval: Interval,
    ) -> Result<Vec<HistoricalRankingRecord>>;

    /// Archived rows of one entity, newest first.
    fn entity_history(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<HistoricalRankingRecord>>;

    /// The current leaderboard compared against the latest archive of an interval.
    fn interval_changes(
        &self,
        entity_type: EntityType,
        interval: Interval,
    ) -> Result<Vec<IntervalChange>>;

    /// Deletes archived rows of an interval with `snapshot_at < before_timestamp`.
    fn prune_history(&self, interval: Interval, before_timestamp: i64) -> Result<usize>;

    fn get_status(&self, entity_type: EntityType) -> Result<Option<RankingStatus>>;
}
