//! Read-only access to the raw ranking signals.
//!
//! The signal database belongs to the ingestion side of the system; this
//! module only reads from it. Every method returns fully validated, typed
//! records (see [`models`]).

mod memory_store;
pub mod models;
mod schema;
mod sqlite_signal_store;

pub use memory_store::MemorySignalStore;
pub use models::*;
pub use schema::SIGNAL_VERSIONED_SCHEMAS;
pub use sqlite_signal_store::SqliteSignalStore;

use anyhow::Result;

/// Name comparison used by every lookup: trimmed, Unicode lower-cased.
pub(crate) fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub trait SignalStore: Send + Sync {
    // Entity directory
    fn get_entity(&self, id: i64) -> Result<Option<Entity>>;
    /// Case-insensitive exact name lookup. Lowest id wins on duplicates.
    fn find_entity_by_name(&self, name: &str, entity_type: EntityType) -> Result<Option<Entity>>;
    fn get_entities(&self, entity_type: EntityType) -> Result<Vec<Entity>>;
    /// All artists whose parent label is `label_id`, ordered by id.
    fn get_label_roster(&self, label_id: i64) -> Result<Vec<Entity>>;

    // Signal feeds
    fn get_chart_entries(&self) -> Result<Vec<ChartEntry>>;
    fn get_content_items(&self) -> Result<Vec<ContentItem>>;
    fn get_traffic_hits(&self) -> Result<Vec<TrafficHit>>;
    /// Approved airplay rows only.
    fn get_airplay_spins(&self) -> Result<Vec<AirplaySpin>>;
    fn get_releases(&self) -> Result<Vec<ReleaseRecord>>;
    fn get_videos(&self) -> Result<Vec<VideoRecord>>;
}
