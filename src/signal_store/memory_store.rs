use super::models::{
    AirplaySpin, ChartEntry, ContentItem, Entity, EntityType, ReleaseRecord, TrafficHit,
    VideoRecord,
};
use super::{fold_name, SignalStore};
use anyhow::Result;

/// In-memory signal source, used for fixtures and dry runs.
///
/// Records are held already validated, so every accessor is a plain clone.
#[derive(Debug, Clone, Default)]
pub struct MemorySignalStore {
    pub entities: Vec<Entity>,
    pub chart_entries: Vec<ChartEntry>,
    pub content_items: Vec<ContentItem>,
    pub traffic_hits: Vec<TrafficHit>,
    pub airplay_spins: Vec<AirplaySpin>,
    pub releases: Vec<ReleaseRecord>,
    pub videos: Vec<VideoRecord>,
}

impl MemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_artist(&mut self, id: i64, name: &str, label_id: Option<i64>) -> &mut Self {
        self.entities.push(Entity {
            id,
            name: name.to_string(),
            entity_type: EntityType::Artist,
            label_id,
        });
        self
    }

    pub fn add_label(&mut self, id: i64, name: &str) -> &mut Self {
        self.entities.push(Entity {
            id,
            name: name.to_string(),
            entity_type: EntityType::Label,
            label_id: None,
        });
        self
    }

    fn sorted_entities<F: Fn(&Entity) -> bool>(&self, filter: F) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.entities.iter().filter(|e| filter(e)).cloned().collect();
        entities.sort_by_key(|e| e.id);
        entities
    }
}

impl SignalStore for MemorySignalStore {
    fn get_entity(&self, id: i64) -> Result<Option<Entity>> {
        Ok(self.entities.iter().find(|e| e.id == id).cloned())
    }

    fn find_entity_by_name(&self, name: &str, entity_type: EntityType) -> Result<Option<Entity>> {
        let needle = fold_name(name);
        Ok(self
            .sorted_entities(|e| e.entity_type == entity_type && fold_name(&e.name) == needle)
            .into_iter()
            .next())
    }

    fn get_entities(&self, entity_type: EntityType) -> Result<Vec<Entity>> {
        Ok(self.sorted_entities(|e| e.entity_type == entity_type))
    }

    fn get_label_roster(&self, label_id: i64) -> Result<Vec<Entity>> {
        Ok(self.sorted_entities(|e| {
            e.entity_type == EntityType::Artist && e.label_id == Some(label_id)
        }))
    }

    fn get_chart_entries(&self) -> Result<Vec<ChartEntry>> {
        Ok(self.chart_entries.clone())
    }

    fn get_content_items(&self) -> Result<Vec<ContentItem>> {
        Ok(self.content_items.clone())
    }

    fn get_traffic_hits(&self) -> Result<Vec<TrafficHit>> {
        Ok(self.traffic_hits.clone())
    }

    fn get_airplay_spins(&self) -> Result<Vec<AirplaySpin>> {
        Ok(self.airplay_spins.clone())
    }

    fn get_releases(&self) -> Result<Vec<ReleaseRecord>> {
        Ok(self.releases.clone())
    }

    fn get_videos(&self) -> Result<Vec<VideoRecord>> {
        Ok(self.videos.clone())
    }
}
