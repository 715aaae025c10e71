//! Signal extraction.
//!
//! All raw signals are loaded once per run into an immutable [`SignalSet`],
//! indexed by entity id or lower-cased entity name. Extraction for an entity
//! only reads from the set, so entities can be processed in parallel.

use super::names::NameSplitter;
use super::RankingError;
use crate::config::RankingSettings;
use crate::signal_store::{
    AirplaySpin, ChartEntry, ContentItem, Entity, EntityType, ReleaseRecord, SignalStore,
    TrafficHit, VideoRecord,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Names shorter than this never match free text.
const MIN_MENTION_NAME_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Chart,
    Mention,
    Traffic,
    Airplay,
    Release,
    Video,
}

impl SignalType {
    pub const ALL: [SignalType; 6] = [
        SignalType::Chart,
        SignalType::Mention,
        SignalType::Traffic,
        SignalType::Airplay,
        SignalType::Release,
        SignalType::Video,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Chart => "chart",
            SignalType::Mention => "mention",
            SignalType::Traffic => "traffic",
            SignalType::Airplay => "airplay",
            SignalType::Release => "release",
            SignalType::Video => "video",
        }
    }

    /// View-style signals lose value with age before the active/historic split.
    pub fn is_view_style(&self) -> bool {
        matches!(self, SignalType::Traffic | SignalType::Video)
    }

    /// Signal types that feed the composite score of an entity type.
    /// Airplay is credited by artist name only, so labels don't get it directly.
    pub fn for_entity_type(entity_type: EntityType) -> &'static [SignalType] {
        match entity_type {
            EntityType::Artist => &SignalType::ALL,
            EntityType::Label => &[
                SignalType::Chart,
                SignalType::Mention,
                SignalType::Traffic,
                SignalType::Release,
                SignalType::Video,
            ],
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A dated, weighted contribution of one raw row to one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    pub at: DateTime<Utc>,
    pub points: f64,
}

pub fn date_to_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone)]
struct IndexedContent {
    at: Option<DateTime<Utc>>,
    title: String,
    summary: String,
    body: String,
    tags: String,
}

impl From<ContentItem> for IndexedContent {
    fn from(item: ContentItem) -> Self {
        Self {
            at: item.published_at,
            title: item.title.to_lowercase(),
            summary: item.summary.to_lowercase(),
            body: item.body.to_lowercase(),
            tags: item.tags.to_lowercase(),
        }
    }
}

/// Immutable snapshot of every raw signal needed for one run.
#[derive(Debug, Clone, Default)]
pub struct SignalSet {
    artists: Vec<Entity>,
    labels: Vec<Entity>,
    rosters: HashMap<i64, Vec<Entity>>,
    charts: Vec<ChartEntry>,
    charts_by_artist: HashMap<String, Vec<usize>>,
    charts_by_label: HashMap<String, Vec<usize>>,
    content: Vec<IndexedContent>,
    traffic_by_entity: HashMap<i64, Vec<TrafficHit>>,
    airplay_by_artist: HashMap<String, Vec<AirplaySpin>>,
    releases_by_entity: HashMap<i64, Vec<ReleaseRecord>>,
    videos_by_entity: HashMap<i64, Vec<VideoRecord>>,
}

impl SignalSet {
    /// Reads every feed from the store. Any read failure makes the source
    /// unavailable for the whole run.
    pub fn load(store: &dyn SignalStore, settings: &RankingSettings) -> Result<Self, RankingError> {
        let splitter = NameSplitter::new(&settings.group_names);

        let artists = store
            .get_entities(EntityType::Artist)
            .map_err(RankingError::SourceUnavailable)?;
        let labels = store
            .get_entities(EntityType::Label)
            .map_err(RankingError::SourceUnavailable)?;

        let mut rosters = HashMap::with_capacity(labels.len());
        for label in &labels {
            let roster = store
                .get_label_roster(label.id)
                .map_err(RankingError::SourceUnavailable)?;
            rosters.insert(label.id, roster);
        }

        let charts = store
            .get_chart_entries()
            .map_err(RankingError::SourceUnavailable)?;
        let mut charts_by_artist: HashMap<String, Vec<usize>> = HashMap::new();
        let mut charts_by_label: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, entry) in charts.iter().enumerate() {
            for name in splitter.split(&entry.artist_names) {
                charts_by_artist.entry(name_key(&name)).or_default().push(idx);
            }
            for name in splitter.split(&entry.label_names) {
                charts_by_label.entry(name_key(&name)).or_default().push(idx);
            }
        }

        let content: Vec<IndexedContent> = store
            .get_content_items()
            .map_err(RankingError::SourceUnavailable)?
            .into_iter()
            .map(IndexedContent::from)
            .collect();

        let mut traffic_by_entity: HashMap<i64, Vec<TrafficHit>> = HashMap::new();
        for hit in store
            .get_traffic_hits()
            .map_err(RankingError::SourceUnavailable)?
        {
            traffic_by_entity
                .entry(hit.subject_entity_id)
                .or_default()
                .push(hit);
        }

        let mut airplay_by_artist: HashMap<String, Vec<AirplaySpin>> = HashMap::new();
        let airplay = store
            .get_airplay_spins()
            .map_err(RankingError::SourceUnavailable)?;
        let airplay_count = airplay.len();
        for spin in airplay {
            for name in splitter.split(&spin.artist_name) {
                airplay_by_artist
                    .entry(name_key(&name))
                    .or_default()
                    .push(spin.clone());
            }
        }

        let mut releases_by_entity: HashMap<i64, Vec<ReleaseRecord>> = HashMap::new();
        for release in store.get_releases().map_err(RankingError::SourceUnavailable)? {
            releases_by_entity
                .entry(release.entity_id)
                .or_default()
                .push(release);
        }

        let mut videos_by_entity: HashMap<i64, Vec<VideoRecord>> = HashMap::new();
        for video in store.get_videos().map_err(RankingError::SourceUnavailable)? {
            videos_by_entity
                .entry(video.entity_id)
                .or_default()
                .push(video);
        }

        info!(
            "Loaded signals: {} artists, {} labels, {} chart entries, {} content items, {} airplay spins",
            artists.len(),
            labels.len(),
            charts.len(),
            content.len(),
            airplay_count
        );

        Ok(Self {
            artists,
            labels,
            rosters,
            charts,
            charts_by_artist,
            charts_by_label,
            content,
            traffic_by_entity,
            airplay_by_artist,
            releases_by_entity,
            videos_by_entity,
        })
    }

    pub fn entities(&self, entity_type: EntityType) -> &[Entity] {
        match entity_type {
            EntityType::Artist => &self.artists,
            EntityType::Label => &self.labels,
        }
    }

    pub fn roster(&self, label_id: i64) -> &[Entity] {
        self.rosters
            .get(&label_id)
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }

    /// Chart rows crediting the entity, by artist name for artists and by
    /// label name for labels.
    pub fn chart_entries_for(&self, entity: &Entity) -> Vec<&ChartEntry> {
        let index = match entity.entity_type {
            EntityType::Artist => &self.charts_by_artist,
            EntityType::Label => &self.charts_by_label,
        };
        index
            .get(&name_key(&entity.name))
            .map(|indices| indices.iter().map(|&i| &self.charts[i]).collect())
            .unwrap_or_default()
    }

    pub fn airplay_for(&self, entity: &Entity) -> &[AirplaySpin] {
        self.airplay_by_artist
            .get(&name_key(&entity.name))
            .map(|s| s.as_slice())
            .unwrap_or(&[])
    }

    pub fn releases_for(&self, entity_id: i64) -> &[ReleaseRecord] {
        self.releases_by_entity
            .get(&entity_id)
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }

    /// Dated, weighted contributions of one signal type to one entity.
    /// Rows without a usable date are skipped; they were already logged
    /// when the store validated them.
    pub fn extract(
        &self,
        entity: &Entity,
        signal_type: SignalType,
        settings: &RankingSettings,
        run_at: DateTime<Utc>,
    ) -> Vec<Contribution> {
        let contributions = match signal_type {
            SignalType::Chart => self.extract_chart(entity, settings),
            SignalType::Mention => self.extract_mentions(entity, settings),
            SignalType::Traffic => self.extract_traffic(entity, settings),
            SignalType::Airplay => self.extract_airplay(entity, settings),
            SignalType::Release => self.extract_releases(entity, settings, run_at),
            SignalType::Video => self.extract_videos(entity, settings),
        };
        debug!(
            "Entity {} {}: {} contributions",
            entity.id,
            signal_type,
            contributions.len()
        );
        contributions
    }

    fn extract_chart(&self, entity: &Entity, settings: &RankingSettings) -> Vec<Contribution> {
        self.chart_entries_for(entity)
            .into_iter()
            .filter_map(|entry| {
                let at = date_to_utc(entry.chart_date?);
                Some(Contribution {
                    at,
                    points: chart_points(entry, settings),
                })
            })
            .collect()
    }

    fn extract_mentions(&self, entity: &Entity, settings: &RankingSettings) -> Vec<Contribution> {
        let needle = name_key(&entity.name);
        if needle.chars().count() < MIN_MENTION_NAME_CHARS {
            return Vec::new();
        }
        let weights = &settings.weights;

        let mut contributions = Vec::new();
        for item in &self.content {
            let Some(at) = item.at else {
                continue;
            };
            let fields = [
                (&item.title, weights.mention_title),
                (&item.summary, weights.mention_summary),
                (&item.body, weights.mention_body),
                (&item.tags, weights.mention_tag),
            ];
            for (text, weight) in fields {
                if text.contains(&needle) {
                    contributions.push(Contribution { at, points: weight });
                }
            }
        }
        contributions
    }

    fn extract_traffic(&self, entity: &Entity, settings: &RankingSettings) -> Vec<Contribution> {
        self.traffic_by_entity
            .get(&entity.id)
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| {
                        Some(Contribution {
                            at: hit.timestamp?,
                            points: hit.view_count as f64
                                * settings.weights.traffic_view
                                * settings.action_weight(&hit.action_type),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn extract_airplay(&self, entity: &Entity, settings: &RankingSettings) -> Vec<Contribution> {
        self.airplay_for(entity)
            .iter()
            .filter_map(|spin| {
                Some(Contribution {
                    at: spin.timestamp?,
                    points: spin.spin_weight * settings.weights.airplay_spin,
                })
            })
            .collect()
    }

    fn extract_releases(
        &self,
        entity: &Entity,
        settings: &RankingSettings,
        run_at: DateTime<Utc>,
    ) -> Vec<Contribution> {
        self.releases_for(entity.id)
            .iter()
            .filter_map(|release| {
                let at = date_to_utc(release.release_date?);
                // Announced but not yet out
                if at > run_at {
                    return None;
                }
                Some(Contribution {
                    at,
                    points: settings.weights.release,
                })
            })
            .collect()
    }

    fn extract_videos(&self, entity: &Entity, settings: &RankingSettings) -> Vec<Contribution> {
        self.videos_by_entity
            .get(&entity.id)
            .map(|videos| {
                videos
                    .iter()
                    .filter_map(|video| {
                        Some(Contribution {
                            at: date_to_utc(video.release_date?),
                            points: video.view_count as f64 * settings.weights.video_view,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Weighted magnitude of a single chart row.
pub fn chart_points(entry: &ChartEntry, settings: &RankingSettings) -> f64 {
    let w = &settings.weights;
    entry.position as f64 * w.chart_position
        + entry.gain() as f64 * w.chart_gain
        + entry.peak_position as f64 * w.chart_peak
        + entry.weeks_on_chart as f64 * w.chart_longevity
        + entry.spins as f64 * w.chart_spins
        + entry.station_adds as f64 * w.chart_station_adds
}
