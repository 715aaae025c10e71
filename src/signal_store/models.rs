//! Typed records for every raw signal source.
//!
//! Rows coming out of the external stores are loosely typed. Each source has a
//! `Raw*` row type holding whatever the store returned and a `validate` step
//! that applies the defaulting rules once: malformed or missing magnitudes
//! become zero, unparseable dates become `None` (which zeroes the whole
//! contribution downstream). Every defaulted field is logged.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Artist,
    Label,
}

impl EntityType {
    pub const ALL: [EntityType; 2] = [EntityType::Artist, EntityType::Label];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Artist => "artist",
            EntityType::Label => "label",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "artist" => Some(EntityType::Artist),
            "label" => Some(EntityType::Label),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An artist or label from the external directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    pub entity_type: EntityType,
    /// Parent label, only meaningful for artists.
    pub label_id: Option<i64>,
}

/// One row of the external trade chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartEntry {
    pub id: i64,
    pub artist_names: String,
    pub label_names: String,
    pub position: u32,
    /// `None` for new entries.
    pub prior_position: Option<u32>,
    pub peak_position: u32,
    pub weeks_on_chart: u32,
    pub spins: u64,
    pub station_adds: u32,
    pub chart_date: Option<NaiveDate>,
}

impl ChartEntry {
    /// Positions climbed since the prior period, zero when the entry fell or is new.
    pub fn gain(&self) -> u32 {
        match self.prior_position {
            Some(prior) if prior > self.position && self.position > 0 => prior - self.position,
            _ => 0,
        }
    }
}

/// A piece of published content that may mention entities.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub body: String,
    pub tags: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrafficHit {
    pub id: i64,
    pub action_type: String,
    pub subject_entity_id: i64,
    pub view_count: u64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Only approved airplay rows are ever surfaced by a `SignalStore`.
#[derive(Debug, Clone, PartialEq)]
pub struct AirplaySpin {
    pub id: i64,
    pub artist_name: String,
    pub spin_weight: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRecord {
    pub id: i64,
    pub entity_id: i64,
    pub release_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoRecord {
    pub id: i64,
    pub entity_id: i64,
    pub view_count: u64,
    pub release_date: Option<NaiveDate>,
}

// =============================================================================
// Raw rows and boundary validation
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct RawChartRow {
    pub id: i64,
    pub artist_names: Option<String>,
    pub label_names: Option<String>,
    pub position: Option<i64>,
    pub prior_position: Option<i64>,
    pub peak_position: Option<i64>,
    pub weeks_on_chart: Option<i64>,
    pub spins: Option<i64>,
    pub station_adds: Option<i64>,
    pub chart_date: Option<String>,
}

impl RawChartRow {
    pub fn validate(self) -> ChartEntry {
        let source = "chart_entries";
        ChartEntry {
            id: self.id,
            artist_names: self.artist_names.unwrap_or_default(),
            label_names: self.label_names.unwrap_or_default(),
            position: non_negative_u32(source, self.id, "position", self.position),
            prior_position: self
                .prior_position
                .filter(|p| *p > 0)
                .and_then(|p| u32::try_from(p).ok()),
            peak_position: non_negative_u32(source, self.id, "peak_position", self.peak_position),
            weeks_on_chart: non_negative_u32(
                source,
                self.id,
                "weeks_on_chart",
                self.weeks_on_chart,
            ),
            spins: non_negative_u64(source, self.id, "spins", self.spins),
            station_adds: non_negative_u32(source, self.id, "station_adds", self.station_adds),
            chart_date: parse_date(source, self.id, "chart_date", self.chart_date.as_deref()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawContentRow {
    pub id: i64,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub tags: Option<String>,
    pub published_at: Option<i64>,
}

impl RawContentRow {
    pub fn validate(self) -> ContentItem {
        ContentItem {
            id: self.id,
            title: self.title.unwrap_or_default(),
            summary: self.summary.unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
            published_at: parse_timestamp("content_items", self.id, self.published_at),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawTrafficRow {
    pub id: i64,
    pub action_type: Option<String>,
    pub subject_entity_id: Option<i64>,
    pub view_count: Option<i64>,
    pub timestamp: Option<i64>,
}

impl RawTrafficRow {
    /// Rows without a subject cannot be attributed and are dropped.
    pub fn validate(self) -> Option<TrafficHit> {
        let source = "traffic_hits";
        let Some(subject_entity_id) = self.subject_entity_id else {
            warn!("{} row {}: missing subject entity, skipping", source, self.id);
            return None;
        };
        Some(TrafficHit {
            id: self.id,
            action_type: self
                .action_type
                .map(|a| a.trim().to_ascii_lowercase())
                .unwrap_or_default(),
            subject_entity_id,
            view_count: non_negative_u64(source, self.id, "view_count", self.view_count),
            timestamp: parse_timestamp(source, self.id, self.timestamp),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawAirplayRow {
    pub id: i64,
    pub artist_name: Option<String>,
    pub spin_weight: Option<f64>,
    pub timestamp: Option<i64>,
    pub approved: Option<i64>,
}

impl RawAirplayRow {
    /// Returns `None` for unapproved rows.
    pub fn validate(self) -> Option<AirplaySpin> {
        if self.approved.unwrap_or(0) == 0 {
            return None;
        }
        let spin_weight = match self.spin_weight {
            Some(w) if w.is_finite() && w >= 0.0 => w,
            other => {
                warn!(
                    "airplay_spins row {}: invalid spin_weight {:?}, defaulting to 0",
                    self.id, other
                );
                0.0
            }
        };
        Some(AirplaySpin {
            id: self.id,
            artist_name: self.artist_name.unwrap_or_default(),
            spin_weight,
            timestamp: parse_timestamp("airplay_spins", self.id, self.timestamp),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawReleaseRow {
    pub id: i64,
    pub entity_id: Option<i64>,
    pub release_date: Option<String>,
}

impl RawReleaseRow {
    pub fn validate(self) -> Option<ReleaseRecord> {
        let Some(entity_id) = self.entity_id else {
            warn!("releases row {}: missing entity, skipping", self.id);
            return None;
        };
        Some(ReleaseRecord {
            id: self.id,
            entity_id,
            release_date: parse_date(
                "releases",
                self.id,
                "release_date",
                self.release_date.as_deref(),
            ),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawVideoRow {
    pub id: i64,
    pub entity_id: Option<i64>,
    pub view_count: Option<i64>,
    pub release_date: Option<String>,
}

impl RawVideoRow {
    pub fn validate(self) -> Option<VideoRecord> {
        let source = "videos";
        let Some(entity_id) = self.entity_id else {
            warn!("{} row {}: missing entity, skipping", source, self.id);
            return None;
        };
        Some(VideoRecord {
            id: self.id,
            entity_id,
            view_count: non_negative_u64(source, self.id, "view_count", self.view_count),
            release_date: parse_date(
                source,
                self.id,
                "release_date",
                self.release_date.as_deref(),
            ),
        })
    }
}

fn non_negative_u64(source: &str, row_id: i64, field: &str, value: Option<i64>) -> u64 {
    match value {
        Some(v) if v >= 0 => v as u64,
        other => {
            warn!(
                "{} row {}: invalid {} {:?}, defaulting to 0",
                source, row_id, field, other
            );
            0
        }
    }
}

fn non_negative_u32(source: &str, row_id: i64, field: &str, value: Option<i64>) -> u32 {
    match value.map(u32::try_from) {
        Some(Ok(v)) => v,
        _ => {
            warn!(
                "{} row {}: invalid {} {:?}, defaulting to 0",
                source, row_id, field, value
            );
            0
        }
    }
}

fn parse_date(source: &str, row_id: i64, field: &str, value: Option<&str>) -> Option<NaiveDate> {
    let raw = value.map(str::trim).filter(|s| !s.is_empty());
    let parsed = raw.and_then(|s| {
        // Tolerate full timestamps by only looking at the date prefix
        let date_part = s.get(..10).unwrap_or(s);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    });
    if parsed.is_none() {
        warn!(
            "{} row {}: unparseable {} {:?}, contribution zeroed",
            source, row_id, field, raw
        );
    }
    parsed
}

fn parse_timestamp(source: &str, row_id: i64, value: Option<i64>) -> Option<DateTime<Utc>> {
    let parsed = value
        .filter(|ts| *ts >= 0)
        .and_then(|ts| DateTime::from_timestamp(ts, 0));
    if parsed.is_none() {
        warn!(
            "{} row {}: invalid timestamp {:?}, contribution zeroed",
            source, row_id, value
        );
    }
    parsed
}
