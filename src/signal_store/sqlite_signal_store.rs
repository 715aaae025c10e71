use super::models::{
    AirplaySpin, ChartEntry, ContentItem, Entity, EntityType, RawAirplayRow, RawChartRow,
    RawContentRow, RawReleaseRow, RawTrafficRow, RawVideoRow, ReleaseRecord, TrafficHit,
    VideoRecord,
};
use super::schema::SIGNAL_VERSIONED_SCHEMAS;
use super::{fold_name, SignalStore};
use crate::sqlite_persistence::{open_read_only, open_versioned};
use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub struct SqliteSignalStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSignalStore {
    /// Open an existing signal database without write access.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_read_only(db_path, "signal")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open the signal database read-write, creating it when missing.
    ///
    /// Meant for local setups and fixtures; the ranking job uses [`Self::open`].
    pub fn open_or_create<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path, SIGNAL_VERSIONED_SCHEMAS, "signal")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_entity(row: &Row) -> rusqlite::Result<Option<Entity>> {
        let id: i64 = row.get("id")?;
        let type_str: String = row.get("entity_type")?;
        let Some(entity_type) = EntityType::parse(&type_str) else {
            warn!("entities row {}: unknown entity_type {:?}, skipping", id, type_str);
            return Ok(None);
        };
        Ok(Some(Entity {
            id,
            name: row.get("name")?,
            entity_type,
            label_id: lenient_i64(row.get_ref("label_id")?),
        }))
    }

    fn query_entities<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Entity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let entities = stmt
            .query_map(params, Self::row_to_entity)?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        Ok(entities)
    }

    fn query_rows<T, F>(&self, table: &str, sql: &str, map: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([], map)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read {}", table))?;
        debug!("Loaded {} rows from {}", rows.len(), table);
        Ok(rows)
    }
}

/// SQLite columns are dynamically typed; accept integers, reals and numeric text.
fn lenient_i64(value: ValueRef) -> Option<i64> {
    match value {
        ValueRef::Integer(i) => Some(i),
        ValueRef::Real(f) if f.is_finite() => Some(f as i64),
        ValueRef::Text(t) => std::str::from_utf8(t).ok()?.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_f64(value: ValueRef) -> Option<f64> {
    match value {
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) => Some(f),
        ValueRef::Text(t) => std::str::from_utf8(t).ok()?.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_text(value: ValueRef) -> Option<String> {
    match value {
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        _ => None,
    }
}

impl SignalStore for SqliteSignalStore {
    fn get_entity(&self, id: i64) -> Result<Option<Entity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, name, entity_type, label_id FROM entities WHERE id = ?1")?;
        let entity = stmt
            .query_row(params![id], Self::row_to_entity)
            .optional()?
            .flatten();
        Ok(entity)
    }

    fn find_entity_by_name(&self, name: &str, entity_type: EntityType) -> Result<Option<Entity>> {
        // NOCASE only folds ASCII, so compare in Rust
        let needle = fold_name(name);
        Ok(self
            .get_entities(entity_type)?
            .into_iter()
            .find(|e| fold_name(&e.name) == needle))
    }

    fn get_entities(&self, entity_type: EntityType) -> Result<Vec<Entity>> {
        self.query_entities(
            "SELECT id, name, entity_type, label_id FROM entities
             WHERE entity_type = ?1 ORDER BY id ASC",
            params![entity_type.as_str()],
        )
    }

    fn get_label_roster(&self, label_id: i64) -> Result<Vec<Entity>> {
        self.query_entities(
            "SELECT id, name, entity_type, label_id FROM entities
             WHERE label_id = ?1 AND entity_type = ?2 ORDER BY id ASC",
            params![label_id, EntityType::Artist.as_str()],
        )
    }

    fn get_chart_entries(&self) -> Result<Vec<ChartEntry>> {
        let rows = self.query_rows(
            "chart_entries",
            "SELECT id, artist_names, label_names, position, prior_position, peak_position,
                    weeks_on_chart, spins, station_adds, chart_date
             FROM chart_entries ORDER BY id ASC",
            |row| {
                Ok(RawChartRow {
                    id: row.get("id")?,
                    artist_names: lenient_text(row.get_ref("artist_names")?),
                    label_names: lenient_text(row.get_ref("label_names")?),
                    position: lenient_i64(row.get_ref("position")?),
                    prior_position: lenient_i64(row.get_ref("prior_position")?),
                    peak_position: lenient_i64(row.get_ref("peak_position")?),
                    weeks_on_chart: lenient_i64(row.get_ref("weeks_on_chart")?),
                    spins: lenient_i64(row.get_ref("spins")?),
                    station_adds: lenient_i64(row.get_ref("station_adds")?),
                    chart_date: lenient_text(row.get_ref("chart_date")?),
                })
            },
        )?;
        Ok(rows.into_iter().map(RawChartRow::validate).collect())
    }

    fn get_content_items(&self) -> Result<Vec<ContentItem>> {
        let rows = self.query_rows(
            "content_items",
            "SELECT id, title, summary, body, tags, published_at
             FROM content_items ORDER BY id ASC",
            |row| {
                Ok(RawContentRow {
                    id: row.get("id")?,
                    title: lenient_text(row.get_ref("title")?),
                    summary: lenient_text(row.get_ref("summary")?),
                    body: lenient_text(row.get_ref("body")?),
                    tags: lenient_text(row.get_ref("tags")?),
                    published_at: lenient_i64(row.get_ref("published_at")?),
                })
            },
        )?;
        Ok(rows.into_iter().map(RawContentRow::validate).collect())
    }

    fn get_traffic_hits(&self) -> Result<Vec<TrafficHit>> {
        let rows = self.query_rows(
            "traffic_hits",
            "SELECT id, action_type, subject_entity_id, view_count, timestamp
             FROM traffic_hits ORDER BY id ASC",
            |row| {
                Ok(RawTrafficRow {
                    id: row.get("id")?,
                    action_type: lenient_text(row.get_ref("action_type")?),
                    subject_entity_id: lenient_i64(row.get_ref("subject_entity_id")?),
                    view_count: lenient_i64(row.get_ref("view_count")?),
                    timestamp: lenient_i64(row.get_ref("timestamp")?),
                })
            },
        )?;
        Ok(rows.into_iter().filter_map(RawTrafficRow::validate).collect())
    }

    fn get_airplay_spins(&self) -> Result<Vec<AirplaySpin>> {
        let rows = self.query_rows(
            "airplay_spins",
            "SELECT id, artist_name, spin_weight, timestamp, approved
             FROM airplay_spins WHERE approved != 0 ORDER BY id ASC",
            |row| {
                Ok(RawAirplayRow {
                    id: row.get("id")?,
                    artist_name: lenient_text(row.get_ref("artist_name")?),
                    spin_weight: lenient_f64(row.get_ref("spin_weight")?),
                    timestamp: lenient_i64(row.get_ref("timestamp")?),
                    approved: lenient_i64(row.get_ref("approved")?),
                })
            },
        )?;
        Ok(rows.into_iter().filter_map(RawAirplayRow::validate).collect())
    }

    fn get_releases(&self) -> Result<Vec<ReleaseRecord>> {
        let rows = self.query_rows(
            "releases",
            "SELECT id, entity_id, release_date FROM releases ORDER BY id ASC",
            |row| {
                Ok(RawReleaseRow {
                    id: row.get("id")?,
                    entity_id: lenient_i64(row.get_ref("entity_id")?),
                    release_date: lenient_text(row.get_ref("release_date")?),
                })
            },
        )?;
        Ok(rows.into_iter().filter_map(RawReleaseRow::validate).collect())
    }

    fn get_videos(&self) -> Result<Vec<VideoRecord>> {
        let rows = self.query_rows(
            "videos",
            "SELECT id, entity_id, view_count, release_date FROM videos ORDER BY id ASC",
            |row| {
                Ok(RawVideoRow {
                    id: row.get("id")?,
                    entity_id: lenient_i64(row.get_ref("entity_id")?),
                    view_count: lenient_i64(row.get_ref("view_count")?),
                    release_date: lenient_text(row.get_ref("release_date")?),
                })
            },
        )?;
        Ok(rows.into_iter().filter_map(RawVideoRow::validate).collect())
    }
}
