//! Signal database fixtures.
//!
//! The signal database is read-only for the ranking code, so fixtures write
//! rows with plain SQL after the schema has been created.

use super::constants::*;
use anyhow::Result;
use hitrank::signal_store::SqliteSignalStore;
use rusqlite::{params, Connection};
use std::path::Path;

pub struct SignalFixture {
    conn: Connection,
    next_id: i64,
}

#[allow(dead_code)]
impl SignalFixture {
    /// Creates an empty signal database at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        // Creates the schema
        drop(SqliteSignalStore::open_or_create(path)?);
        Ok(Self {
            conn: Connection::open(path)?,
            next_id: 1000,
        })
    }

    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn label(&mut self, id: i64, name: &str) -> Result<&mut Self> {
        self.conn.execute(
            "INSERT INTO entities (id, name, entity_type, label_id) VALUES (?1, ?2, 'label', NULL)",
            params![id, name],
        )?;
        Ok(self)
    }

    pub fn artist(&mut self, id: i64, name: &str, label_id: Option<i64>) -> Result<&mut Self> {
        self.conn.execute(
            "INSERT INTO entities (id, name, entity_type, label_id) VALUES (?1, ?2, 'artist', ?3)",
            params![id, name, label_id],
        )?;
        Ok(self)
    }

    /// A chart row; `chart_date` is `YYYY-MM-DD`.
    #[allow(clippy::too_many_arguments)]
    pub fn chart(
        &mut self,
        artist_names: &str,
        label_names: &str,
        position: i64,
        prior_position: Option<i64>,
        peak_position: i64,
        weeks_on_chart: i64,
        chart_date: &str,
    ) -> Result<&mut Self> {
        let id = self.id();
        self.conn.execute(
            "INSERT INTO chart_entries (id, artist_names, label_names, position, prior_position,
                                        peak_position, weeks_on_chart, spins, station_adds, chart_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, ?8)",
            params![
                id,
                artist_names,
                label_names,
                position,
                prior_position,
                peak_position,
                weeks_on_chart,
                chart_date
            ],
        )?;
        Ok(self)
    }

    pub fn release(&mut self, entity_id: i64, release_date: &str) -> Result<&mut Self> {
        let id = self.id();
        self.conn.execute(
            "INSERT INTO releases (id, entity_id, release_date) VALUES (?1, ?2, ?3)",
            params![id, entity_id, release_date],
        )?;
        Ok(self)
    }

    pub fn mention(&mut self, title: &str, body: &str, published_at: i64) -> Result<&mut Self> {
        let id = self.id();
        self.conn.execute(
            "INSERT INTO content_items (id, title, summary, body, tags, published_at)
             VALUES (?1, ?2, '', ?3, '', ?4)",
            params![id, title, body, published_at],
        )?;
        Ok(self)
    }

    pub fn raw(&mut self, sql: &str) -> Result<&mut Self> {
        self.conn.execute_batch(sql)?;
        Ok(self)
    }
}

/// Two labels and four artists:
///
/// * Artist A: one chart entry worth exactly 27 points (10 + 5 + 8 + 4).
/// * Marlow Vance: two recent releases (2 × 25 points).
/// * Sable Reyes: one recent release (25 points).
/// * Nobody Yet: no signals.
pub fn seed_default(path: &Path) -> Result<SignalFixture> {
    let mut fixture = SignalFixture::create(path)?;
    fixture
        .label(LABEL_1_ID, LABEL_1_NAME)?
        .label(LABEL_2_ID, LABEL_2_NAME)?
        .artist(ARTIST_1_ID, ARTIST_1_NAME, None)?
        .artist(ARTIST_2_ID, ARTIST_2_NAME, Some(LABEL_2_ID))?
        .artist(ARTIST_3_ID, ARTIST_3_NAME, Some(LABEL_2_ID))?
        .artist(ARTIST_4_ID, ARTIST_4_NAME, None)?
        .chart(ARTIST_1_NAME, "", 10, Some(15), 8, 4, "2024-05-27")?
        .release(ARTIST_2_ID, "2024-05-01")?
        .release(ARTIST_2_ID, "2024-05-15")?
        .release(ARTIST_3_ID, "2024-05-20")?;
    Ok(fixture)
}
