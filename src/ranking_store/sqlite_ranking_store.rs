use super::models::{
    HistoricalRankingRecord, Interval, IntervalChange, RankingRow, RankingStatus,
    SnapshotOutcome, SnapshotPhase, SnapshotRequest,
};
use super::schema::{RANKING_ROW_COLUMNS, RANKING_VERSIONED_SCHEMAS};
use super::RankingStore;
use crate::ranking::{diff_snapshots, RankPoint, RankingChange, RankingError, Trend};
use crate::signal_store::EntityType;
use crate::sqlite_persistence::open_versioned;
use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub struct SqliteRankingStore {
    conn: Arc<Mutex<Connection>>,
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn phase_error(
    phase: SnapshotPhase,
    entity_type: EntityType,
) -> impl FnOnce(anyhow::Error) -> RankingError {
    move |e| {
        RankingError::Persistence(e.context(format!(
            "{} snapshot replacement failed while {}",
            entity_type, phase
        )))
    }
}

impl SqliteRankingStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path, RANKING_VERSIONED_SCHEMAS, "ranking")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Maps the columns listed in `RANKING_ROW_COLUMNS`, in that order.
    fn row_to_ranking_row(row: &Row) -> rusqlite::Result<RankingRow> {
        let type_str: String = row.get(0)?;
        let entity_type = EntityType::parse(&type_str)
            .ok_or_else(|| conversion_error(0, format!("unknown entity type {:?}", type_str)))?;
        let entity_id: i64 = row.get(1)?;
        let components_json: String = row.get(7)?;
        let components = serde_json::from_str(&components_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;
        let trend_str: String = row.get(12)?;
        let trend = Trend::parse(&trend_str)
            .ok_or_else(|| conversion_error(12, format!("unknown trend {:?}", trend_str)))?;

        Ok(RankingRow {
            entity_type,
            entity_id,
            entity_name: row.get(2)?,
            rank: row.get(3)?,
            total_score: row.get(4)?,
            base_score: row.get(5)?,
            boost_score: row.get(6)?,
            components,
            change: RankingChange {
                entity_id,
                previous_rank: row.get(8)?,
                previous_score: row.get(9)?,
                position_change: row.get(10)?,
                score_change: row.get(11)?,
                trend,
            },
            computed_at: row.get(13)?,
        })
    }

    fn row_to_history_record(
        interval: Interval,
    ) -> impl FnMut(&Row) -> rusqlite::Result<HistoricalRankingRecord> {
        move |row| {
            Ok(HistoricalRankingRecord {
                interval,
                row: Self::row_to_ranking_row(row)?,
                snapshot_at: row.get(14)?,
            })
        }
    }

    fn read_current(conn: &Connection, entity_type: EntityType) -> Result<Vec<RankingRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM current_rankings WHERE entity_type = ?1 ORDER BY rank",
            RANKING_ROW_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![entity_type.as_str()], Self::row_to_ranking_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read current rankings")?;
        Ok(rows)
    }

    /// Copies the current rows of an entity type into an interval table.
    fn archive_current(
        conn: &Connection,
        entity_type: EntityType,
        interval: Interval,
        snapshot_at: i64,
    ) -> Result<usize> {
        let copied = conn
            .execute(
                &format!(
                    "INSERT INTO {table} ({cols}, snapshot_at)
                     SELECT {cols}, ?2 FROM current_rankings WHERE entity_type = ?1",
                    table = interval.table_name(),
                    cols = RANKING_ROW_COLUMNS
                ),
                params![entity_type.as_str(), snapshot_at],
            )
            .with_context(|| format!("Failed to archive into {}", interval.table_name()))?;
        Ok(copied)
    }

    fn insert_current(conn: &Connection, row: &RankingRow) -> Result<()> {
        let components = serde_json::to_string(&row.components)?;
        conn.execute(
            &format!(
                "INSERT INTO current_rankings ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                RANKING_ROW_COLUMNS
            ),
            params![
                row.entity_type.as_str(),
                row.entity_id,
                row.entity_name,
                row.rank,
                row.total_score,
                row.base_score,
                row.boost_score,
                components,
                row.change.previous_rank,
                row.change.previous_score,
                row.change.position_change,
                row.change.score_change,
                row.change.trend.as_str(),
                row.computed_at,
            ],
        )
        .with_context(|| format!("Failed to write ranking row for entity {}", row.entity_id))?;
        Ok(())
    }

    fn write_status(conn: &Connection, status: &RankingStatus) -> Result<()> {
        conn.execute(
            "INSERT INTO ranking_status (entity_type, last_ranked_at, entity_count, run_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(entity_type) DO UPDATE SET
                last_ranked_at = excluded.last_ranked_at,
                entity_count = excluded.entity_count,
                run_id = excluded.run_id",
            params![
                status.entity_type.as_str(),
                status.last_ranked_at,
                status.entity_count as i64,
                status.run_id,
            ],
        )
        .context("Failed to update ranking status")?;
        Ok(())
    }
}

impl RankingStore for SqliteRankingStore {
    fn current_snapshot(&self, entity_type: EntityType) -> Result<Vec<RankingRow>> {
        let conn = self.conn.lock().unwrap();
        Self::read_current(&conn, entity_type)
    }

    fn replace_snapshot(&self, request: SnapshotRequest<'_>) -> Result<SnapshotOutcome, RankingError> {
        let SnapshotRequest {
            entity_type,
            entries,
            intervals,
            run_at,
            run_id,
            deadline,
        } = request;

        if let Some(stray) = entries
            .iter()
            .find(|e| e.score.entity_type != entity_type)
        {
            return Err(RankingError::config(format!(
                "{} {} cannot be written into the {} leaderboard",
                stray.score.entity_type, stray.score.entity_id, entity_type
            )));
        }

        let snapshot_at = run_at.timestamp();
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| phase_error(SnapshotPhase::Idle, entity_type)(e.into()))?;

        // Archiving: the pre-run snapshot is the baseline for both the
        // archive copy and the change annotations.
        debug!("{} snapshot: {}", entity_type, SnapshotPhase::Archiving);
        let baseline = Self::read_current(&tx, entity_type)
            .map_err(phase_error(SnapshotPhase::Archiving, entity_type))?;
        let mut archived = Vec::new();
        if baseline.is_empty() {
            info!("No current {} snapshot, nothing to archive", entity_type);
        } else {
            for &interval in intervals {
                let copied = Self::archive_current(&tx, entity_type, interval, snapshot_at)
                    .map_err(phase_error(SnapshotPhase::Archiving, entity_type))?;
                debug!("Archived {} {} rows into {}", copied, entity_type, interval);
                archived.push((interval, copied));
            }
        }

        debug!("{} snapshot: {}", entity_type, SnapshotPhase::Clearing);
        tx.execute(
            "DELETE FROM current_rankings WHERE entity_type = ?1",
            params![entity_type.as_str()],
        )
        .map_err(|e| phase_error(SnapshotPhase::Clearing, entity_type)(e.into()))?;

        debug!("{} snapshot: {}", entity_type, SnapshotPhase::Writing);
        let previous: Vec<RankPoint> = baseline.iter().map(RankingRow::rank_point).collect();
        let current: Vec<RankPoint> = entries
            .iter()
            .map(|e| RankPoint {
                entity_id: e.score.entity_id,
                rank: e.rank,
                total_score: e.score.total_score,
            })
            .collect();
        let changes = diff_snapshots(&current, &previous);
        for (entry, change) in entries.iter().zip(changes) {
            let row = RankingRow::from_ranked(entry, change, snapshot_at);
            Self::insert_current(&tx, &row)
                .map_err(phase_error(SnapshotPhase::Writing, entity_type))?;
        }
        Self::write_status(
            &tx,
            &RankingStatus {
                entity_type,
                last_ranked_at: snapshot_at,
                entity_count: entries.len(),
                run_id,
            },
        )
        .map_err(phase_error(SnapshotPhase::Writing, entity_type))?;

        // Dropping the transaction on a timeout rolls everything back
        deadline.check()?;
        tx.commit()
            .map_err(|e| phase_error(SnapshotPhase::Writing, entity_type)(e.into()))?;

        info!(
            "Replaced {} snapshot: {} rows written, {} rows archived into {} interval(s)",
            entity_type,
            entries.len(),
            baseline.len(),
            archived.len()
        );

        Ok(SnapshotOutcome {
            entity_type,
            written: entries.len(),
            archived,
            snapshot_at,
        })
    }

    fn latest_history(
        &self,
        entity_type: EntityType,
        interval: Interval,
    ) -> Result<Vec<HistoricalRankingRecord>> {
        let conn = self.conn.lock().unwrap();
        let table = interval.table_name();
        let mut stmt = conn.prepare(&format!(
            "SELECT {cols}, snapshot_at FROM {table}
             WHERE entity_type = ?1
               AND snapshot_at = (SELECT MAX(snapshot_at) FROM {table} WHERE entity_type = ?1)
             ORDER BY rank",
            cols = RANKING_ROW_COLUMNS,
            table = table
        ))?;
        let records = stmt
            .query_map(
                params![entity_type.as_str()],
                Self::row_to_history_record(interval),
            )?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read {}", table))?;
        Ok(records)
    }

    fn entity_history(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<HistoricalRankingRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, snapshot_at FROM {}
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY snapshot_at DESC LIMIT ?3",
            RANKING_ROW_COLUMNS,
            interval.table_name()
        ))?;
        let records = stmt
            .query_map(
                params![entity_type.as_str(), entity_id, limit as i64],
                Self::row_to_history_record(interval),
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn interval_changes(
        &self,
        entity_type: EntityType,
        interval: Interval,
    ) -> Result<Vec<IntervalChange>> {
        let current = self.current_snapshot(entity_type)?;
        let previous: Vec<RankPoint> = self
            .latest_history(entity_type, interval)?
            .iter()
            .map(|record| record.row.rank_point())
            .collect();
        let points: Vec<RankPoint> = current.iter().map(RankingRow::rank_point).collect();
        let changes = diff_snapshots(&points, &previous);
        Ok(current
            .into_iter()
            .zip(changes)
            .map(|(row, change)| IntervalChange { row, change })
            .collect())
    }

    fn prune_history(&self, interval: Interval, before_timestamp: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn
            .execute(
                &format!(
                    "DELETE FROM {} WHERE snapshot_at < ?1",
                    interval.table_name()
                ),
                params![before_timestamp],
            )
            .with_context(|| format!("Failed to prune {}", interval.table_name()))?;
        Ok(deleted)
    }

    fn get_status(&self, entity_type: EntityType) -> Result<Option<RankingStatus>> {
        let conn = self.conn.lock().unwrap();
        let status = conn
            .query_row(
                "SELECT last_ranked_at, entity_count, run_id FROM ranking_status
                 WHERE entity_type = ?1",
                params![entity_type.as_str()],
                |row| {
                    Ok(RankingStatus {
                        entity_type,
                        last_ranked_at: row.get(0)?,
                        entity_count: row.get::<_, i64>(1)? as usize,
                        run_id: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(status)
    }
}
