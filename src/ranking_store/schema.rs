//! Layout of the rankings database: the current leaderboard, one history
//! table per interval, and the per-entity-type status marker.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

/// A leaderboard table: the shared ranking row columns followed by `extra`.
macro_rules! ranking_table {
    ($name:expr, [$($extra:expr),* $(,)?], indices = $indices:expr, unique = $unique:expr) => {
        Table {
            name: $name,
            columns: &[
                sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
                sqlite_column!("entity_type", &SqlType::Text, non_null = true),
                sqlite_column!("entity_id", &SqlType::Integer, non_null = true),
                sqlite_column!("entity_name", &SqlType::Text, non_null = true),
                sqlite_column!("rank", &SqlType::Integer, non_null = true),
                sqlite_column!("total_score", &SqlType::Real, non_null = true),
                sqlite_column!("base_score", &SqlType::Real, non_null = true),
                sqlite_column!("boost_score", &SqlType::Real, non_null = true),
                // JSON object of named component values
                sqlite_column!("components", &SqlType::Text, non_null = true),
                sqlite_column!("previous_rank", &SqlType::Integer),
                sqlite_column!("previous_score", &SqlType::Real),
                sqlite_column!("position_change", &SqlType::Integer),
                sqlite_column!("score_change", &SqlType::Real),
                sqlite_column!("trend", &SqlType::Text, non_null = true),
                sqlite_column!("computed_at", &SqlType::Integer, non_null = true),
                $($extra),*
            ],
            indices: $indices,
            unique_constraints: $unique,
        }
    };
}

/// Columns copied from the current table into a history table, in order.
pub const RANKING_ROW_COLUMNS: &str = "entity_type, entity_id, entity_name, rank, total_score, \
    base_score, boost_score, components, previous_rank, previous_score, position_change, \
    score_change, trend, computed_at";

const CURRENT_RANKINGS_TABLE_V1: Table = ranking_table!(
    "current_rankings",
    [],
    indices = &[("idx_current_rankings_type_rank", "entity_type, rank")],
    unique = &[&["entity_type", "entity_id"]]
);

const HISTORY_DAILY_TABLE_V1: Table = ranking_table!(
    "ranking_history_daily",
    [sqlite_column!("snapshot_at", &SqlType::Integer, non_null = true)],
    indices = &[
        ("idx_history_daily_type_snapshot", "entity_type, snapshot_at"),
        ("idx_history_daily_entity", "entity_id"),
    ],
    unique = &[]
);

const HISTORY_WEEKLY_TABLE_V1: Table = ranking_table!(
    "ranking_history_weekly",
    [sqlite_column!("snapshot_at", &SqlType::Integer, non_null = true)],
    indices = &[
        ("idx_history_weekly_type_snapshot", "entity_type, snapshot_at"),
        ("idx_history_weekly_entity", "entity_id"),
    ],
    unique = &[]
);

const HISTORY_MONTHLY_TABLE_V1: Table = ranking_table!(
    "ranking_history_monthly",
    [sqlite_column!("snapshot_at", &SqlType::Integer, non_null = true)],
    indices = &[
        ("idx_history_monthly_type_snapshot", "entity_type, snapshot_at"),
        ("idx_history_monthly_entity", "entity_id"),
    ],
    unique = &[]
);

const HISTORY_YEARLY_TABLE_V1: Table = ranking_table!(
    "ranking_history_yearly",
    [sqlite_column!("snapshot_at", &SqlType::Integer, non_null = true)],
    indices = &[
        ("idx_history_yearly_type_snapshot", "entity_type, snapshot_at"),
        ("idx_history_yearly_entity", "entity_id"),
    ],
    unique = &[]
);

const RANKING_STATUS_TABLE_V1: Table = Table {
    name: "ranking_status",
    columns: &[
        sqlite_column!("entity_type", &SqlType::Text, is_primary_key = true),
        sqlite_column!("last_ranked_at", &SqlType::Integer, non_null = true),
        sqlite_column!("entity_count", &SqlType::Integer, non_null = true),
        sqlite_column!("run_id", &SqlType::Integer),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const RANKING_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        CURRENT_RANKINGS_TABLE_V1,
        HISTORY_DAILY_TABLE_V1,
        HISTORY_WEEKLY_TABLE_V1,
        HISTORY_MONTHLY_TABLE_V1,
        HISTORY_YEARLY_TABLE_V1,
        RANKING_STATUS_TABLE_V1,
    ],
    migration: None,
}];
