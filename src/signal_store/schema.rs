//! Layout of the signal database.
//!
//! The ingestion pipeline owns this database. The definitions are kept here so
//! local setups and tests can create a compatible file; at runtime the ranking
//! job opens it read-only and never migrates it. Magnitude columns are left
//! nullable on purpose: the store tolerates partially filled rows.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const ENTITIES_TABLE_V1: Table = Table {
    name: "entities",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("entity_type", &SqlType::Text, non_null = true),
        sqlite_column!("label_id", &SqlType::Integer),
    ],
    indices: &[
        ("idx_entities_type", "entity_type"),
        ("idx_entities_label", "label_id"),
        ("idx_entities_name_nocase", "name COLLATE NOCASE"),
    ],
    unique_constraints: &[],
};

const CHART_ENTRIES_TABLE_V1: Table = Table {
    name: "chart_entries",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("artist_names", &SqlType::Text),
        sqlite_column!("label_names", &SqlType::Text),
        sqlite_column!("position", &SqlType::Integer),
        sqlite_column!("prior_position", &SqlType::Integer),
        sqlite_column!("peak_position", &SqlType::Integer),
        sqlite_column!("weeks_on_chart", &SqlType::Integer),
        sqlite_column!("spins", &SqlType::Integer),
        sqlite_column!("station_adds", &SqlType::Integer),
        sqlite_column!("chart_date", &SqlType::Text),
    ],
    indices: &[("idx_chart_entries_date", "chart_date")],
    unique_constraints: &[],
};

const CONTENT_ITEMS_TABLE_V1: Table = Table {
    name: "content_items",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("summary", &SqlType::Text),
        sqlite_column!("body", &SqlType::Text),
        sqlite_column!("tags", &SqlType::Text),
        sqlite_column!("published_at", &SqlType::Integer),
    ],
    indices: &[("idx_content_items_published", "published_at")],
    unique_constraints: &[],
};

const TRAFFIC_HITS_TABLE_V1: Table = Table {
    name: "traffic_hits",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("action_type", &SqlType::Text),
        sqlite_column!("subject_entity_id", &SqlType::Integer),
        sqlite_column!("view_count", &SqlType::Integer),
        sqlite_column!("timestamp", &SqlType::Integer),
    ],
    indices: &[("idx_traffic_hits_subject", "subject_entity_id")],
    unique_constraints: &[],
};

const AIRPLAY_SPINS_TABLE_V1: Table = Table {
    name: "airplay_spins",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("artist_name", &SqlType::Text),
        sqlite_column!("spin_weight", &SqlType::Real),
        sqlite_column!("timestamp", &SqlType::Integer),
        sqlite_column!(
            "approved",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[("idx_airplay_spins_approved", "approved")],
    unique_constraints: &[],
};

const RELEASES_TABLE_V1: Table = Table {
    name: "releases",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("entity_id", &SqlType::Integer),
        sqlite_column!("release_date", &SqlType::Text),
    ],
    indices: &[("idx_releases_entity", "entity_id")],
    unique_constraints: &[],
};

const VIDEOS_TABLE_V1: Table = Table {
    name: "videos",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("entity_id", &SqlType::Integer),
        sqlite_column!("view_count", &SqlType::Integer),
        sqlite_column!("release_date", &SqlType::Text),
    ],
    indices: &[("idx_videos_entity", "entity_id")],
    unique_constraints: &[],
};

pub const SIGNAL_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        ENTITIES_TABLE_V1,
        CHART_ENTRIES_TABLE_V1,
        CONTENT_ITEMS_TABLE_V1,
        TRAFFIC_HITS_TABLE_V1,
        AIRPLAY_SPINS_TABLE_V1,
        RELEASES_TABLE_V1,
        VIDEOS_TABLE_V1,
    ],
    migration: None,
}];
