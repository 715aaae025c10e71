//! Hitrank
//!
//! Ranks music artists and labels from chart, press, traffic, airplay,
//! release and video signals, and keeps a history of the leaderboards.

pub mod background_jobs;
pub mod config;
pub mod ranking;
pub mod ranking_store;
pub mod server_store;
pub mod signal_store;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use ranking_store::{RankingStore, SqliteRankingStore};
pub use server_store::{ServerStore, SqliteServerStore};
pub use signal_store::{SignalStore, SqliteSignalStore};
