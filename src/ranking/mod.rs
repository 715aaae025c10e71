//! Composite ranking of artists and labels.
//!
//! Raw signals are turned into dated contributions ([`signals`]), split into
//! active and historic buckets ([`recency`]), summed and boosted
//! ([`scorer`], [`boosts`]) and finally ordered into a Top-N leaderboard
//! ([`assembler`]). [`pipeline`] ties the stages together for one entity
//! type; [`changes`] compares a leaderboard against an earlier one.

pub mod assembler;
pub mod boosts;
pub mod changes;
mod error;
pub mod names;
pub mod pipeline;
pub mod recency;
pub mod scorer;
pub mod signals;

pub use assembler::{assemble, RankedEntry};
pub use changes::{diff_snapshots, RankPoint, RankingChange, Trend};
pub use error::RankingError;
pub use names::{split_names, NameSplitter};
pub use pipeline::{rank_entities, Deadline};
pub use recency::{Bucket, ScoreComponent};
pub use scorer::{score_entity, CompositeScore};
pub use signals::{Contribution, SignalSet, SignalType};
