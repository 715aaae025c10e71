//! Rank and score movement between two snapshots.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Steady,
    New,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Steady => "steady",
            Trend::New => "new",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Trend::Up),
            "down" => Some(Trend::Down),
            "steady" => Some(Trend::Steady),
            "new" => Some(Trend::New),
            _ => None,
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The minimal view of a ranking row needed to compare snapshots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankPoint {
    pub entity_id: i64,
    pub rank: u32,
    pub total_score: f64,
}

/// Movement of one entity against a previous snapshot. The `previous_*` and
/// `*_change` fields are `None` for entities new to the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingChange {
    pub entity_id: i64,
    pub previous_rank: Option<u32>,
    pub previous_score: Option<f64>,
    /// Positive when the entity climbed.
    pub position_change: Option<i64>,
    pub score_change: Option<f64>,
    pub trend: Trend,
}

impl RankingChange {
    pub fn new_entry(entity_id: i64) -> Self {
        Self {
            entity_id,
            previous_rank: None,
            previous_score: None,
            position_change: None,
            score_change: None,
            trend: Trend::New,
        }
    }

    pub fn between(current: RankPoint, previous: Option<RankPoint>) -> Self {
        let Some(previous) = previous else {
            return Self::new_entry(current.entity_id);
        };
        let position_change = previous.rank as i64 - current.rank as i64;
        let trend = match position_change {
            c if c > 0 => Trend::Up,
            c if c < 0 => Trend::Down,
            _ => Trend::Steady,
        };
        Self {
            entity_id: current.entity_id,
            previous_rank: Some(previous.rank),
            previous_score: Some(previous.total_score),
            position_change: Some(position_change),
            score_change: Some(current.total_score - previous.total_score),
            trend,
        }
    }
}

/// Changes for every current row, in the order given.
pub fn diff_snapshots(current: &[RankPoint], previous: &[RankPoint]) -> Vec<RankingChange> {
    let by_id: HashMap<i64, RankPoint> = previous.iter().map(|p| (p.entity_id, *p)).collect();
    current
        .iter()
        .map(|point| RankingChange::between(*point, by_id.get(&point.entity_id).copied()))
        .collect()
}
