use crate::ranking::{Deadline, RankPoint, RankedEntry, RankingChange};
use crate::signal_store::EntityType;
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// History retention granularity. Each interval has its own history table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Interval {
    pub const ALL: [Interval; 4] = [
        Interval::Daily,
        Interval::Weekly,
        Interval::Monthly,
        Interval::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "daily",
            Interval::Weekly => "weekly",
            Interval::Monthly => "monthly",
            Interval::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Interval::Daily),
            "weekly" => Some(Interval::Weekly),
            "monthly" => Some(Interval::Monthly),
            "yearly" => Some(Interval::Yearly),
            _ => None,
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            Interval::Daily => "ranking_history_daily",
            Interval::Weekly => "ranking_history_weekly",
            Interval::Monthly => "ranking_history_monthly",
            Interval::Yearly => "ranking_history_yearly",
        }
    }

    /// Whether a run on `date` (UTC) starts a new period of this interval.
    pub fn is_due(&self, date: NaiveDate) -> bool {
        match self {
            Interval::Daily => true,
            Interval::Weekly => date.weekday() == Weekday::Mon,
            Interval::Monthly => date.day() == 1,
            Interval::Yearly => date.ordinal() == 1,
        }
    }

    /// Intervals whose history gets a copy of the snapshot on `date`.
    pub fn due_on(date: NaiveDate) -> Vec<Interval> {
        Interval::ALL
            .into_iter()
            .filter(|interval| interval.is_due(date))
            .collect()
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row of the current leaderboard, annotated with its movement against
/// the snapshot it replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRow {
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub entity_name: String,
    pub rank: u32,
    pub total_score: f64,
    pub base_score: f64,
    pub boost_score: f64,
    pub components: BTreeMap<String, f64>,
    pub change: RankingChange,
    /// Unix timestamp of the run that computed this row.
    pub computed_at: i64,
}

impl RankingRow {
    pub fn from_ranked(entry: &RankedEntry, change: RankingChange, computed_at: i64) -> Self {
        Self {
            entity_type: entry.score.entity_type,
            entity_id: entry.score.entity_id,
            entity_name: entry.score.entity_name.clone(),
            rank: entry.rank,
            total_score: entry.score.total_score,
            base_score: entry.score.base_score,
            boost_score: entry.score.boost_score,
            components: entry.score.components.clone(),
            change,
            computed_at,
        }
    }

    pub fn rank_point(&self) -> RankPoint {
        RankPoint {
            entity_id: self.entity_id,
            rank: self.rank,
            total_score: self.total_score,
        }
    }
}

/// Archived copy of a [`RankingRow`]. Never updated; only pruned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRankingRecord {
    pub interval: Interval,
    /// Unix timestamp of the run that archived the row.
    pub snapshot_at: i64,
    pub row: RankingRow,
}

/// A current row compared against the latest archive of one interval.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalChange {
    pub row: RankingRow,
    pub change: RankingChange,
}

/// "Last successfully ranked at" marker for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingStatus {
    pub entity_type: EntityType,
    pub last_ranked_at: i64,
    pub entity_count: usize,
    pub run_id: Option<i64>,
}

/// Steps of a snapshot replacement, in order. A failure is reported with the
/// step it happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPhase {
    Idle,
    Archiving,
    Clearing,
    Writing,
}

impl std::fmt::Display for SnapshotPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotPhase::Idle => write!(f, "idle"),
            SnapshotPhase::Archiving => write!(f, "archiving"),
            SnapshotPhase::Clearing => write!(f, "clearing"),
            SnapshotPhase::Writing => write!(f, "writing"),
        }
    }
}

/// Everything one snapshot replacement needs.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotRequest<'a> {
    pub entity_type: EntityType,
    pub entries: &'a [RankedEntry],
    /// History intervals that receive the outgoing snapshot.
    pub intervals: &'a [Interval],
    pub run_at: DateTime<Utc>,
    pub run_id: Option<i64>,
    pub deadline: &'a Deadline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotOutcome {
    pub entity_type: EntityType,
    pub written: usize,
    /// Rows copied per interval. Empty when there was no previous snapshot.
    pub archived: Vec<(Interval, usize)>,
    pub snapshot_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_interval_gating() {
        // Tuesday
        assert_eq!(Interval::due_on(date("2024-06-04")), vec![Interval::Daily]);
        // Monday
        assert_eq!(
            Interval::due_on(date("2024-06-03")),
            vec![Interval::Daily, Interval::Weekly]
        );
        // Saturday, first of the month
        assert_eq!(
            Interval::due_on(date("2024-06-01")),
            vec![Interval::Daily, Interval::Monthly]
        );
        // Monday, January 1st
        assert_eq!(Interval::due_on(date("2024-01-01")), Interval::ALL.to_vec());
    }

    #[test]
    fn test_interval_parse() {
        assert_eq!(Interval::parse(" Weekly "), Some(Interval::Weekly));
        assert_eq!(Interval::parse("hourly"), None);
        for interval in Interval::ALL {
            assert_eq!(Interval::parse(interval.as_str()), Some(interval));
            assert!(interval.table_name().ends_with(interval.as_str()));
        }
    }
}
