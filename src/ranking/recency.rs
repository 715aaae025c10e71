//! Active/historic classification and age decay of dated contributions.

use super::signals::{Contribution, SignalType};
use crate::config::RankingSettings;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Active,
    Historic,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Active => "active",
            Bucket::Historic => "historic",
        }
    }
}

/// Points of one signal type in one bucket for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreComponent {
    pub entity_id: i64,
    pub signal_type: SignalType,
    pub bucket: Bucket,
    pub points: f64,
}

impl ScoreComponent {
    /// Key under which the component is reported, e.g. `chart_active`.
    pub fn name(&self) -> String {
        format!("{}_{}", self.signal_type.as_str(), self.bucket.as_str())
    }
}

/// Start of the active window for a run. Saturates at the earliest
/// representable time.
pub fn active_cutoff(run_at: DateTime<Utc>, active_window_days: u32) -> DateTime<Utc> {
    Duration::try_days(active_window_days.into())
        .and_then(|window| run_at.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Contributions at or after the cutoff are active. Anything dated after the
/// run time is also active.
pub fn classify(at: DateTime<Utc>, run_at: DateTime<Utc>, active_window_days: u32) -> Bucket {
    if at >= active_cutoff(run_at, active_window_days) {
        Bucket::Active
    } else {
        Bucket::Historic
    }
}

/// `base ^ elapsed_days`, using fractional days. Never exceeds 1.
pub fn decay_factor(at: DateTime<Utc>, run_at: DateTime<Utc>, base: f64) -> f64 {
    let elapsed_days = (run_at - at).num_seconds().max(0) as f64 / SECONDS_PER_DAY;
    base.powf(elapsed_days)
}

/// Folds the contributions of one signal type into an active and a historic
/// component. View-style signals are decayed first, then the historic bucket
/// is scaled by the historic multiplier. Both components are always
/// returned, with zero points when there is nothing to count.
pub fn split(
    entity_id: i64,
    signal_type: SignalType,
    contributions: &[Contribution],
    settings: &RankingSettings,
    run_at: DateTime<Utc>,
) -> [ScoreComponent; 2] {
    let mut active = 0.0;
    let mut historic = 0.0;

    for contribution in contributions {
        let mut points = contribution.points;
        if signal_type.is_view_style() {
            points *= decay_factor(contribution.at, run_at, settings.view_decay_base);
        }
        match classify(contribution.at, run_at, settings.active_window_days) {
            Bucket::Active => active += points,
            Bucket::Historic => historic += points,
        }
    }

    [
        ScoreComponent {
            entity_id,
            signal_type,
            bucket: Bucket::Active,
            points: active,
        },
        ScoreComponent {
            entity_id,
            signal_type,
            bucket: Bucket::Historic,
            points: historic * settings.historic_multiplier,
        },
    ]
}
