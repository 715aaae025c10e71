//! Secondary boosts applied on top of the signal sum.
//!
//! Artists get a flat percentage bonus when their label shows recent
//! activity. Labels get an age term and a reputation term derived from their
//! chart history and roster.

use super::recency::active_cutoff;
use super::signals::{date_to_utc, SignalSet};
use crate::config::RankingSettings;
use crate::signal_store::{ChartEntry, Entity};
use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Whether any roster artist released something inside the active window,
/// or strung together enough consecutive improving chart periods in it.
pub fn label_has_recent_activity(
    label_id: i64,
    signals: &SignalSet,
    settings: &RankingSettings,
    run_at: DateTime<Utc>,
) -> bool {
    let cutoff = active_cutoff(run_at, settings.active_window_days);
    let in_window = |at: DateTime<Utc>| at >= cutoff && at <= run_at;

    signals.roster(label_id).iter().any(|artist| {
        let released = signals
            .releases_for(artist.id)
            .iter()
            .filter_map(|r| r.release_date.map(date_to_utc))
            .any(in_window);

        released || {
            let entries: Vec<&ChartEntry> = signals
                .chart_entries_for(artist)
                .into_iter()
                .filter(|e| e.chart_date.map(date_to_utc).is_some_and(in_window))
                .collect();
            has_improving_run(
                entries,
                settings.boosts.chart_improvement_threshold,
                settings.boosts.chart_improvement_periods,
            )
        }
    })
}

/// True when `periods` consecutive chart rows, in date order, each gained at
/// least `threshold` positions.
fn has_improving_run(mut entries: Vec<&ChartEntry>, threshold: u32, periods: u32) -> bool {
    entries.sort_by_key(|e| (e.chart_date, e.id));
    let mut streak = 0;
    for entry in entries {
        if entry.gain() >= threshold {
            streak += 1;
            if streak >= periods {
                return true;
            }
        } else {
            streak = 0;
        }
    }
    false
}

pub fn label_activity_boost(pre_boost_total: f64, label_active: bool, settings: &RankingSettings) -> f64 {
    if label_active {
        pre_boost_total * settings.boosts.label_activity_pct
    } else {
        0.0
    }
}

/// Label age and reputation terms, with the inputs that produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelBoost {
    pub age_days: f64,
    pub roster_size: usize,
    pub charting_roster: usize,
    pub roster_airplay: f64,
    pub age_score: f64,
    pub reputation_score: f64,
}

impl LabelBoost {
    pub fn total(&self) -> f64 {
        self.age_score + self.reputation_score
    }
}

/// Age is measured from the label's earliest dated chart appearance. The
/// reputation sum is scaled by `age / (age + half_life)`, so it grows with
/// sustained presence and is zero for a label that never charted.
pub fn label_boost(
    label: &Entity,
    signals: &SignalSet,
    settings: &RankingSettings,
    run_at: DateTime<Utc>,
) -> LabelBoost {
    let boosts = &settings.boosts;
    let earliest = signals
        .chart_entries_for(label)
        .into_iter()
        .filter_map(|e| e.chart_date)
        .min();
    let Some(earliest) = earliest else {
        return LabelBoost::default();
    };

    let age_days =
        ((run_at - date_to_utc(earliest)).num_seconds().max(0) as f64) / SECONDS_PER_DAY;

    let cutoff = active_cutoff(run_at, settings.active_window_days);
    let roster = signals.roster(label.id);
    let charting_roster = roster
        .iter()
        .filter(|artist| {
            signals.chart_entries_for(artist).iter().any(|e| {
                e.chart_date
                    .map(date_to_utc)
                    .is_some_and(|at| at >= cutoff && at <= run_at)
            })
        })
        .count();
    let roster_airplay: f64 = roster
        .iter()
        .flat_map(|artist| signals.airplay_for(artist))
        .map(|spin| spin.spin_weight)
        .sum();

    let longevity = age_days / (age_days + boosts.longevity_half_life_days);
    let reputation_base = roster.len() as f64 * boosts.roster_size_weight
        + charting_roster as f64 * boosts.charting_roster_weight
        + roster_airplay * boosts.roster_airplay_weight;

    LabelBoost {
        age_days,
        roster_size: roster.len(),
        charting_roster,
        roster_airplay,
        age_score: age_days * boosts.label_age_weight,
        reputation_score: reputation_base * longevity,
    }
}
