use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub max_concurrency: Option<usize>,
    pub run_timeout_secs: Option<u64>,
    pub top_n: Option<usize>,

    // Feature configs
    pub ranking: Option<RankingConfig>,
    pub retention: Option<RetentionConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RankingConfig {
    pub active_window_days: Option<u32>,
    pub historic_multiplier: Option<f64>,
    /// Per-day decay base for view-style signals. 1.0 disables decay.
    pub view_decay_base: Option<f64>,
    pub default_action_weight: Option<f64>,
    /// Multipliers per traffic action type, merged over the defaults.
    pub action_weights: Option<BTreeMap<String, f64>>,
    /// Extra multi-word group names that must never be split.
    pub group_names: Option<Vec<String>>,
    pub weights: Option<WeightsConfig>,
    pub boosts: Option<BoostsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct WeightsConfig {
    pub chart_position: Option<f64>,
    pub chart_gain: Option<f64>,
    pub chart_peak: Option<f64>,
    pub chart_longevity: Option<f64>,
    pub chart_spins: Option<f64>,
    pub chart_station_adds: Option<f64>,
    pub mention_title: Option<f64>,
    pub mention_summary: Option<f64>,
    pub mention_body: Option<f64>,
    pub mention_tag: Option<f64>,
    pub traffic_view: Option<f64>,
    pub airplay_spin: Option<f64>,
    pub release: Option<f64>,
    pub video_view: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BoostsConfig {
    pub label_activity_pct: Option<f64>,
    pub chart_improvement_threshold: Option<u32>,
    pub chart_improvement_periods: Option<u32>,
    pub label_age_weight: Option<f64>,
    pub roster_size_weight: Option<f64>,
    pub charting_roster_weight: Option<f64>,
    pub roster_airplay_weight: Option<f64>,
    pub longevity_half_life_days: Option<f64>,
}

/// Retention per history interval, in days. 0 keeps history forever.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RetentionConfig {
    pub daily_days: Option<u32>,
    pub weekly_days: Option<u32>,
    pub monthly_days: Option<u32>,
    pub yearly_days: Option<u32>,
    /// Job audit log entries older than this are deleted by the pruner.
    pub audit_log_days: Option<u32>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
