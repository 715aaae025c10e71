mod file_config;

pub use file_config::{BoostsConfig, FileConfig, RankingConfig, RetentionConfig, WeightsConfig};

use crate::ranking::RankingError;
use crate::ranking_store::Interval;
use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Upper bound for any configured number of days (100 years).
pub const MAX_DAYS: u32 = 36_500;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub max_concurrency: usize,
    pub run_timeout_secs: u64,
    pub top_n: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_dir: None,
            max_concurrency: 4,
            run_timeout_secs: 900,
            top_n: 500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub ranking: RankingSettings,
    pub retention: RetentionSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let mut ranking = RankingSettings::from_file(file.ranking.unwrap_or_default());
        ranking.max_concurrency = file.max_concurrency.unwrap_or(cli.max_concurrency);
        ranking.run_timeout_secs = file.run_timeout_secs.unwrap_or(cli.run_timeout_secs);
        ranking.top_n = file.top_n.unwrap_or(cli.top_n);
        ranking.validate()?;

        let retention = RetentionSettings::from_file(file.retention.unwrap_or_default());
        retention.validate()?;

        Ok(Self {
            db_dir,
            ranking,
            retention,
        })
    }

    pub fn signal_db_path(&self) -> PathBuf {
        self.db_dir.join("signals.db")
    }

    pub fn ranking_db_path(&self) -> PathBuf {
        self.db_dir.join("rankings.db")
    }

    pub fn server_db_path(&self) -> PathBuf {
        self.db_dir.join("server.db")
    }
}

/// Per-signal weight constants.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalWeights {
    pub chart_position: f64,
    pub chart_gain: f64,
    pub chart_peak: f64,
    pub chart_longevity: f64,
    pub chart_spins: f64,
    pub chart_station_adds: f64,
    pub mention_title: f64,
    pub mention_summary: f64,
    pub mention_body: f64,
    pub mention_tag: f64,
    pub traffic_view: f64,
    pub airplay_spin: f64,
    pub release: f64,
    pub video_view: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            chart_position: 1.0,
            chart_gain: 1.0,
            chart_peak: 1.0,
            chart_longevity: 1.0,
            chart_spins: 0.01,
            chart_station_adds: 0.5,
            mention_title: 10.0,
            mention_summary: 5.0,
            mention_body: 2.0,
            mention_tag: 3.0,
            traffic_view: 0.1,
            airplay_spin: 0.05,
            release: 25.0,
            video_view: 0.001,
        }
    }
}

impl SignalWeights {
    fn named(&self) -> [(&'static str, f64); 14] {
        [
            ("chart_position", self.chart_position),
            ("chart_gain", self.chart_gain),
            ("chart_peak", self.chart_peak),
            ("chart_longevity", self.chart_longevity),
            ("chart_spins", self.chart_spins),
            ("chart_station_adds", self.chart_station_adds),
            ("mention_title", self.mention_title),
            ("mention_summary", self.mention_summary),
            ("mention_body", self.mention_body),
            ("mention_tag", self.mention_tag),
            ("traffic_view", self.traffic_view),
            ("airplay_spin", self.airplay_spin),
            ("release", self.release),
            ("video_view", self.video_view),
        ]
    }

    fn merge(mut self, file: WeightsConfig) -> Self {
        let overrides = [
            (&mut self.chart_position, file.chart_position),
            (&mut self.chart_gain, file.chart_gain),
            (&mut self.chart_peak, file.chart_peak),
            (&mut self.chart_longevity, file.chart_longevity),
            (&mut self.chart_spins, file.chart_spins),
            (&mut self.chart_station_adds, file.chart_station_adds),
            (&mut self.mention_title, file.mention_title),
            (&mut self.mention_summary, file.mention_summary),
            (&mut self.mention_body, file.mention_body),
            (&mut self.mention_tag, file.mention_tag),
            (&mut self.traffic_view, file.traffic_view),
            (&mut self.airplay_spin, file.airplay_spin),
            (&mut self.release, file.release),
            (&mut self.video_view, file.video_view),
        ];
        for (slot, value) in overrides {
            if let Some(value) = value {
                *slot = value;
            }
        }
        self
    }
}

/// Constants for the artist label-activity boost and the label age/reputation boost.
#[derive(Debug, Clone, PartialEq)]
pub struct BoostSettings {
    /// Fraction of the pre-boost total added to artists whose label is active.
    pub label_activity_pct: f64,
    /// Minimum positions gained per chart period to count as an improvement.
    pub chart_improvement_threshold: u32,
    /// Consecutive improving periods required for label activity.
    pub chart_improvement_periods: u32,
    pub label_age_weight: f64,
    pub roster_size_weight: f64,
    pub charting_roster_weight: f64,
    pub roster_airplay_weight: f64,
    /// Label age at which the reputation term reaches half strength.
    pub longevity_half_life_days: f64,
}

impl Default for BoostSettings {
    fn default() -> Self {
        Self {
            label_activity_pct: 0.10,
            chart_improvement_threshold: 5,
            chart_improvement_periods: 2,
            label_age_weight: 0.01,
            roster_size_weight: 2.0,
            charting_roster_weight: 10.0,
            roster_airplay_weight: 0.01,
            longevity_half_life_days: 365.0,
        }
    }
}

/// Everything the scoring functions need, passed explicitly into each of them.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingSettings {
    pub active_window_days: u32,
    pub historic_multiplier: f64,
    pub view_decay_base: f64,
    pub top_n: usize,
    pub max_concurrency: usize,
    pub run_timeout_secs: u64,
    pub weights: SignalWeights,
    pub action_weights: BTreeMap<String, f64>,
    pub default_action_weight: f64,
    pub group_names: Vec<String>,
    pub boosts: BoostSettings,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            active_window_days: 180,
            historic_multiplier: 0.5,
            view_decay_base: 0.995,
            top_n: 500,
            max_concurrency: 4,
            run_timeout_secs: 900,
            weights: SignalWeights::default(),
            action_weights: default_action_weights(),
            default_action_weight: 1.0,
            group_names: Vec::new(),
            boosts: BoostSettings::default(),
        }
    }
}

fn default_action_weights() -> BTreeMap<String, f64> {
    [("view", 1.0), ("play", 2.0), ("share", 3.0)]
        .into_iter()
        .map(|(action, weight)| (action.to_string(), weight))
        .collect()
}

impl RankingSettings {
    pub fn from_file(file: RankingConfig) -> Self {
        let defaults = Self::default();
        let file_boosts = file.boosts.unwrap_or_default();
        let boosts = BoostSettings {
            label_activity_pct: file_boosts
                .label_activity_pct
                .unwrap_or(defaults.boosts.label_activity_pct),
            chart_improvement_threshold: file_boosts
                .chart_improvement_threshold
                .unwrap_or(defaults.boosts.chart_improvement_threshold),
            chart_improvement_periods: file_boosts
                .chart_improvement_periods
                .unwrap_or(defaults.boosts.chart_improvement_periods),
            label_age_weight: file_boosts
                .label_age_weight
                .unwrap_or(defaults.boosts.label_age_weight),
            roster_size_weight: file_boosts
                .roster_size_weight
                .unwrap_or(defaults.boosts.roster_size_weight),
            charting_roster_weight: file_boosts
                .charting_roster_weight
                .unwrap_or(defaults.boosts.charting_roster_weight),
            roster_airplay_weight: file_boosts
                .roster_airplay_weight
                .unwrap_or(defaults.boosts.roster_airplay_weight),
            longevity_half_life_days: file_boosts
                .longevity_half_life_days
                .unwrap_or(defaults.boosts.longevity_half_life_days),
        };

        let mut action_weights = defaults.action_weights;
        for (action, weight) in file.action_weights.unwrap_or_default() {
            action_weights.insert(action.trim().to_ascii_lowercase(), weight);
        }

        Self {
            active_window_days: file
                .active_window_days
                .unwrap_or(defaults.active_window_days),
            historic_multiplier: file
                .historic_multiplier
                .unwrap_or(defaults.historic_multiplier),
            view_decay_base: file.view_decay_base.unwrap_or(defaults.view_decay_base),
            weights: defaults
                .weights
                .merge(file.weights.unwrap_or_default()),
            action_weights,
            default_action_weight: file
                .default_action_weight
                .unwrap_or(defaults.default_action_weight),
            group_names: file.group_names.unwrap_or_default(),
            boosts,
            ..defaults
        }
    }

    /// Multiplier for a traffic action type, falling back to the default weight.
    pub fn action_weight(&self, action_type: &str) -> f64 {
        self.action_weights
            .get(action_type)
            .copied()
            .unwrap_or(self.default_action_weight)
    }

    pub fn validate(&self) -> Result<(), RankingError> {
        if self.active_window_days == 0 {
            return Err(RankingError::config("active_window_days must be > 0"));
        }
        if self.active_window_days > MAX_DAYS {
            return Err(RankingError::config(format!(
                "active_window_days must be at most {}, got {}",
                MAX_DAYS, self.active_window_days
            )));
        }
        if !(0.0..=1.0).contains(&self.historic_multiplier) {
            return Err(RankingError::config(format!(
                "historic_multiplier must be within [0, 1], got {}",
                self.historic_multiplier
            )));
        }
        if !(self.view_decay_base > 0.0 && self.view_decay_base <= 1.0) {
            return Err(RankingError::config(format!(
                "view_decay_base must be within (0, 1], got {}",
                self.view_decay_base
            )));
        }
        if self.top_n == 0 {
            return Err(RankingError::config("top_n must be > 0"));
        }
        if self.max_concurrency == 0 {
            return Err(RankingError::config("max_concurrency must be > 0"));
        }

        let boosts = &self.boosts;
        let named = self
            .weights
            .named()
            .into_iter()
            .chain(
                self.action_weights
                    .iter()
                    .map(|(_, weight)| ("action_weights", *weight)),
            )
            .chain([
                ("default_action_weight", self.default_action_weight),
                ("label_activity_pct", boosts.label_activity_pct),
                ("label_age_weight", boosts.label_age_weight),
                ("roster_size_weight", boosts.roster_size_weight),
                ("charting_roster_weight", boosts.charting_roster_weight),
                ("roster_airplay_weight", boosts.roster_airplay_weight),
            ]);
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(RankingError::config(format!(
                    "{} must be a finite, non-negative number, got {}",
                    name, value
                )));
            }
        }
        if !(boosts.longevity_half_life_days.is_finite() && boosts.longevity_half_life_days > 0.0)
        {
            return Err(RankingError::config(format!(
                "longevity_half_life_days must be > 0, got {}",
                boosts.longevity_half_life_days
            )));
        }
        if boosts.chart_improvement_periods == 0 {
            return Err(RankingError::config("chart_improvement_periods must be > 0"));
        }
        Ok(())
    }
}

/// Maximum age of history rows per interval. `None` keeps them forever.
#[derive(Debug, Clone, PartialEq)]
pub struct RetentionSettings {
    pub daily_days: Option<u32>,
    pub weekly_days: Option<u32>,
    pub monthly_days: Option<u32>,
    pub yearly_days: Option<u32>,
    pub audit_log_days: Option<u32>,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            daily_days: Some(90),
            weekly_days: Some(730),
            monthly_days: Some(1825),
            yearly_days: None,
            audit_log_days: Some(90),
        }
    }
}

impl RetentionSettings {
    pub fn from_file(file: RetentionConfig) -> Self {
        let defaults = Self::default();
        // 0 in the file means "keep forever"
        let pick = |value: Option<u32>, default: Option<u32>| match value {
            Some(0) => None,
            Some(days) => Some(days),
            None => default,
        };
        Self {
            daily_days: pick(file.daily_days, defaults.daily_days),
            weekly_days: pick(file.weekly_days, defaults.weekly_days),
            monthly_days: pick(file.monthly_days, defaults.monthly_days),
            yearly_days: pick(file.yearly_days, defaults.yearly_days),
            audit_log_days: pick(file.audit_log_days, defaults.audit_log_days),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let named = [
            ("daily_days", self.daily_days),
            ("weekly_days", self.weekly_days),
            ("monthly_days", self.monthly_days),
            ("yearly_days", self.yearly_days),
            ("audit_log_days", self.audit_log_days),
        ];
        for (name, days) in named {
            if let Some(days) = days.filter(|d| *d > MAX_DAYS) {
                bail!(
                    "retention {} must be at most {} (or 0 to keep forever), got {}",
                    name,
                    MAX_DAYS,
                    days
                );
            }
        }
        Ok(())
    }

    pub fn max_age_days(&self, interval: Interval) -> Option<u32> {
        match interval {
            Interval::Daily => self.daily_days,
            Interval::Weekly => self.weekly_days,
            Interval::Monthly => self.monthly_days,
            Interval::Yearly => self.yearly_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_temp_db_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            max_concurrency: 2,
            run_timeout_secs: 60,
            top_n: 100,
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.ranking.max_concurrency, 2);
        assert_eq!(config.ranking.run_timeout_secs, 60);
        assert_eq!(config.ranking.top_n, 100);
        assert_eq!(config.ranking.active_window_days, 180);
        assert_eq!(config.ranking.historic_multiplier, 0.5);
        assert_eq!(config.retention, RetentionSettings::default());
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/should/be/overridden")),
            ..Default::default()
        };

        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            top_n: Some(50),
            ranking: Some(RankingConfig {
                historic_multiplier: Some(0.25),
                weights: Some(WeightsConfig {
                    release: Some(40.0),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            retention: Some(RetentionConfig {
                daily_days: Some(0),
                yearly_days: Some(3650),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.ranking.top_n, 50);
        assert_eq!(config.ranking.historic_multiplier, 0.25);
        assert_eq!(config.ranking.weights.release, 40.0);
        // Untouched weights keep their defaults
        assert_eq!(config.ranking.weights.chart_position, 1.0);
        // CLI value used when TOML doesn't specify
        assert_eq!(config.ranking.max_concurrency, 4);

        assert_eq!(config.retention.max_age_days(Interval::Daily), None);
        assert_eq!(config.retention.max_age_days(Interval::Weekly), Some(730));
        assert_eq!(config.retention.max_age_days(Interval::Yearly), Some(3650));
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_rejects_invalid_ranking_settings() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };
        let file_config = FileConfig {
            ranking: Some(RankingConfig {
                historic_multiplier: Some(1.5),
                ..Default::default()
            }),
            ..Default::default()
        };

        let err = AppConfig::resolve(&cli, Some(file_config)).unwrap_err();
        assert!(err.to_string().contains("historic_multiplier"));
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let mut settings = RankingSettings::default();
        settings.weights.mention_body = -1.0;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, RankingError::Config(_)));
        assert!(err.to_string().contains("mention_body"));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let settings = RankingSettings {
            top_n: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = RankingSettings {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = RankingSettings {
            view_decay_base: 0.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_active_window() {
        let settings = RankingSettings {
            active_window_days: u32::MAX,
            ..Default::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, RankingError::Config(_)));
        assert!(err.to_string().contains("active_window_days"));

        let settings = RankingSettings {
            active_window_days: MAX_DAYS,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_resolve_rejects_oversized_retention() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };
        let file_config = FileConfig {
            retention: Some(RetentionConfig {
                daily_days: Some(u32::MAX),
                ..Default::default()
            }),
            ..Default::default()
        };

        let err = AppConfig::resolve(&cli, Some(file_config)).unwrap_err();
        assert!(err.to_string().contains("daily_days"));
    }

    #[test]
    fn test_action_weights_merge_over_defaults() {
        let mut overrides = BTreeMap::new();
        overrides.insert("Download".to_string(), 4.0);
        overrides.insert("view".to_string(), 0.5);
        let settings = RankingSettings::from_file(RankingConfig {
            action_weights: Some(overrides),
            ..Default::default()
        });

        assert_eq!(settings.action_weight("download"), 4.0);
        assert_eq!(settings.action_weight("view"), 0.5);
        assert_eq!(settings.action_weight("play"), 2.0);
        assert_eq!(settings.action_weight("unknown"), 1.0);
    }
}
