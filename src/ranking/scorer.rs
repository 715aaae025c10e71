//! Composite scoring of a single entity.

use super::boosts::{label_activity_boost, label_boost};
use super::recency::{split, ScoreComponent};
use super::signals::{SignalSet, SignalType};
use crate::config::RankingSettings;
use crate::signal_store::{Entity, EntityType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const LABEL_ACTIVITY_BOOST: &str = "label_activity_boost";
pub const AGE_SCORE: &str = "age_score";
pub const REPUTATION_SCORE: &str = "reputation_score";

/// One entity's score for one run.
///
/// `components` holds every named value that went into the total: an
/// `<signal>_active` and `<signal>_historic` entry per registered signal type
/// plus one entry per boost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub entity_id: i64,
    pub entity_name: String,
    pub entity_type: EntityType,
    pub base_score: f64,
    pub boost_score: f64,
    pub total_score: f64,
    pub components: BTreeMap<String, f64>,
}

impl CompositeScore {
    /// Sums the components into the base score and adds the boosts on top.
    pub fn from_parts(
        entity: &Entity,
        components: &[ScoreComponent],
        boosts: &[(&str, f64)],
    ) -> Self {
        let mut named = BTreeMap::new();
        let mut base_score = 0.0;
        for component in components {
            base_score += component.points;
            *named.entry(component.name()).or_insert(0.0) += component.points;
        }

        let mut boost_score = 0.0;
        for (name, value) in boosts {
            boost_score += value;
            named.insert(name.to_string(), *value);
        }

        Self {
            entity_id: entity.id,
            entity_name: entity.name.clone(),
            entity_type: entity.entity_type,
            base_score,
            boost_score,
            total_score: base_score + boost_score,
            components: named,
        }
    }
}

/// Scores one entity from the shared signal set.
///
/// `label_activity` maps label ids to whether that label counts as recently
/// active; only artists read it.
pub fn score_entity(
    entity: &Entity,
    signals: &SignalSet,
    settings: &RankingSettings,
    run_at: DateTime<Utc>,
    label_activity: &HashMap<i64, bool>,
) -> CompositeScore {
    let components: Vec<ScoreComponent> = SignalType::for_entity_type(entity.entity_type)
        .iter()
        .flat_map(|&signal_type| {
            let contributions = signals.extract(entity, signal_type, settings, run_at);
            split(entity.id, signal_type, &contributions, settings, run_at)
        })
        .collect();
    let pre_boost: f64 = components.iter().map(|c| c.points).sum();

    match entity.entity_type {
        EntityType::Artist => {
            let label_active = entity
                .label_id
                .and_then(|id| label_activity.get(&id).copied())
                .unwrap_or(false);
            let boost = label_activity_boost(pre_boost, label_active, settings);
            CompositeScore::from_parts(entity, &components, &[(LABEL_ACTIVITY_BOOST, boost)])
        }
        EntityType::Label => {
            let boost = label_boost(entity, signals, settings, run_at);
            CompositeScore::from_parts(
                entity,
                &components,
                &[
                    (AGE_SCORE, boost.age_score),
                    (REPUTATION_SCORE, boost.reputation_score),
                ],
            )
        }
    }
}
