//! End-to-end computation of one leaderboard: extract, split, score, rank.
//!
//! Persistence is not part of this module; see
//! [`RankingStore::replace_snapshot`](crate::ranking_store::RankingStore::replace_snapshot).

use super::assembler::{assemble, RankedEntry};
use super::boosts::label_has_recent_activity;
use super::scorer::{score_entity, CompositeScore};
use super::signals::SignalSet;
use super::RankingError;
use crate::config::RankingSettings;
use crate::signal_store::{Entity, EntityType};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Wall-clock budget of a run, checked between stages. Work is never
/// interrupted mid-stage.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn new(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn from_settings(settings: &RankingSettings) -> Self {
        Self::new(Duration::from_secs(settings.run_timeout_secs))
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn check(&self) -> Result<(), RankingError> {
        if self.started.elapsed() > self.limit {
            return Err(RankingError::Timeout {
                elapsed_ms: self.elapsed_ms(),
            });
        }
        Ok(())
    }
}

fn build_pool(settings: &RankingSettings) -> Result<rayon::ThreadPool, RankingError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(settings.max_concurrency)
        .thread_name(|i| format!("hitrank-score-{}", i))
        .build()
        .map_err(|e| RankingError::config(format!("Failed to build worker pool: {}", e)))
}

/// Recent-activity flag for every label, computed once per artist run.
fn label_activity_map(
    pool: &rayon::ThreadPool,
    labels: &[Entity],
    signals: &SignalSet,
    settings: &RankingSettings,
    run_at: DateTime<Utc>,
) -> HashMap<i64, bool> {
    pool.install(|| {
        labels
            .par_iter()
            .map(|label| {
                (
                    label.id,
                    label_has_recent_activity(label.id, signals, settings, run_at),
                )
            })
            .collect()
    })
}

/// Scores every entity of `entity_type` and returns the ranked Top-N.
///
/// Entities are scored independently on a pool of `max_concurrency` threads.
/// Results are collected in input order, so the output only depends on the
/// signals and the settings.
pub fn rank_entities(
    signals: &SignalSet,
    entity_type: EntityType,
    settings: &RankingSettings,
    run_at: DateTime<Utc>,
    deadline: &Deadline,
) -> Result<Vec<RankedEntry>, RankingError> {
    settings.validate()?;
    let pool = build_pool(settings)?;
    let entities = signals.entities(entity_type);

    let label_activity = match entity_type {
        EntityType::Artist => label_activity_map(
            &pool,
            signals.entities(EntityType::Label),
            signals,
            settings,
            run_at,
        ),
        EntityType::Label => HashMap::new(),
    };
    debug!(
        "{} of {} labels recently active",
        label_activity.values().filter(|active| **active).count(),
        label_activity.len()
    );
    deadline.check()?;

    let scores: Vec<CompositeScore> = pool.install(|| {
        entities
            .par_iter()
            .map(|entity| score_entity(entity, signals, settings, run_at, &label_activity))
            .collect()
    });
    deadline.check()?;

    let ranked = assemble(scores, settings.top_n);
    info!(
        "Ranked {} of {} {} entities in {} ms",
        ranked.len(),
        entities.len(),
        entity_type,
        deadline.elapsed_ms()
    );
    Ok(ranked)
}
