use crate::config::{RankingSettings, RetentionSettings};
use crate::ranking::{RankingError, SignalSet};
use crate::ranking_store::{Interval, RankingStore};
use crate::server_store::ServerStore;
use crate::signal_store::SignalStore;
use chrono::{DateTime, Utc};
use std::sync::{Arc, OnceLock};

/// Context provided to jobs during execution.
///
/// One context is built per scheduled tick and cloned into every job of
/// that tick, so all jobs see the same run time and the same signal set.
#[derive(Clone)]
pub struct JobContext {
    /// Read-only access to the raw signals.
    pub signal_store: Arc<dyn SignalStore>,

    /// Current leaderboards, history and status markers.
    pub ranking_store: Arc<dyn RankingStore>,

    /// Job run history and audit log.
    pub server_store: Arc<dyn ServerStore>,

    pub settings: Arc<RankingSettings>,
    pub retention: RetentionSettings,

    /// Wall-clock time of the tick. Stamped on snapshots and archives.
    pub run_at: DateTime<Utc>,

    /// History intervals that receive the outgoing snapshot on this tick.
    pub intervals: Vec<Interval>,

    /// Id of the job run record, set by the runner.
    pub run_id: Option<i64>,

    signals: Arc<OnceLock<Result<Arc<SignalSet>, String>>>,
}

impl JobContext {
    /// Create a context for a tick at `run_at`, archiving into the intervals
    /// due on that date.
    pub fn new(
        signal_store: Arc<dyn SignalStore>,
        ranking_store: Arc<dyn RankingStore>,
        server_store: Arc<dyn ServerStore>,
        settings: RankingSettings,
        retention: RetentionSettings,
        run_at: DateTime<Utc>,
    ) -> Self {
        Self {
            signal_store,
            ranking_store,
            server_store,
            settings: Arc::new(settings),
            retention,
            run_at,
            intervals: Interval::due_on(run_at.date_naive()),
            run_id: None,
            signals: Arc::new(OnceLock::new()),
        }
    }

    /// Replace the date-gated intervals, e.g. for a backfill.
    pub fn with_intervals(mut self, intervals: Vec<Interval>) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_run_id(mut self, run_id: i64) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// The tick's signal set, loaded on first use and shared by every clone
    /// of this context. Concurrent callers wait for the first load.
    pub fn signals(&self) -> Result<Arc<SignalSet>, RankingError> {
        let loaded = self.signals.get_or_init(|| {
            SignalSet::load(self.signal_store.as_ref(), &self.settings)
                .map(Arc::new)
                .map_err(|e| e.to_string())
        });
        match loaded {
            Ok(signals) => Ok(Arc::clone(signals)),
            Err(msg) => Err(RankingError::SourceUnavailable(anyhow::anyhow!(msg.clone()))),
        }
    }
}
