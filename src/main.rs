use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use hitrank::background_jobs::jobs::{HistoryRetentionJob, RankingSnapshotJob};
use hitrank::background_jobs::{run_job, run_jobs_concurrently, BackgroundJob, JobContext};
use hitrank::config::{AppConfig, CliConfig, FileConfig};
use hitrank::ranking_store::{Interval, RankingStore, SqliteRankingStore};
use hitrank::server_store::{JobRunStatus, ServerStore, SqliteServerStore};
use hitrank::signal_store::{EntityType, SignalStore, SqliteSignalStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

fn parse_entity_type(s: &str) -> Result<EntityType, String> {
    EntityType::parse(s).ok_or_else(|| format!("unknown entity type '{}'", s))
}

fn parse_interval(s: &str) -> Result<Interval, String> {
    Interval::parse(s).ok_or_else(|| format!("unknown interval '{}'", s))
}

/// `artist`, `label` or `all`.
#[derive(Debug, Clone, Copy)]
enum EntityScope {
    All,
    Only(EntityType),
}

impl EntityScope {
    fn entity_types(&self) -> Vec<EntityType> {
        match self {
            EntityScope::All => EntityType::ALL.to_vec(),
            EntityScope::Only(entity_type) => vec![*entity_type],
        }
    }
}

fn parse_entity_scope(s: &str) -> Result<EntityScope, String> {
    if s.eq_ignore_ascii_case("all") {
        return Ok(EntityScope::All);
    }
    parse_entity_type(s).map(EntityScope::Only)
}

#[derive(Parser, Debug)]
#[clap(version, about = "Ranks artists and labels and keeps their leaderboard history")]
struct CliArgs {
    /// Path to a TOML config file. Its values override the flags below.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding signals.db, rankings.db and server.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Worker threads used to score entities.
    #[clap(long, default_value_t = 4)]
    pub max_concurrency: usize,

    /// Wall-clock budget of one ranking run, in seconds.
    #[clap(long, default_value_t = 900)]
    pub run_timeout_secs: u64,

    /// Number of entities kept in each leaderboard.
    #[clap(long, default_value_t = 500)]
    pub top_n: usize,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one scheduled tick: rank, archive and replace, then prune.
    Run {
        #[clap(long, default_value = "all", value_parser = parse_entity_scope)]
        entity_type: EntityScope,

        /// Archive into these intervals instead of the ones due today.
        #[clap(long, value_delimiter = ',', value_parser = parse_interval)]
        intervals: Option<Vec<Interval>>,

        #[clap(long)]
        skip_prune: bool,
    },
    /// Only prune archived history and old audit entries.
    Prune,
    /// Print the current leaderboard with changes against an interval archive.
    Show {
        #[clap(long, value_parser = parse_entity_type)]
        entity_type: EntityType,

        #[clap(long, default_value = "daily", value_parser = parse_interval)]
        interval: Interval,

        #[clap(long, default_value_t = 25)]
        limit: usize,
    },
    /// Print the last ranking time per entity type and the last job runs.
    Status {
        /// Recent runs listed per job.
        #[clap(long, default_value_t = 5)]
        runs: usize,
    },
    /// Print the archived rank series of one entity.
    History {
        #[clap(long, value_parser = parse_entity_type)]
        entity_type: EntityType,

        #[clap(long, conflicts_with = "id", required_unless_present = "id")]
        name: Option<String>,

        #[clap(long)]
        id: Option<i64>,

        #[clap(long, default_value = "daily", value_parser = parse_interval)]
        interval: Interval,

        #[clap(long, default_value_t = 30)]
        limit: usize,
    },
}

fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn format_change(position_change: Option<i64>) -> String {
    match position_change {
        Some(delta) if delta > 0 => format!("+{}", delta),
        Some(delta) => delta.to_string(),
        None => "-".to_string(),
    }
}

struct Stores {
    signal_store: Arc<dyn SignalStore>,
    ranking_store: Arc<dyn RankingStore>,
    server_store: Arc<dyn ServerStore>,
}

impl Stores {
    /// Opens everything a job run needs and fails runs abandoned by an
    /// earlier process.
    fn open(config: &AppConfig) -> Result<Self> {
        info!("Opening signal database at {:?}...", config.signal_db_path());
        let signal_store = SqliteSignalStore::open(config.signal_db_path())
            .context("Failed to open signal database")?;
        let server_store = open_server_store(config)?;

        // Anything older than the run timeout can no longer be in flight
        let started_before = Utc::now().timestamp() - config.ranking.run_timeout_secs as i64;
        let stale = server_store.mark_stale_jobs_failed(started_before)?;
        if stale > 0 {
            warn!("Marked {} interrupted job run(s) as failed", stale);
        }

        Ok(Self {
            signal_store: Arc::new(signal_store),
            ranking_store: open_ranking_store(config)?,
            server_store,
        })
    }

    fn job_context(&self, config: &AppConfig) -> JobContext {
        JobContext::new(
            Arc::clone(&self.signal_store),
            Arc::clone(&self.ranking_store),
            Arc::clone(&self.server_store),
            config.ranking.clone(),
            config.retention.clone(),
            Utc::now(),
        )
    }
}

fn open_ranking_store(config: &AppConfig) -> Result<Arc<dyn RankingStore>> {
    let store: Arc<dyn RankingStore> = Arc::new(
        SqliteRankingStore::new(config.ranking_db_path())
            .context("Failed to open ranking database")?,
    );
    Ok(store)
}

fn open_server_store(config: &AppConfig) -> Result<Arc<dyn ServerStore>> {
    let store: Arc<dyn ServerStore> = Arc::new(
        SqliteServerStore::new(config.server_db_path())
            .context("Failed to open server database")?,
    );
    Ok(store)
}

async fn run_tick(
    config: &AppConfig,
    scope: EntityScope,
    intervals: Option<Vec<Interval>>,
    skip_prune: bool,
) -> Result<()> {
    let stores = Stores::open(config)?;
    let mut ctx = stores.job_context(config);
    if let Some(intervals) = intervals {
        ctx = ctx.with_intervals(intervals);
    }
    info!(
        "Ranking run at {} archiving into [{}]",
        ctx.run_at,
        ctx.intervals
            .iter()
            .map(|i| i.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let jobs: Vec<Arc<dyn BackgroundJob>> = scope
        .entity_types()
        .into_iter()
        .map(|entity_type| Arc::new(RankingSnapshotJob::new(entity_type)) as Arc<dyn BackgroundJob>)
        .collect();
    let mut outcomes = run_jobs_concurrently(jobs, &ctx, "cli").await;

    if !skip_prune {
        outcomes.push(run_job(Arc::new(HistoryRetentionJob::new()), ctx, "cli").await);
    }

    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|o| !o.is_success())
        .map(|o| o.job_id)
        .collect();
    if !failed.is_empty() {
        bail!("{} job(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

async fn run_prune(config: &AppConfig) -> Result<()> {
    let stores = Stores::open(config)?;
    let outcome = run_job(
        Arc::new(HistoryRetentionJob::new()),
        stores.job_context(config),
        "cli",
    )
    .await;
    if let Err(e) = outcome.result {
        bail!("Retention job failed: {}", e);
    }
    Ok(())
}

fn show(config: &AppConfig, entity_type: EntityType, interval: Interval, limit: usize) -> Result<()> {
    let ranking_store = open_ranking_store(config)?;
    let changes = ranking_store.interval_changes(entity_type, interval)?;
    if changes.is_empty() {
        println!("No {} leaderboard yet.", entity_type);
        return Ok(());
    }

    println!(
        "{:>5}  {:<32} {:>12} {:>8}  {:<6} (vs {} archive)",
        "rank", "name", "score", "change", "trend", interval
    );
    for item in changes.iter().take(limit) {
        println!(
            "{:>5}  {:<32} {:>12.2} {:>8}  {:<6}",
            item.row.rank,
            item.row.entity_name,
            item.row.total_score,
            format_change(item.change.position_change),
            item.change.trend
        );
    }
    Ok(())
}

fn status(config: &AppConfig, runs: usize) -> Result<()> {
    let ranking_store = open_ranking_store(config)?;
    let server_store = open_server_store(config)?;

    for entity_type in EntityType::ALL {
        match ranking_store.get_status(entity_type)? {
            Some(status) => println!(
                "{:<7} last ranked at {} ({} entries)",
                entity_type,
                format_timestamp(status.last_ranked_at),
                status.entity_count
            ),
            None => println!("{:<7} never ranked", entity_type),
        }
        let last_attempt = server_store.get_last_run(RankingSnapshotJob::new(entity_type).id())?;
        if let Some(run) = last_attempt.filter(|r| r.status == JobRunStatus::Failed) {
            println!(
                "{:<7} last attempt failed at {}: {}",
                "",
                run.started_at.format("%Y-%m-%d %H:%M:%S"),
                run.error_message.unwrap_or_default()
            );
        }
    }

    for run in server_store.get_running_jobs()? {
        println!(
            "{} in progress since {}",
            run.job_id,
            run.started_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    let job_ids = RankingSnapshotJob::all()
        .iter()
        .map(|job| job.id())
        .chain(std::iter::once(HistoryRetentionJob::new().id()))
        .collect::<Vec<_>>();
    for job_id in job_ids {
        let history = server_store.get_job_history(job_id, runs)?;
        if history.is_empty() {
            println!("{:<24} never run", job_id);
            continue;
        }
        println!("{}:", job_id);
        for run in history {
            println!(
                "  {:<9} started {} by {}{}",
                run.status.as_str(),
                run.started_at.format("%Y-%m-%d %H:%M:%S"),
                run.triggered_by,
                run.error_message
                    .map(|e| format!(" ({})", e))
                    .unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn history(
    config: &AppConfig,
    entity_type: EntityType,
    name: Option<String>,
    id: Option<i64>,
    interval: Interval,
    limit: usize,
) -> Result<()> {
    let signal_store = SqliteSignalStore::open(config.signal_db_path())
        .context("Failed to open signal database")?;
    let entity = match (id, name) {
        (Some(id), _) => signal_store
            .get_entity(id)?
            .filter(|e| e.entity_type == entity_type),
        (None, Some(name)) => signal_store.find_entity_by_name(&name, entity_type)?,
        (None, None) => bail!("Either --name or --id is required"),
    };
    let Some(entity) = entity else {
        bail!("No such {}", entity_type);
    };

    let ranking_store = open_ranking_store(config)?;
    let records = ranking_store.entity_history(entity_type, entity.id, interval, limit)?;
    if records.is_empty() {
        println!("No {} history for {} ({}).", interval, entity.name, entity.id);
        return Ok(());
    }

    println!("{} history for {} ({}):", interval, entity.name, entity.id);
    for record in records {
        println!(
            "{}  rank {:>4}  score {:>12.2}  {}",
            format_timestamp(record.snapshot_at),
            record.row.rank,
            record.row.total_score,
            record.row.change.trend
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        max_concurrency: cli_args.max_concurrency,
        run_timeout_secs: cli_args.run_timeout_secs,
        top_n: cli_args.top_n,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let result = match cli_args.command {
        Command::Run {
            entity_type,
            intervals,
            skip_prune,
        } => run_tick(&config, entity_type, intervals, skip_prune).await,
        Command::Prune => run_prune(&config).await,
        Command::Show {
            entity_type,
            interval,
            limit,
        } => show(&config, entity_type, interval, limit),
        Command::Status { runs } => status(&config, runs),
        Command::History {
            entity_type,
            name,
            id,
            interval,
            limit,
        } => history(&config, entity_type, name, id, interval, limit),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
