//! Background job execution.
//!
//! A scheduled tick runs the artist and label snapshot jobs concurrently,
//! then the retention job. Every run is recorded in the server store.

mod audit_logger;
mod context;
mod job;
pub mod jobs;
mod runner;

pub use audit_logger::JobAuditLogger;
pub use context::JobContext;
pub use job::{BackgroundJob, JobError};
pub use runner::{run_job, run_jobs_concurrently, JobOutcome};
