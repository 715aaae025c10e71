//! Common test infrastructure
//!
//! End-to-end tests build a throwaway `db_dir` with a seeded signal database,
//! then drive the jobs through the library API.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{monday, TestEnv, ARTIST_2_ID};
//!
//! #[tokio::test]
//! async fn test_artist_is_ranked() {
//!     let env = TestEnv::seeded();
//!     env.run_tick(monday()).await;
//!     assert_eq!(env.current_artist_ids()[0], ARTIST_2_ID);
//! }
//! ```

mod constants;
mod env;
mod fixtures;

// Public API - this is what tests import
pub use constants::*;
pub use env::{assert_all_succeeded, TestEnv};
pub use fixtures::SignalFixture;
