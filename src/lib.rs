//! Sync NBA team game logs and boxscores from stats.nba.com into Postgres.

pub mod database_ops;
pub mod logging;
pub mod models;
pub mod normalization;
pub mod pipeline;
pub mod stats_api;

pub mod util {
    pub mod env;
}

pub use pipeline::{run_sync, SyncMode, SyncRequest, SyncSummary};
