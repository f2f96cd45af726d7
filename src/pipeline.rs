//! One sync run: fetch -> normalize -> upsert, sequentially.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::{info, warn};

use crate::database_ops::boxscores::upsert_boxscores;
use crate::database_ops::db::Db;
use crate::database_ops::game_stats::upsert_game_stats;
use crate::normalization::{latest_game_ids, merge_boxscores, normalize_games};
use crate::stats_api::{GameLogQuery, StatsProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Every game matched by the query.
    Season,
    /// Only the `games` most recent games matched by the query.
    Latest { games: usize },
}

#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub mode: SyncMode,
    pub query: GameLogQuery,
    pub with_boxscores: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub fetched_rows: usize,
    pub games_accepted: usize,
    pub games_rejected: usize,
    pub wl_mismatches: usize,
    pub game_rows_written: usize,
    pub boxscore_rows_fetched: usize,
    pub boxscore_rows_rejected: usize,
    pub boxscore_rows_written: usize,
    pub elapsed_ms: u64,
    pub dry_run: bool,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched={} games_ok={} games_rejected={} wl_mismatches={} game_rows_written={} \
             boxscores_fetched={} boxscores_rejected={} boxscores_written={} elapsed_ms={}{}",
            self.fetched_rows,
            self.games_accepted,
            self.games_rejected,
            self.wl_mismatches,
            self.game_rows_written,
            self.boxscore_rows_fetched,
            self.boxscore_rows_rejected,
            self.boxscore_rows_written,
            self.elapsed_ms,
            if self.dry_run { " (dry run)" } else { "" }
        )
    }
}

/// Run one sync. With `db = None` nothing is written (dry run); fetching and
/// normalization still happen so the summary reflects what would be stored.
///
/// Malformed games are skipped and counted. Provider failures and write
/// failures abort the run; writes already committed stay valid because every
/// upsert is idempotent.
pub async fn run_sync(
    provider: &dyn StatsProvider,
    db: Option<&Db>,
    req: &SyncRequest,
) -> Result<SyncSummary> {
    let started = Instant::now();
    let mut summary = SyncSummary {
        dry_run: db.is_none(),
        ..SyncSummary::default()
    };

    let mut rows = provider
        .fetch_team_game_logs(&req.query)
        .await
        .with_context(|| format!("fetching team game logs for {}", req.query.season))?;
    summary.fetched_rows = rows.len();

    if let SyncMode::Latest { games } = req.mode {
        let keep = latest_game_ids(&rows, games);
        rows.retain(|r| keep.contains(&r.game_id));
        info!(games = keep.len(), rows = rows.len(), "restricted to latest games");
    }

    let batch = normalize_games(rows);
    summary.games_accepted = batch.games_accepted();
    summary.games_rejected = batch.rejected.len();
    summary.wl_mismatches = batch.wl_mismatches;

    if let Some(db) = db {
        summary.game_rows_written = upsert_game_stats(db, &batch.records).await?;
    }

    if req.with_boxscores {
        let mut box_rows = Vec::new();
        for game_id in batch.game_ids() {
            let rows = provider
                .fetch_boxscore_teams(&game_id)
                .await
                .with_context(|| format!("fetching boxscore for game {game_id}"))?;
            box_rows.extend(rows);
        }
        summary.boxscore_rows_fetched = box_rows.len();

        let (records, rejected) = merge_boxscores(&batch.records, box_rows);
        for err in &rejected {
            warn!(game_id = err.game_id(), error = %err, "skipping boxscore row");
        }
        summary.boxscore_rows_rejected = rejected.len();

        if let Some(db) = db {
            summary.boxscore_rows_written = upsert_boxscores(db, &records).await?;
        }
    }

    summary.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(%summary, "sync finished");
    Ok(summary)
}
