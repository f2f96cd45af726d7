//! Read access to the `teams` registry.
//!
//! The registry is maintained inside Postgres: a statement-level trigger on
//! `team_game_stats` calls `refresh_teams()` after every write. Nothing here
//! writes to `teams` directly.

use anyhow::Result;
use tracing::{info, instrument};

use super::db::Db;
use crate::models::TeamRecord;

/// Run the registry refresh by hand (repairs after manual edits or a restore).
/// Returns the number of team rows inserted or changed.
#[instrument(skip(db))]
pub async fn refresh_teams(db: &Db) -> Result<i32> {
    let touched: i32 = sqlx::query_scalar("SELECT refresh_teams()")
        .persistent(false)
        .fetch_one(&db.pool)
        .await?;
    info!(touched, "team registry refreshed");
    Ok(touched)
}

pub async fn list_teams(db: &Db) -> Result<Vec<TeamRecord>> {
    let rows = sqlx::query_as::<_, TeamRecord>(
        "SELECT team_id, team_abbreviation, team_name FROM teams ORDER BY team_abbreviation, team_id",
    )
    .persistent(false)
    .fetch_all(&db.pool)
    .await?;
    Ok(rows)
}

pub async fn get_team(db: &Db, team_id: i64) -> Result<Option<TeamRecord>> {
    let row = sqlx::query_as::<_, TeamRecord>(
        "SELECT team_id, team_abbreviation, team_name FROM teams WHERE team_id = $1",
    )
    .persistent(false)
    .bind(team_id)
    .fetch_optional(&db.pool)
    .await?;
    Ok(row)
}
