use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::collections::HashSet;
use tracing::{info, instrument};

use super::db::Db;
use crate::models::{GameTeamRecord, HomeAway, WinLoss};

/// 12 binds per row; keeps each statement far below the 65535 parameter cap.
const CHUNK_ROWS: usize = 1000;

/// Collapse rows sharing a key, keeping the last occurrence. Postgres rejects
/// an ON CONFLICT statement that touches the same row twice.
pub(crate) fn dedupe_last<'a, T>(
    rows: &'a [T],
    key: impl Fn(&'a T) -> (&'a str, i64),
) -> Vec<&'a T> {
    let mut seen: HashSet<(&str, i64)> = HashSet::with_capacity(rows.len());
    let mut out: Vec<&T> = rows.iter().rev().filter(|r| seen.insert(key(*r))).collect();
    out.reverse();
    out
}

/// Insert-or-replace game rows keyed by `(game_id, team_id)`.
///
/// Every chunk runs in one transaction, so a constraint violation anywhere
/// leaves the table untouched. Rows identical to what is stored are skipped,
/// which keeps re-runs from rewriting `updated_at`. Returns the number of
/// rows inserted or changed. The `teams` registry is refreshed by the
/// table's statement trigger.
#[instrument(skip(db, records), fields(rows = records.len()))]
pub async fn upsert_game_stats(db: &Db, records: &[GameTeamRecord]) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    let uniques = dedupe_last(records, GameTeamRecord::key);

    let mut tx = db.pool.begin().await?;
    let mut written = 0usize;
    for chunk in uniques.chunks(CHUNK_ROWS) {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO team_game_stats (game_id, team_id, season_id, game_date, team_abbreviation, team_name, matchup, wl, pts, pts_opp, point_diff, home_away) ",
        );
        qb.push_values(chunk.iter().copied(), |mut b, r| {
            b.push_bind(&r.game_id)
                .push_bind(r.team_id)
                .push_bind(r.season_id.as_deref())
                .push_bind(r.game_date)
                .push_bind(&r.team_abbreviation)
                .push_bind(r.team_name.as_deref())
                .push_bind(&r.matchup)
                .push_bind(r.wl.map(WinLoss::as_code))
                .push_bind(r.pts)
                .push_bind(r.pts_opp)
                .push_bind(r.point_diff)
                .push_bind(r.home_away.as_str());
        });
        qb.push(
            " ON CONFLICT (game_id, team_id)
              DO UPDATE SET season_id = EXCLUDED.season_id,
                            game_date = EXCLUDED.game_date,
                            team_abbreviation = EXCLUDED.team_abbreviation,
                            team_name = EXCLUDED.team_name,
                            matchup = EXCLUDED.matchup,
                            wl = EXCLUDED.wl,
                            pts = EXCLUDED.pts,
                            pts_opp = EXCLUDED.pts_opp,
                            point_diff = EXCLUDED.point_diff,
                            home_away = EXCLUDED.home_away,
                            updated_at = now()
              WHERE (team_game_stats.season_id, team_game_stats.game_date, team_game_stats.team_abbreviation,
                     team_game_stats.team_name, team_game_stats.matchup, team_game_stats.wl, team_game_stats.pts,
                     team_game_stats.pts_opp, team_game_stats.point_diff, team_game_stats.home_away)
                    IS DISTINCT FROM
                    (EXCLUDED.season_id, EXCLUDED.game_date, EXCLUDED.team_abbreviation,
                     EXCLUDED.team_name, EXCLUDED.matchup, EXCLUDED.wl, EXCLUDED.pts,
                     EXCLUDED.pts_opp, EXCLUDED.point_diff, EXCLUDED.home_away)",
        );
        let res = qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("upsert into team_game_stats failed; batch rolled back")?;
        written += res.rows_affected() as usize;
    }
    tx.commit().await?;

    info!(
        submitted = records.len(),
        unique = uniques.len(),
        written,
        "upserted team game stats"
    );
    Ok(written)
}

#[derive(Debug, FromRow)]
struct GameStatsRow {
    game_id: String,
    team_id: i64,
    season_id: Option<String>,
    game_date: NaiveDate,
    team_abbreviation: String,
    team_name: Option<String>,
    matchup: String,
    wl: Option<String>,
    pts: Option<i32>,
    pts_opp: Option<i32>,
    point_diff: Option<i32>,
    home_away: String,
}

impl From<GameStatsRow> for GameTeamRecord {
    fn from(row: GameStatsRow) -> Self {
        GameTeamRecord {
            game_id: row.game_id,
            team_id: row.team_id,
            season_id: row.season_id,
            game_date: row.game_date,
            team_abbreviation: row.team_abbreviation,
            team_name: row.team_name,
            matchup: row.matchup,
            wl: row.wl.as_deref().and_then(WinLoss::parse),
            pts: row.pts,
            pts_opp: row.pts_opp,
            point_diff: row.point_diff,
            // CHECK constraint limits the column to HOME/AWAY
            home_away: if row.home_away == "HOME" {
                HomeAway::Home
            } else {
                HomeAway::Away
            },
        }
    }
}

/// Stored rows for one game, home team first.
pub async fn fetch_game_stats(db: &Db, game_id: &str) -> Result<Vec<GameTeamRecord>> {
    let rows = sqlx::query_as::<_, GameStatsRow>(
        "SELECT game_id, team_id, season_id, game_date, team_abbreviation, team_name, matchup,
                wl, pts, pts_opp, point_diff, home_away
         FROM team_game_stats
         WHERE game_id = $1
         ORDER BY home_away DESC, team_id",
    )
    .persistent(false)
    .bind(game_id)
    .fetch_all(&db.pool)
    .await?;
    Ok(rows.into_iter().map(GameTeamRecord::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_keeps_last_occurrence_in_order() {
        let rows: Vec<(&str, i64, i32)> = vec![("a", 1, 10), ("b", 2, 20), ("a", 1, 30), ("c", 3, 40)];
        let out = dedupe_last(&rows, |r| (r.0, r.1));
        let vals: Vec<i32> = out.iter().map(|r| r.2).collect();
        assert_eq!(vals, vec![20, 30, 40]);
    }
}
