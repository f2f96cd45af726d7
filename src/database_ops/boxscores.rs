use anyhow::{Context, Result};
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::{info, instrument};

use super::db::Db;
use super::game_stats::dedupe_last;
use crate::models::BoxscoreRecord;

// 25 binds per row
const CHUNK_ROWS: usize = 500;

const COLUMNS: &str = "game_id, team_id, game_date, team_abbreviation, team_name, \
    fgm, fga, fg_pct, fg3m, fg3a, fg3_pct, ftm, fta, ft_pct, \
    oreb, dreb, reb, ast, stl, blk, tov, pf, plus_minus, pts, pts_boxscore";

/// Non-key columns, in `COLUMNS` order.
const UPDATE_COLUMNS: [&str; 23] = [
    "game_date",
    "team_abbreviation",
    "team_name",
    "fgm",
    "fga",
    "fg_pct",
    "fg3m",
    "fg3a",
    "fg3_pct",
    "ftm",
    "fta",
    "ft_pct",
    "oreb",
    "dreb",
    "reb",
    "ast",
    "stl",
    "blk",
    "tov",
    "pf",
    "plus_minus",
    "pts",
    "pts_boxscore",
];

fn on_conflict_clause() -> String {
    let set = UPDATE_COLUMNS
        .iter()
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let current = UPDATE_COLUMNS
        .iter()
        .map(|c| format!("team_boxscore_stats.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let incoming = UPDATE_COLUMNS
        .iter()
        .map(|c| format!("EXCLUDED.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        " ON CONFLICT (game_id, team_id) DO UPDATE SET {set}, updated_at = now() \
          WHERE ({current}) IS DISTINCT FROM ({incoming})"
    )
}

/// Insert-or-replace boxscore rows keyed by `(game_id, team_id)`, same
/// all-or-nothing transaction policy as the game rows.
#[instrument(skip(db, records), fields(rows = records.len()))]
pub async fn upsert_boxscores(db: &Db, records: &[BoxscoreRecord]) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    let uniques = dedupe_last(records, BoxscoreRecord::key);
    let conflict = on_conflict_clause();

    let mut tx = db.pool.begin().await?;
    let mut written = 0usize;
    for chunk in uniques.chunks(CHUNK_ROWS) {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("INSERT INTO team_boxscore_stats ({COLUMNS}) "));
        qb.push_values(chunk.iter().copied(), |mut b, r| {
            b.push_bind(&r.game_id)
                .push_bind(r.team_id)
                .push_bind(r.game_date)
                .push_bind(&r.team_abbreviation)
                .push_bind(r.team_name.as_deref())
                .push_bind(r.fgm)
                .push_bind(r.fga)
                .push_bind(r.fg_pct)
                .push_bind(r.fg3m)
                .push_bind(r.fg3a)
                .push_bind(r.fg3_pct)
                .push_bind(r.ftm)
                .push_bind(r.fta)
                .push_bind(r.ft_pct)
                .push_bind(r.oreb)
                .push_bind(r.dreb)
                .push_bind(r.reb)
                .push_bind(r.ast)
                .push_bind(r.stl)
                .push_bind(r.blk)
                .push_bind(r.tov)
                .push_bind(r.pf)
                .push_bind(r.plus_minus)
                .push_bind(r.pts)
                .push_bind(r.pts_boxscore);
        });
        qb.push(&conflict);
        let res = qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("upsert into team_boxscore_stats failed; batch rolled back")?;
        written += res.rows_affected() as usize;
    }
    tx.commit().await?;

    info!(submitted = records.len(), written, "upserted team boxscores");
    Ok(written)
}

#[derive(Debug, FromRow)]
struct BoxscoreRow {
    game_id: String,
    team_id: i64,
    game_date: chrono::NaiveDate,
    team_abbreviation: String,
    team_name: Option<String>,
    fgm: Option<i32>,
    fga: Option<i32>,
    fg_pct: Option<f64>,
    fg3m: Option<i32>,
    fg3a: Option<i32>,
    fg3_pct: Option<f64>,
    ftm: Option<i32>,
    fta: Option<i32>,
    ft_pct: Option<f64>,
    oreb: Option<i32>,
    dreb: Option<i32>,
    reb: Option<i32>,
    ast: Option<i32>,
    stl: Option<i32>,
    blk: Option<i32>,
    tov: Option<i32>,
    pf: Option<i32>,
    plus_minus: Option<f64>,
    pts: Option<i32>,
    pts_boxscore: Option<i32>,
}

impl From<BoxscoreRow> for BoxscoreRecord {
    fn from(r: BoxscoreRow) -> Self {
        BoxscoreRecord {
            game_id: r.game_id,
            team_id: r.team_id,
            game_date: r.game_date,
            team_abbreviation: r.team_abbreviation,
            team_name: r.team_name,
            fgm: r.fgm,
            fga: r.fga,
            fg_pct: r.fg_pct,
            fg3m: r.fg3m,
            fg3a: r.fg3a,
            fg3_pct: r.fg3_pct,
            ftm: r.ftm,
            fta: r.fta,
            ft_pct: r.ft_pct,
            oreb: r.oreb,
            dreb: r.dreb,
            reb: r.reb,
            ast: r.ast,
            stl: r.stl,
            blk: r.blk,
            tov: r.tov,
            pf: r.pf,
            plus_minus: r.plus_minus,
            pts: r.pts,
            pts_boxscore: r.pts_boxscore,
        }
    }
}

pub async fn fetch_boxscores(db: &Db, game_id: &str) -> Result<Vec<BoxscoreRecord>> {
    let rows = sqlx::query_as::<_, BoxscoreRow>(&format!(
        "SELECT {COLUMNS} FROM team_boxscore_stats WHERE game_id = $1 ORDER BY team_id"
    ))
    .persistent(false)
    .bind(game_id)
    .fetch_all(&db.pool)
    .await?;
    Ok(rows.into_iter().map(BoxscoreRecord::from).collect())
}
