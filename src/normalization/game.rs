use itertools::Itertools;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

use crate::models::{GameTeamRecord, HomeAway, WinLoss};
use crate::stats_api::RawTeamGame;

/// A game whose rows can't be turned into a home/away pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataIntegrityError {
    /// Not exactly two team rows for the game.
    UnpairedGame { game_id: String, rows: usize },
    /// Two rows, but not one home and one away.
    AmbiguousSides { game_id: String, matchups: Vec<String> },
    /// Matchup text carries neither `vs.` nor `@`.
    UnrecognizedMatchup { game_id: String, team_id: i64, matchup: String },
    /// Boxscore row without a matching game log row.
    OrphanBoxscore { game_id: String, team_id: i64 },
}

impl DataIntegrityError {
    pub fn game_id(&self) -> &str {
        match self {
            Self::UnpairedGame { game_id, .. }
            | Self::AmbiguousSides { game_id, .. }
            | Self::UnrecognizedMatchup { game_id, .. }
            | Self::OrphanBoxscore { game_id, .. } => game_id,
        }
    }
}

impl fmt::Display for DataIntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnpairedGame { game_id, rows } => {
                write!(f, "game {game_id}: expected 2 team rows, found {rows}")
            }
            Self::AmbiguousSides { game_id, matchups } => {
                write!(f, "game {game_id}: no single home/away pair in {matchups:?}")
            }
            Self::UnrecognizedMatchup {
                game_id,
                team_id,
                matchup,
            } => write!(
                f,
                "game {game_id}: team {team_id} matchup '{matchup}' has no home/away marker"
            ),
            Self::OrphanBoxscore { game_id, team_id } => {
                write!(f, "game {game_id}: boxscore for team {team_id} has no game log row")
            }
        }
    }
}

impl std::error::Error for DataIntegrityError {}

/// Output of one normalization pass.
#[derive(Debug, Default, Clone)]
pub struct NormalizedBatch {
    pub records: Vec<GameTeamRecord>,
    pub rejected: Vec<DataIntegrityError>,
    /// Rows whose provider W/L disagrees with the point differential.
    pub wl_mismatches: usize,
}

impl NormalizedBatch {
    pub fn games_accepted(&self) -> usize {
        self.records.len() / 2
    }

    pub fn game_ids(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.game_id.clone())
            .dedup()
            .collect()
    }
}

/// Pair the rows of each game and derive side, opponent points and point
/// differential. Malformed games are collected in `rejected`; the rest of
/// the batch is unaffected.
pub fn normalize_games(rows: Vec<RawTeamGame>) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    let groups = rows.into_iter().into_group_map_by(|r| r.game_id.clone());

    for (_, group) in groups.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
        match pair_game(group) {
            Ok((home, away)) => {
                for rec in [&home, &away] {
                    if wl_disagrees(rec) {
                        batch.wl_mismatches += 1;
                        warn!(
                            game_id = %rec.game_id,
                            team = %rec.team_abbreviation,
                            wl = ?rec.wl,
                            point_diff = ?rec.point_diff,
                            "provider W/L disagrees with point differential; keeping provider value"
                        );
                    }
                }
                batch.records.push(home);
                batch.records.push(away);
            }
            Err(err) => {
                warn!(game_id = err.game_id(), error = %err, "skipping game");
                batch.rejected.push(err);
            }
        }
    }

    batch.records.sort_by(|a, b| {
        (a.game_date, &a.game_id, a.home_away != HomeAway::Home).cmp(&(
            b.game_date,
            &b.game_id,
            b.home_away != HomeAway::Home,
        ))
    });
    debug!(
        records = batch.records.len(),
        rejected = batch.rejected.len(),
        "normalized game rows"
    );
    batch
}

fn pair_game(
    mut group: Vec<RawTeamGame>,
) -> Result<(GameTeamRecord, GameTeamRecord), DataIntegrityError> {
    if group.len() != 2 {
        return Err(DataIntegrityError::UnpairedGame {
            game_id: group[0].game_id.clone(),
            rows: group.len(),
        });
    }
    let game_id = group[0].game_id.clone();

    let mut sides = Vec::with_capacity(2);
    for r in &group {
        let side = HomeAway::from_matchup(&r.matchup, &r.team_abbreviation).ok_or_else(|| {
            DataIntegrityError::UnrecognizedMatchup {
                game_id: game_id.clone(),
                team_id: r.team_id,
                matchup: r.matchup.clone(),
            }
        })?;
        sides.push(side);
    }
    if sides[0] == sides[1] || group[0].team_id == group[1].team_id {
        return Err(DataIntegrityError::AmbiguousSides {
            game_id,
            matchups: group.iter().map(|r| r.matchup.clone()).collect(),
        });
    }

    if sides[0] == HomeAway::Away {
        group.swap(0, 1);
    }
    let mut it = group.into_iter();
    let (Some(home_raw), Some(away_raw)) = (it.next(), it.next()) else {
        return Err(DataIntegrityError::UnpairedGame { game_id, rows: 0 });
    };

    let home = derive(home_raw, HomeAway::Home, away_raw.pts);
    let away = derive(away_raw, HomeAway::Away, home.pts);
    Ok((home, away))
}

fn derive(raw: RawTeamGame, side: HomeAway, pts_opp: Option<i32>) -> GameTeamRecord {
    let point_diff = match (raw.pts, pts_opp) {
        (Some(own), Some(opp)) => Some(own - opp),
        _ => None,
    };
    GameTeamRecord {
        game_id: raw.game_id,
        team_id: raw.team_id,
        season_id: raw.season_id,
        game_date: raw.game_date,
        team_abbreviation: raw.team_abbreviation,
        team_name: raw.team_name,
        matchup: raw.matchup,
        wl: raw.wl,
        pts: raw.pts,
        pts_opp,
        point_diff,
        home_away: side,
    }
}

fn wl_disagrees(rec: &GameTeamRecord) -> bool {
    match (rec.wl, rec.point_diff) {
        (Some(WinLoss::Win), Some(d)) => d <= 0,
        (Some(WinLoss::Loss), Some(d)) => d >= 0,
        _ => false,
    }
}

/// The `n` most recent distinct game ids, newest first.
pub fn latest_game_ids(rows: &[RawTeamGame], n: usize) -> HashSet<String> {
    rows.iter()
        .map(|r| (r.game_date, r.game_id.as_str()))
        .sorted_by(|a, b| b.cmp(a))
        .map(|(_, id)| id)
        .dedup()
        .take(n)
        .map(str::to_string)
        .collect()
}
