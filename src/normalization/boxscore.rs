use std::collections::HashMap;
use tracing::debug;

use super::game::DataIntegrityError;
use crate::models::{BoxscoreRecord, GameTeamRecord};
use crate::stats_api::RawBoxscoreTeam;

/// Join boxscore rows onto already-normalized game rows by `(game_id, team_id)`.
///
/// The game log's `pts` stays the figure of record; the boxscore's own total
/// is kept in `pts_boxscore`. Game rows without a boxscore are simply not
/// emitted.
pub fn merge_boxscores(
    games: &[GameTeamRecord],
    boxscores: Vec<RawBoxscoreTeam>,
) -> (Vec<BoxscoreRecord>, Vec<DataIntegrityError>) {
    let by_key: HashMap<(&str, i64), &GameTeamRecord> =
        games.iter().map(|g| (g.key(), g)).collect();

    let mut merged = Vec::with_capacity(boxscores.len());
    let mut rejected = Vec::new();
    for b in boxscores {
        let Some(&game) = by_key.get(&(b.game_id.as_str(), b.team_id)) else {
            rejected.push(DataIntegrityError::OrphanBoxscore {
                game_id: b.game_id,
                team_id: b.team_id,
            });
            continue;
        };
        if b.pts.is_some() && b.pts != game.pts {
            debug!(
                game_id = %game.game_id,
                team = %game.team_abbreviation,
                game_log_pts = ?game.pts,
                boxscore_pts = ?b.pts,
                "boxscore points differ from game log"
            );
        }
        merged.push(BoxscoreRecord {
            game_id: b.game_id,
            team_id: b.team_id,
            game_date: game.game_date,
            team_abbreviation: b.team_abbreviation,
            team_name: b.team_name.or_else(|| game.team_name.clone()),
            fgm: b.fgm,
            fga: b.fga,
            fg_pct: b.fg_pct,
            fg3m: b.fg3m,
            fg3a: b.fg3a,
            fg3_pct: b.fg3_pct,
            ftm: b.ftm,
            fta: b.fta,
            ft_pct: b.ft_pct,
            oreb: b.oreb,
            dreb: b.dreb,
            reb: b.reb,
            ast: b.ast,
            stl: b.stl,
            blk: b.blk,
            tov: b.tov,
            pf: b.pf,
            plus_minus: b.plus_minus,
            pts: game.pts,
            pts_boxscore: b.pts,
        });
    }
    (merged, rejected)
}
