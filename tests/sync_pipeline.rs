//! End-to-end runs of the sync pipeline against canned provider data.
//! No database is involved: every run here is a dry run.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

use nba_stats_sync::models::WinLoss;
use nba_stats_sync::stats_api::{
    GameLogQuery, RawBoxscoreTeam, RawTeamGame, Season, StatsApiError, StatsProvider,
};
use nba_stats_sync::{run_sync, SyncMode, SyncRequest};

#[derive(Default)]
struct CannedProvider {
    games: Vec<RawTeamGame>,
    boxscores: HashMap<String, Vec<RawBoxscoreTeam>>,
    fail_boxscore_for: Option<String>,
    boxscore_calls: Mutex<Vec<String>>,
}

#[async_trait]
impl StatsProvider for CannedProvider {
    async fn fetch_team_game_logs(
        &self,
        _query: &GameLogQuery,
    ) -> Result<Vec<RawTeamGame>, StatsApiError> {
        Ok(self.games.clone())
    }

    async fn fetch_boxscore_teams(
        &self,
        game_id: &str,
    ) -> Result<Vec<RawBoxscoreTeam>, StatsApiError> {
        self.boxscore_calls.lock().unwrap().push(game_id.to_string());
        if self.fail_boxscore_for.as_deref() == Some(game_id) {
            return Err(StatsApiError::Malformed(format!("no TeamStats for {game_id}")));
        }
        Ok(self.boxscores.get(game_id).cloned().unwrap_or_default())
    }
}

fn row(
    game_id: &str,
    day: u32,
    team_id: i64,
    abbr: &str,
    matchup: &str,
    wl: &str,
    pts: i32,
) -> RawTeamGame {
    RawTeamGame {
        season_id: Some("22023".into()),
        team_id,
        team_abbreviation: abbr.into(),
        team_name: None,
        game_id: game_id.into(),
        game_date: NaiveDate::from_ymd_opt(2023, 11, day).unwrap(),
        matchup: matchup.into(),
        wl: WinLoss::parse(wl),
        pts: Some(pts),
    }
}

fn boxscore(game_id: &str, team_id: i64, abbr: &str, pts: i32) -> RawBoxscoreTeam {
    RawBoxscoreTeam {
        game_id: game_id.into(),
        team_id,
        team_abbreviation: abbr.into(),
        pts: Some(pts),
        reb: Some(44),
        ..RawBoxscoreTeam::default()
    }
}

fn season_request(with_boxscores: bool) -> SyncRequest {
    SyncRequest {
        mode: SyncMode::Season,
        query: GameLogQuery::season(Season::new(2023)),
        with_boxscores,
    }
}

#[tokio::test]
async fn pairs_games_and_counts_rejections() {
    let provider = CannedProvider {
        games: vec![
            row("1001", 1, 1, "AAA", "AAA vs. BBB", "W", 110),
            row("1001", 1, 2, "BBB", "BBB @ AAA", "L", 102),
            // opponent row missing from the feed
            row("1002", 2, 3, "CCC", "CCC vs. DDD", "W", 99),
        ],
        ..CannedProvider::default()
    };

    let summary = run_sync(&provider, None, &season_request(false))
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.fetched_rows, 3);
    assert_eq!(summary.games_accepted, 1);
    assert_eq!(summary.games_rejected, 1);
    assert_eq!(summary.wl_mismatches, 0);
    assert_eq!(summary.game_rows_written, 0);
    assert!(provider.boxscore_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn latest_mode_only_syncs_most_recent_games() {
    let provider = CannedProvider {
        games: vec![
            row("2001", 3, 1, "AAA", "AAA vs. BBB", "W", 100),
            row("2001", 3, 2, "BBB", "BBB @ AAA", "L", 90),
            row("2002", 5, 3, "CCC", "CCC @ DDD", "L", 95),
            row("2002", 5, 4, "DDD", "DDD vs. CCC", "W", 101),
            row("2003", 7, 1, "AAA", "AAA @ CCC", "W", 120),
            row("2003", 7, 3, "CCC", "CCC vs. AAA", "L", 111),
        ],
        ..CannedProvider::default()
    };
    let req = SyncRequest {
        mode: SyncMode::Latest { games: 2 },
        query: GameLogQuery::season(Season::new(2023)),
        with_boxscores: true,
    };

    let summary = run_sync(&provider, None, &req).await.unwrap();

    assert_eq!(summary.fetched_rows, 6);
    assert_eq!(summary.games_accepted, 2);
    let mut calls = provider.boxscore_calls.lock().unwrap().clone();
    calls.sort();
    assert_eq!(calls, vec!["2002".to_string(), "2003".to_string()]);
}

#[tokio::test]
async fn merges_boxscores_and_rejects_orphans() {
    let mut boxscores = HashMap::new();
    boxscores.insert(
        "1001".to_string(),
        vec![
            boxscore("1001", 1, "AAA", 110),
            boxscore("1001", 2, "BBB", 102),
            // team that never appeared in the game log
            boxscore("1001", 9, "ZZZ", 0),
        ],
    );
    let provider = CannedProvider {
        games: vec![
            row("1001", 1, 1, "AAA", "AAA vs. BBB", "W", 110),
            row("1001", 1, 2, "BBB", "BBB @ AAA", "L", 102),
        ],
        boxscores,
        ..CannedProvider::default()
    };

    let summary = run_sync(&provider, None, &season_request(true))
        .await
        .unwrap();

    assert_eq!(summary.boxscore_rows_fetched, 3);
    assert_eq!(summary.boxscore_rows_rejected, 1);
    assert_eq!(summary.boxscore_rows_written, 0);
}

#[tokio::test]
async fn wl_disagreement_is_reported() {
    let provider = CannedProvider {
        games: vec![
            // provider says the losing side won
            row("3001", 4, 1, "AAA", "AAA vs. BBB", "L", 110),
            row("3001", 4, 2, "BBB", "BBB @ AAA", "W", 102),
        ],
        ..CannedProvider::default()
    };

    let summary = run_sync(&provider, None, &season_request(false))
        .await
        .unwrap();

    assert_eq!(summary.games_accepted, 1);
    assert_eq!(summary.wl_mismatches, 2);
}

#[tokio::test]
async fn boxscore_fetch_failure_aborts_the_run() {
    let provider = CannedProvider {
        games: vec![
            row("1001", 1, 1, "AAA", "AAA vs. BBB", "W", 110),
            row("1001", 1, 2, "BBB", "BBB @ AAA", "L", 102),
        ],
        fail_boxscore_for: Some("1001".into()),
        ..CannedProvider::default()
    };

    let err = run_sync(&provider, None, &season_request(true))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("1001"));
}
