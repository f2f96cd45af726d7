use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::result_set::{find_result_set, parse_result_sets, ResultSet};
use super::types::{GameLogQuery, RawBoxscoreTeam, RawTeamGame};
use super::{StatsApiError, StatsProvider};
use crate::models::WinLoss;
use crate::util::env::{env_opt, env_parse};

pub const DEFAULT_BASE_URL: &str = "https://stats.nba.com/stats";
const LEAGUE_ID_NBA: &str = "00";
const GAME_FINDER_SET: &str = "LeagueGameFinderResults";
const BOXSCORE_TEAM_SET: &str = "TeamStats";

/// stats.nba.com client.
///
/// Endpoints used:
/// - GET /leaguegamefinder?PlayerOrTeam=T&LeagueID=00&Season=..&SeasonType=..
/// - GET /boxscoretraditionalv2?GameID=..
///
/// The service drops requests that don't look like they come from the
/// stats.nba.com web app, hence the browser-style default headers.
#[derive(Debug, Clone)]
pub struct StatsApiClient {
    base_url: String,
    http: Client,
    request_delay: Duration,
}

impl StatsApiClient {
    pub fn new(base_url: Option<&str>, timeout_secs: Option<u64>) -> Result<Self, StatsApiError> {
        let base_url = base_url
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let http = Client::builder()
            .user_agent(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
            )
            .default_headers(default_headers())
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(30)))
            .build()
            .map_err(|e| StatsApiError::Network(e, base_url.clone()))?;

        Ok(Self {
            base_url,
            http,
            request_delay: Duration::ZERO,
        })
    }

    /// Client configured from `NBA_STATS_BASE_URL`, `NBA_STATS_TIMEOUT_SECS`
    /// and `NBA_STATS_DELAY_MS`.
    pub fn from_env() -> Result<Self, StatsApiError> {
        let base = env_opt("NBA_STATS_BASE_URL");
        let timeout = env_parse("NBA_STATS_TIMEOUT_SECS", 30u64);
        let delay_ms = env_parse("NBA_STATS_DELAY_MS", 600u64);
        Ok(Self::new(base.as_deref(), Some(timeout))?
            .with_request_delay(Duration::from_millis(delay_ms)))
    }

    /// Pause before each boxscore request; the provider throttles bursts.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    async fn get_json(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, StatsApiError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let resp = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| StatsApiError::Network(e, url.clone()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StatsApiError::Status(status, url));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| StatsApiError::Parsing(e, url))
    }
}

fn default_headers() -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    h.insert(ORIGIN, HeaderValue::from_static("https://www.nba.com"));
    h.insert(REFERER, HeaderValue::from_static("https://www.nba.com/"));
    h.insert("x-nba-stats-origin", HeaderValue::from_static("stats"));
    h.insert("x-nba-stats-token", HeaderValue::from_static("true"));
    h
}

pub(crate) fn game_log_params(query: &GameLogQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("PlayerOrTeam", "T".to_string()),
        ("LeagueID", LEAGUE_ID_NBA.to_string()),
        ("Season", query.season.to_string()),
        ("SeasonType", query.season_type.as_param().to_string()),
    ];
    if let Some(d) = query.date_from {
        params.push(("DateFrom", d.format("%m/%d/%Y").to_string()));
    }
    if let Some(d) = query.date_to {
        params.push(("DateTo", d.format("%m/%d/%Y").to_string()));
    }
    params
}

pub(crate) fn parse_team_games(set: &ResultSet) -> Result<Vec<RawTeamGame>, StatsApiError> {
    let mut out = Vec::with_capacity(set.row_set.len());
    for row in set.rows() {
        let row = row?;
        out.push(RawTeamGame {
            season_id: row.opt_str("SEASON_ID"),
            team_id: row.i64("TEAM_ID")?,
            team_abbreviation: row.str("TEAM_ABBREVIATION")?,
            team_name: row.opt_str("TEAM_NAME"),
            game_id: row.str("GAME_ID")?,
            game_date: row.date("GAME_DATE")?,
            matchup: row.str("MATCHUP")?,
            wl: row.opt_str("WL").as_deref().and_then(WinLoss::parse),
            pts: row.opt_i32("PTS"),
        });
    }
    Ok(out)
}

pub(crate) fn parse_boxscore_teams(set: &ResultSet) -> Result<Vec<RawBoxscoreTeam>, StatsApiError> {
    let mut out = Vec::with_capacity(set.row_set.len());
    for row in set.rows() {
        let row = row?;
        // Newer payloads spell the team name as city + nickname.
        let team_name = match (row.opt_str("TEAM_CITY"), row.opt_str("TEAM_NAME")) {
            (Some(city), Some(name)) if !name.starts_with(&city) => Some(format!("{city} {name}")),
            (_, name) => name,
        };
        out.push(RawBoxscoreTeam {
            game_id: row.str("GAME_ID")?,
            team_id: row.i64("TEAM_ID")?,
            team_abbreviation: row.str("TEAM_ABBREVIATION")?,
            team_name,
            fgm: row.opt_i32("FGM"),
            fga: row.opt_i32("FGA"),
            fg_pct: row.opt_f64("FG_PCT"),
            fg3m: row.opt_i32("FG3M"),
            fg3a: row.opt_i32("FG3A"),
            fg3_pct: row.opt_f64("FG3_PCT"),
            ftm: row.opt_i32("FTM"),
            fta: row.opt_i32("FTA"),
            ft_pct: row.opt_f64("FT_PCT"),
            oreb: row.opt_i32("OREB"),
            dreb: row.opt_i32("DREB"),
            reb: row.opt_i32("REB"),
            ast: row.opt_i32("AST"),
            stl: row.opt_i32("STL"),
            blk: row.opt_i32("BLK"),
            tov: row.opt_i32("TO").or_else(|| row.opt_i32("TOV")),
            pf: row.opt_i32("PF"),
            pts: row.opt_i32("PTS"),
            plus_minus: row.opt_f64("PLUS_MINUS"),
        });
    }
    Ok(out)
}

#[async_trait]
impl StatsProvider for StatsApiClient {
    #[instrument(skip(self), fields(season = %query.season))]
    async fn fetch_team_game_logs(
        &self,
        query: &GameLogQuery,
    ) -> Result<Vec<RawTeamGame>, StatsApiError> {
        let body = self
            .get_json("leaguegamefinder", &game_log_params(query))
            .await?;
        let sets = parse_result_sets(&body)?;
        let rows = parse_team_games(find_result_set(&sets, GAME_FINDER_SET)?)?;
        info!(rows = rows.len(), "fetched team game logs");
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn fetch_boxscore_teams(
        &self,
        game_id: &str,
    ) -> Result<Vec<RawBoxscoreTeam>, StatsApiError> {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
        let params = [
            ("GameID", game_id.to_string()),
            ("StartPeriod", "0".to_string()),
            ("EndPeriod", "10".to_string()),
            ("StartRange", "0".to_string()),
            ("EndRange", "28800".to_string()),
            ("RangeType", "0".to_string()),
        ];
        let body = self.get_json("boxscoretraditionalv2", &params).await?;
        let sets = parse_result_sets(&body)?;
        let rows = parse_boxscore_teams(find_result_set(&sets, BOXSCORE_TEAM_SET)?)?;
        debug!(rows = rows.len(), "fetched boxscore team rows");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats_api::types::{Season, SeasonType};
    use chrono::NaiveDate;
    use mockito::Matcher;
    use serde_json::json;

    fn game_finder_body() -> String {
        json!({
            "resource": "leaguegamefinder",
            "parameters": {},
            "resultSets": [{
                "name": "LeagueGameFinderResults",
                "headers": ["SEASON_ID", "TEAM_ID", "TEAM_ABBREVIATION", "TEAM_NAME", "GAME_ID",
                            "GAME_DATE", "MATCHUP", "WL", "MIN", "PTS"],
                "rowSet": [
                    ["22023", 1610612737, "ATL", "Atlanta Hawks", "0022300061", "2023-10-25", "ATL vs. CHA", "L", 240, 110],
                    ["22023", 1610612766, "CHA", "Charlotte Hornets", "0022300061", "2023-10-25", "CHA @ ATL", "W", 240, 116]
                ]
            }]
        })
        .to_string()
    }

    #[test]
    fn game_log_params_include_optional_dates() {
        let q = GameLogQuery::season(Season::new(2023))
            .with_season_type(SeasonType::Playoffs)
            .with_dates(NaiveDate::from_ymd_opt(2024, 4, 20), None);
        let params = game_log_params(&q);
        assert!(params.contains(&("Season", "2023-24".to_string())));
        assert!(params.contains(&("SeasonType", "Playoffs".to_string())));
        assert!(params.contains(&("DateFrom", "04/20/2024".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "DateTo"));
    }

    #[tokio::test]
    async fn fetches_and_parses_team_game_logs() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/leaguegamefinder")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("PlayerOrTeam".into(), "T".into()),
                Matcher::UrlEncoded("Season".into(), "2023-24".into()),
                Matcher::UrlEncoded("SeasonType".into(), "Regular Season".into()),
            ]))
            .match_header("x-nba-stats-origin", "stats")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(game_finder_body())
            .create_async()
            .await;

        let client = StatsApiClient::new(Some(&server.url()), Some(5)).unwrap();
        let rows = client
            .fetch_team_game_logs(&GameLogQuery::season(Season::new(2023)))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].team_abbreviation, "ATL");
        assert_eq!(rows[0].team_name.as_deref(), Some("Atlanta Hawks"));
        assert_eq!(rows[0].wl, Some(WinLoss::Loss));
        assert_eq!(rows[1].pts, Some(116));
        assert_eq!(rows[1].season_id.as_deref(), Some("22023"));
    }

    #[tokio::test]
    async fn fetches_boxscore_team_stats() {
        let body = json!({
            "resultSets": [
                { "name": "PlayerStats", "headers": ["GAME_ID"], "rowSet": [] },
                {
                    "name": "TeamStats",
                    "headers": ["GAME_ID", "TEAM_ID", "TEAM_NAME", "TEAM_ABBREVIATION", "TEAM_CITY",
                                "FGM", "FGA", "FG_PCT", "FG3M", "FG3A", "FG3_PCT", "FTM", "FTA", "FT_PCT",
                                "OREB", "DREB", "REB", "AST", "STL", "BLK", "TO", "PF", "PTS", "PLUS_MINUS"],
                    "rowSet": [
                        ["0022300061", 1610612737, "Hawks", "ATL", "Atlanta",
                         40, 88, 0.455, 12, 35, 0.343, 18, 22, 0.818,
                         10, 33, 43, 25, 7, 5, 13, 19, 110, -6.0]
                    ]
                }
            ]
        })
        .to_string();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/boxscoretraditionalv2")
            .match_query(Matcher::UrlEncoded("GameID".into(), "0022300061".into()))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = StatsApiClient::new(Some(&server.url()), Some(5)).unwrap();
        let rows = client.fetch_boxscore_teams("0022300061").await.unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.team_name.as_deref(), Some("Atlanta Hawks"));
        assert_eq!(r.fg3m, Some(12));
        assert_eq!(r.tov, Some(13));
        assert_eq!(r.pts, Some(110));
        assert_eq!(r.plus_minus, Some(-6.0));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/leaguegamefinder")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let client = StatsApiClient::new(Some(&server.url()), Some(5)).unwrap();
        let err = client
            .fetch_team_game_logs(&GameLogQuery::season(Season::new(2023)))
            .await
            .unwrap_err();
        assert!(matches!(err, StatsApiError::Status(code, _) if code.as_u16() == 503));
    }

    #[tokio::test]
    async fn body_without_result_sets_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/leaguegamefinder")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"message": "An error has occurred."}"#)
            .create_async()
            .await;

        let client = StatsApiClient::new(Some(&server.url()), Some(5)).unwrap();
        let err = client
            .fetch_team_game_logs(&GameLogQuery::season(Season::new(2023)))
            .await
            .unwrap_err();
        assert!(matches!(err, StatsApiError::Malformed(_)));
    }
}
