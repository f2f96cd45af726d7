//! Remote stats provider: the fetch seam the pipeline depends on, plus the
//! stats.nba.com implementation.

pub mod client;
pub mod result_set;
pub mod types;

use async_trait::async_trait;
use std::fmt;

pub use client::StatsApiClient;
pub use types::{GameLogQuery, RawBoxscoreTeam, RawTeamGame, Season, SeasonType};

/// Narrow fetch interface so normalization and the pipeline can run against
/// canned data.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Team game log rows (two per game) matching `query`.
    async fn fetch_team_game_logs(
        &self,
        query: &GameLogQuery,
    ) -> Result<Vec<RawTeamGame>, StatsApiError>;

    /// Team rows of the traditional boxscore for one game.
    async fn fetch_boxscore_teams(
        &self,
        game_id: &str,
    ) -> Result<Vec<RawBoxscoreTeam>, StatsApiError>;
}

#[derive(Debug)]
pub enum StatsApiError {
    Network(reqwest::Error, String),
    Status(reqwest::StatusCode, String),
    Parsing(reqwest::Error, String),
    Malformed(String),
}

impl fmt::Display for StatsApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsApiError::Network(e, url) => write!(f, "network error for {url}: {e}"),
            StatsApiError::Status(code, url) => write!(f, "provider returned {code} for {url}"),
            StatsApiError::Parsing(e, url) => write!(f, "parse error for {url}: {e}"),
            StatsApiError::Malformed(msg) => write!(f, "malformed provider response: {msg}"),
        }
    }
}

impl std::error::Error for StatsApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StatsApiError::Network(e, _) | StatsApiError::Parsing(e, _) => Some(e),
            _ => None,
        }
    }
}
