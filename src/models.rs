//! Normalized records as they are stored in Postgres.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Game outcome as reported by the provider (`WL` column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinLoss {
    Win,
    Loss,
}

impl WinLoss {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "W" => Some(Self::Win),
            "L" => Some(Self::Loss),
            _ => None,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::Win => "W",
            Self::Loss => "L",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HomeAway {
    Home,
    Away,
}

impl HomeAway {
    /// Side of the team named `own_abbreviation` in a provider matchup string.
    /// The matchup is written from that team's point of view, so its
    /// abbreviation must lead: for ATL, `ATL vs. BOS` is home and `ATL @ BOS`
    /// is away, while `BOS vs. ATL` is unrecognized.
    pub fn from_matchup(matchup: &str, own_abbreviation: &str) -> Option<Self> {
        let m = matchup.trim();
        // ASCII lowercasing keeps byte offsets aligned with `m`
        let lower = m.to_ascii_lowercase();
        let (side, lead) = match (m.find('@'), lower.find(" vs")) {
            (Some(at), None) => (Self::Away, &m[..at]),
            (None, Some(vs)) => (Self::Home, &m[..vs]),
            _ => return None,
        };
        let own = own_abbreviation.trim();
        (!own.is_empty() && lead.trim().eq_ignore_ascii_case(own)).then_some(side)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Home => "HOME",
            Self::Away => "AWAY",
        }
    }
}

impl fmt::Display for HomeAway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One team's participation in one game (`team_game_stats`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameTeamRecord {
    pub game_id: String,
    pub team_id: i64,
    pub season_id: Option<String>,
    pub game_date: NaiveDate,
    pub team_abbreviation: String,
    pub team_name: Option<String>,
    pub matchup: String,
    pub wl: Option<WinLoss>,
    pub pts: Option<i32>,
    pub pts_opp: Option<i32>,
    pub point_diff: Option<i32>,
    pub home_away: HomeAway,
}

impl GameTeamRecord {
    pub fn key(&self) -> (&str, i64) {
        (&self.game_id, self.team_id)
    }
}

/// Traditional boxscore line for one team in one game (`team_boxscore_stats`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoxscoreRecord {
    pub game_id: String,
    pub team_id: i64,
    pub game_date: NaiveDate,
    pub team_abbreviation: String,
    pub team_name: Option<String>,
    pub fgm: Option<i32>,
    pub fga: Option<i32>,
    pub fg_pct: Option<f64>,
    pub fg3m: Option<i32>,
    pub fg3a: Option<i32>,
    pub fg3_pct: Option<f64>,
    pub ftm: Option<i32>,
    pub fta: Option<i32>,
    pub ft_pct: Option<f64>,
    pub oreb: Option<i32>,
    pub dreb: Option<i32>,
    pub reb: Option<i32>,
    pub ast: Option<i32>,
    pub stl: Option<i32>,
    pub blk: Option<i32>,
    pub tov: Option<i32>,
    pub pf: Option<i32>,
    pub plus_minus: Option<f64>,
    /// Points from the game log; the figure of record.
    pub pts: Option<i32>,
    /// Points as reported by the boxscore endpoint.
    pub pts_boxscore: Option<i32>,
}

impl BoxscoreRecord {
    pub fn key(&self) -> (&str, i64) {
        (&self.game_id, self.team_id)
    }
}

/// Row of the `teams` registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamRecord {
    pub team_id: i64,
    pub team_abbreviation: String,
    pub team_name: Option<String>,
}
