use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::WinLoss;

/// NBA season identified by its starting year, rendered as `2023-24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Season {
    start_year: i32,
}

impl Season {
    pub fn new(start_year: i32) -> Self {
        Self { start_year }
    }

    pub fn start_year(self) -> i32 {
        self.start_year
    }

    /// Season in progress on `date`. Seasons tip off in October.
    pub fn containing(date: NaiveDate) -> Self {
        if date.month() >= 10 {
            Self::new(date.year())
        } else {
            Self::new(date.year() - 1)
        }
    }

    pub fn current() -> Self {
        Self::containing(chrono::Utc::now().date_naive())
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02}",
            self.start_year,
            (self.start_year + 1).rem_euclid(100)
        )
    }
}

impl FromStr for Season {
    type Err = String;

    /// Accepts `2023-24` or a bare start year `2023`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (start, end) = match s.split_once('-') {
            Some((a, b)) => (a, Some(b)),
            None => (s, None),
        };
        if start.len() != 4 {
            return Err(format!("invalid season '{s}': expected YYYY or YYYY-YY"));
        }
        let start_year: i32 = start
            .parse()
            .map_err(|_| format!("invalid season '{s}': bad start year"))?;
        if let Some(end) = end {
            let expected = (start_year + 1).rem_euclid(100);
            let got: i32 = end
                .parse()
                .map_err(|_| format!("invalid season '{s}': bad end year"))?;
            if end.len() != 2 || got != expected {
                return Err(format!(
                    "invalid season '{s}': expected {start_year}-{expected:02}"
                ));
            }
        }
        Ok(Self::new(start_year))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SeasonType {
    #[default]
    #[value(name = "regular", alias = "regular-season")]
    Regular,
    Playoffs,
    #[value(name = "pre-season", alias = "preseason")]
    PreSeason,
    #[value(name = "play-in", alias = "playin")]
    PlayIn,
    #[value(name = "all-star", alias = "allstar")]
    AllStar,
}

impl SeasonType {
    /// Value the provider expects in its `SeasonType` parameter.
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Regular => "Regular Season",
            Self::Playoffs => "Playoffs",
            Self::PreSeason => "Pre Season",
            Self::PlayIn => "PlayIn",
            Self::AllStar => "All Star",
        }
    }
}

/// Parameters for a team game log fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLogQuery {
    pub season: Season,
    pub season_type: SeasonType,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl GameLogQuery {
    pub fn season(season: Season) -> Self {
        Self {
            season,
            season_type: SeasonType::default(),
            date_from: None,
            date_to: None,
        }
    }

    pub fn with_season_type(mut self, season_type: SeasonType) -> Self {
        self.season_type = season_type;
        self
    }

    pub fn with_dates(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }
}

/// Team game log row as delivered by the provider, before pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTeamGame {
    pub season_id: Option<String>,
    pub team_id: i64,
    pub team_abbreviation: String,
    pub team_name: Option<String>,
    pub game_id: String,
    pub game_date: NaiveDate,
    pub matchup: String,
    pub wl: Option<WinLoss>,
    pub pts: Option<i32>,
}

/// Team row of a traditional boxscore.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawBoxscoreTeam {
    pub game_id: String,
    pub team_id: i64,
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
    pub pts: Option<i32>,
    pub plus_minus: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_round_trips_provider_form() {
        let s: Season = "2023-24".parse().unwrap();
        assert_eq!(s.start_year(), 2023);
        assert_eq!(s.to_string(), "2023-24");
        assert_eq!("1999".parse::<Season>().unwrap().to_string(), "1999-00");
    }

    #[test]
    fn season_rejects_mismatched_years() {
        assert!("2023-25".parse::<Season>().is_err());
        assert!("23-24".parse::<Season>().is_err());
        assert!("2023-2024".parse::<Season>().is_err());
        assert!("abcd".parse::<Season>().is_err());
    }

    #[test]
    fn season_containing_date_switches_in_october() {
        let sept = NaiveDate::from_ymd_opt(2024, 9, 30).unwrap();
        let oct = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        assert_eq!(Season::containing(sept).to_string(), "2023-24");
        assert_eq!(Season::containing(oct).to_string(), "2024-25");
    }
}
