use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use nba_stats_sync::database_ops::db::{Db, DEFAULT_MIGRATIONS_DIR};
use nba_stats_sync::database_ops::teams;
use nba_stats_sync::logging::init_tracing;
use nba_stats_sync::stats_api::{GameLogQuery, Season, SeasonType, StatsApiClient};
use nba_stats_sync::util::env::{db_url, init_env, preflight_check};
use nba_stats_sync::{run_sync, SyncMode, SyncRequest};
use tracing::info;

const LOGGED_ENV: [&str; 8] = [
    "NBA_SYNC_DB_URL",
    "DATABASE_URL",
    "DB_HOST",
    "DB_MAX_CONNS",
    "AUTO_MIGRATE",
    "NBA_STATS_BASE_URL",
    "NBA_STATS_TIMEOUT_SECS",
    "NBA_STATS_DELAY_MS",
];

#[derive(Parser, Debug)]
#[command(name = "nba-sync", version, about = "Sync NBA team game stats into Postgres")]
struct Cli {
    /// Postgres URL; overrides NBA_SYNC_DB_URL / DATABASE_URL / DB_*
    #[arg(long, global = true)]
    db_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Command {
    /// Backfill every game of a season, optionally within a date window
    Season(SeasonArgs),
    /// Refresh the most recent N games
    Latest(LatestArgs),
    /// Apply pending SQL migrations
    Migrate {
        #[arg(long, default_value = DEFAULT_MIGRATIONS_DIR)]
        dir: PathBuf,
    },
    /// Run the team registry refresh by hand
    RefreshTeams,
    /// Print the team registry
    Teams,
}

#[derive(Debug, Args)]
struct SeasonArgs {
    /// Season as 2023-24 or 2023
    #[arg(long)]
    season: Season,
    /// First game date to include (YYYY-MM-DD)
    #[arg(long)]
    date_from: Option<NaiveDate>,
    /// Last game date to include (YYYY-MM-DD)
    #[arg(long)]
    date_to: Option<NaiveDate>,
    #[command(flatten)]
    fetch: FetchArgs,
}

#[derive(Debug, Args)]
struct LatestArgs {
    /// Number of most recent games to sync
    #[arg(long, default_value_t = 10)]
    games: usize,
    /// Season to look in; defaults to the one in progress
    #[arg(long)]
    season: Option<Season>,
    #[command(flatten)]
    fetch: FetchArgs,
}

#[derive(Debug, Args)]
struct FetchArgs {
    #[arg(long, value_enum, default_value_t = SeasonType::Regular)]
    season_type: SeasonType,
    /// Also fetch and store team boxscores for every synced game
    #[arg(long = "boxscores", action = ArgAction::SetTrue)]
    with_boxscores: bool,
    /// Fetch and normalize only; write nothing
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
}

impl Command {
    fn sync_request(&self) -> Option<(SyncRequest, bool)> {
        match self {
            Command::Season(a) => Some((
                SyncRequest {
                    mode: SyncMode::Season,
                    query: GameLogQuery::season(a.season)
                        .with_season_type(a.fetch.season_type)
                        .with_dates(a.date_from, a.date_to),
                    with_boxscores: a.fetch.with_boxscores,
                },
                a.fetch.dry_run,
            )),
            Command::Latest(a) => Some((
                SyncRequest {
                    mode: SyncMode::Latest { games: a.games },
                    query: GameLogQuery::season(a.season.unwrap_or_else(Season::current))
                        .with_season_type(a.fetch.season_type),
                    with_boxscores: a.fetch.with_boxscores,
                },
                a.fetch.dry_run,
            )),
            _ => None,
        }
    }
}

async fn connect(url_flag: Option<&str>) -> Result<Db> {
    let url = match url_flag {
        Some(url) => {
            preflight_check("nba-sync", &[], &LOGGED_ENV)?;
            url.to_string()
        }
        None => {
            preflight_check(
                "nba-sync",
                &["NBA_SYNC_DB_URL", "DATABASE_URL", "DB_URL", "DB_HOST"],
                &LOGGED_ENV,
            )?;
            db_url()?
        }
    };
    Db::connect(&url, Db::max_connections_from_env()).await
}

#[tokio::main]
async fn main() -> Result<()> {
    init_env();
    init_tracing("info,sqlx=warn")?;
    let cli = Cli::parse();

    if let Some((req, dry_run)) = cli.command.sync_request() {
        let client = StatsApiClient::from_env().context("building stats.nba.com client")?;
        let db = if dry_run { None } else { Some(connect(cli.db_url.as_deref()).await?) };
        info!(
            season = %req.query.season,
            mode = ?req.mode,
            boxscores = req.with_boxscores,
            dry_run,
            "starting sync"
        );
        let summary = run_sync(&client, db.as_ref(), &req).await?;
        println!("[nba-sync] {summary}");
        return Ok(());
    }

    match cli.command {
        Command::Migrate { dir } => {
            let db = connect(cli.db_url.as_deref()).await?;
            let applied = db.run_migrations(&dir).await?;
            println!("[nba-sync] applied {applied} migration(s)");
        }
        Command::RefreshTeams => {
            let db = connect(cli.db_url.as_deref()).await?;
            let touched = teams::refresh_teams(&db).await?;
            println!("[nba-sync] team registry refreshed: {touched} row(s) written");
        }
        Command::Teams => {
            let db = connect(cli.db_url.as_deref()).await?;
            for t in teams::list_teams(&db).await? {
                println!(
                    "{:>12}  {:<4} {}",
                    t.team_id,
                    t.team_abbreviation,
                    t.team_name.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Season(_) | Command::Latest(_) => {}
    }
    Ok(())
}
