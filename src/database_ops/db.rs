use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool, Row,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

use crate::util::env::{env_flag, env_parse};

pub const DEFAULT_MIGRATIONS_DIR: &str = "./migrations";

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let mut connect_options = PgConnectOptions::from_str(database_url)?;

        if database_url.contains("sslmode=require") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        // PgBouncer txn mode safe unless explicitly opted in
        if !env_flag("USE_PREPARED", false) {
            connect_options = connect_options.statement_cache_capacity(0);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await
            .context("failed to connect to database")?;
        info!(max_connections, "connected to db");

        let db = Self { pool };
        // Default OFF: the schema is normally managed with `nba-sync migrate`.
        if env_flag("AUTO_MIGRATE", false) {
            info!("running migrations (AUTO_MIGRATE=on)");
            db.run_migrations(Path::new(DEFAULT_MIGRATIONS_DIR)).await?;
        }
        Ok(db)
    }

    /// Pool size from `DB_MAX_CONNS`; the pipeline is sequential so two is plenty.
    pub fn max_connections_from_env() -> u32 {
        env_parse("DB_MAX_CONNS", 2u32)
    }
}

/// A migration file named `<version>_<description>.sql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub version: i64,
    pub description: String,
    pub path: PathBuf,
}

/// Parse `0001_team_game_stats.sql` into `(1, "team_game_stats")`.
/// Files without a numeric prefix or `.sql` suffix are ignored.
pub fn parse_migration_name(fname: &str) -> Option<(i64, String)> {
    let stem = fname.strip_suffix(".sql")?;
    let digits: String = stem.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let rest = stem[digits.len()..].strip_prefix('_')?;
    let version = digits.parse::<i64>().ok()?;
    Some((version, rest.to_string()))
}

/// Collect versioned migration files from `dir`, sorted by version.
pub fn collect_migrations(dir: &Path) -> Result<Vec<MigrationFile>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("reading migrations dir {}", dir.display()))?
    {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(fname) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some((version, description)) = parse_migration_name(fname) {
            out.push(MigrationFile {
                version,
                description,
                path,
            });
        }
    }
    out.sort_by_key(|m| m.version);
    Ok(out)
}

impl Db {
    /// Lightweight migration runner: applies every pending `NNNN_name.sql`
    /// file in `dir` and records it in `nba_sync_migrations`. Returns the number
    /// of files applied.
    /// Not interchangeable with `sqlx::migrate!`: the table layouts differ.
    pub async fn run_migrations(&self, dir: &Path) -> Result<usize> {
        if !dir.exists() {
            anyhow::bail!("migrations directory not found: {}", dir.display());
        }
        // raw_sql avoids prepared statements under PgBouncer and allows DO $$ bodies
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS nba_sync_migrations (
                version BIGINT PRIMARY KEY,
                description TEXT,
                installed_at TIMESTAMPTZ DEFAULT now()
             )",
        )
        .execute(&self.pool)
        .await?;

        let applied_rows = sqlx::raw_sql("SELECT version FROM nba_sync_migrations")
            .fetch_all(&self.pool)
            .await?;
        let mut applied: HashSet<i64> = HashSet::new();
        for r in applied_rows {
            applied.insert(r.try_get::<i64, _>(0)?);
        }

        let mut count = 0usize;
        for m in collect_migrations(dir)? {
            if applied.contains(&m.version) {
                continue;
            }
            let sql = std::fs::read_to_string(&m.path)?;
            info!(version = m.version, file = ?m.path, "applying migration");

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(&sql)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("migration {} failed", m.path.display()))?;
            sqlx::query("INSERT INTO nba_sync_migrations(version, description) VALUES ($1, $2)")
                .persistent(false)
                .bind(m.version)
                .bind(&m.description)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            applied.insert(m.version);
            count += 1;
        }
        info!(applied = count, "migrations up-to-date");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_versioned_names() {
        assert_eq!(
            parse_migration_name("0003_team_registry.sql"),
            Some((3, "team_registry".to_string()))
        );
        assert_eq!(parse_migration_name("README.md"), None);
        assert_eq!(parse_migration_name("database_settings.sql"), None);
        assert_eq!(parse_migration_name("0004.sql"), None);
    }

    #[test]
    fn shipped_migrations_are_ordered_and_unique() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
        let files = collect_migrations(&dir).expect("migrations dir");
        assert!(files.len() >= 3);
        let versions: Vec<i64> = files.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.dedup();
        assert_eq!(versions, sorted);
    }
}
