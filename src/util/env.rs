//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in the binary (or rely on the lazy Once).
use std::str::FromStr;
use std::sync::Once;
use tracing::info;

static INIT: Once = Once::new();

/// Database URL keys, most specific first.
pub const DB_URL_KEYS: [&str; 3] = ["NBA_SYNC_DB_URL", "DATABASE_URL", "DB_URL"];

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        if dotenv::dotenv().is_err() {
            // Fallback to the crate root when run from elsewhere
            let candidate = format!("{}/.env", env!("CARGO_MANIFEST_DIR"));
            let _ = dotenv::from_filename(candidate);
        }
    });
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Boolean flag; accepts 1/true/on/yes (case-insensitive) as true.
pub fn env_flag(key: &str, default: bool) -> bool {
    init_env();
    match std::env::var(key) {
        Ok(raw) => parse_flag(&raw),
        Err(_) => default,
    }
}

fn parse_flag(raw: &str) -> bool {
    let v = raw.trim().to_ascii_lowercase();
    matches!(v.as_str(), "1" | "true" | "on" | "yes")
}

/// Composed database URL (tries specific -> generic). Returns first found.
pub fn db_url() -> anyhow::Result<String> {
    init_env();
    for k in DB_URL_KEYS {
        if let Some(v) = env_opt(k) {
            return Ok(v);
        }
    }

    if let Some(dsn) = build_dsn_from_parts() {
        info!(target = "env", "using DSN composed from DB_* variables");
        return Ok(dsn);
    }

    Err(anyhow::anyhow!(
        "no database URL env vars set ({})",
        DB_URL_KEYS.join(" | ")
    ))
}

fn build_dsn_from_parts() -> Option<String> {
    let host = env_opt("DB_HOST")?;
    let user = env_opt("DB_USERNAME")?;
    compose_dsn(
        &host,
        &user,
        env_opt("DB_PASSWORD").as_deref(),
        &env_opt("DB_DATABASE").unwrap_or_else(|| "postgres".into()),
        env_parse("DB_PORT", 5432u16),
        &env_opt("DB_SSLMODE").unwrap_or_else(|| "prefer".into()),
    )
}

/// Build a postgres DSN via `url::Url` so credentials with reserved
/// characters are percent-encoded.
pub fn compose_dsn(
    host: &str,
    user: &str,
    password: Option<&str>,
    database: &str,
    port: u16,
    ssl_mode: &str,
) -> Option<String> {
    let mut out = url::Url::parse("postgresql://localhost").ok()?;
    out.set_username(user).ok()?;
    if let Some(pass) = password {
        out.set_password(Some(pass)).ok()?;
    }

    let host_trimmed = host.trim().trim_matches(|c| c == '[' || c == ']');
    if host_trimmed.contains(':') {
        out.set_host(Some(&format!("[{host_trimmed}]"))).ok()?;
    } else {
        out.set_host(Some(host_trimmed)).ok()?;
    }

    out.set_port(Some(port)).ok()?;
    out.set_path(&format!("/{database}"));
    if ssl_mode != "disable" {
        out.query_pairs_mut().append_pair("sslmode", ssl_mode);
    }
    Some(out.to_string())
}

pub(crate) fn redact_value(key: &str, val: &str) -> String {
    let k = key.to_ascii_uppercase();
    if k.contains("PASSWORD") || k.contains("SECRET") || k.contains("TOKEN") {
        return "***".to_string();
    }

    let val_trim = val.trim();

    // Postgres DSNs are always redacted, whatever the key is called.
    if let Ok(mut u) = url::Url::parse(val_trim) {
        let scheme = u.scheme().to_ascii_lowercase();
        if scheme == "postgres" || scheme == "postgresql" {
            let _ = u.set_username("***");
            let _ = u.set_password(Some("***"));
            return u.to_string();
        }
    }

    val_trim.to_string()
}

/// Validate required keys and log a consolidated, redacted snapshot of configuration.
/// `required` is a list of alternatives: any one of them being set is enough.
pub fn preflight_check(title: &str, required: &[&str], also_log: &[&str]) -> anyhow::Result<()> {
    init_env();
    let snapshot: Vec<(String, String)> = also_log
        .iter()
        .map(|&k| {
            let v = env_opt(k).unwrap_or_default();
            (k.to_string(), redact_value(k, &v))
        })
        .collect();
    info!(target = "preflight", title, snapshot = ?snapshot, "configuration snapshot");

    if !required.is_empty() && required.iter().all(|k| env_opt(k).is_none()) {
        return Err(anyhow::anyhow!(
            "missing required env: one of {:?}",
            required
        ));
    }
    Ok(())
}
