//! Process-wide tracing setup for `nba-sync`.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Install the fmt subscriber. `RUST_LOG` wins when set and valid; otherwise
/// `default_directives` applies. The CLI passes `info,sqlx=warn` so sqlx's
/// per-statement logging stays quiet during large upserts.
pub fn init_tracing(default_directives: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives))?;
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| anyhow!("tracing already initialized: {e}"))
}
