use anyhow::{Context, Result};
use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use tracing::info;

pub const DEFAULT_DIRECTORY_URL: &str = "https://esi.evetech.net/latest";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub directory_url: String,
    pub directory_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, so tests don't have to touch the process env
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout_ms: u64 = try_load(&lookup, "DIRECTORY_TIMEOUT_MS", "5000")?;

        Ok(Self {
            port: try_load(&lookup, "PORT", "3000")?,
            database_path: try_load(&lookup, "DATABASE_PATH", "characters.db")?,
            directory_url: try_load(&lookup, "DIRECTORY_URL", DEFAULT_DIRECTORY_URL)?,
            directory_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw}"))
}
