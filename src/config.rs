use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use tracing::{info, warn};

pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const DEFAULT_RECIPES_LIMIT: i64 = 3;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: SocketAddr,
    pub page_size: i64,
    pub recipes_limit: i64,
    pub media_root: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            bind_address: try_load("BIND_ADDRESS", "127.0.0.1:8000")?,
            page_size: try_load("PAGE_SIZE", &DEFAULT_PAGE_SIZE.to_string())?,
            recipes_limit: try_load("RECIPES_LIMIT", &DEFAULT_RECIPES_LIMIT.to_string())?,
            media_root: try_load("MEDIA_ROOT", "media")?,
        })
    }

    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            page_size: DEFAULT_PAGE_SIZE,
            recipes_limit: DEFAULT_RECIPES_LIMIT,
            media_root: PathBuf::from("media"),
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow::anyhow!("Invalid {key} value {raw:?}: {e}")
    })
}
