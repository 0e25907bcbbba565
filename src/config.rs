use std::env;

use crate::search_cache::{DEFAULT_MAX_ENTRIES, DEFAULT_RETENTION_SECS, DEFAULT_TTL_SECS};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub retention_secs: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub db_path: String,
    pub seed_path: String,
    /// Bearer token for mutating endpoints. Unset means read-only.
    pub admin_token: Option<String>,
    /// Base URL of another node's listing API. Unset means serve from
    /// the local store.
    pub upstream_url: Option<String>,
    pub cache: CacheConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            port: env::var("HOMEFIND_PORT")
                .unwrap_or_else(|_| "18080".to_string())
                .parse()?,
            host: env::var("HOMEFIND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            db_path: env::var("HOMEFIND_DB_PATH")
                .unwrap_or_else(|_| "./data/homefind.db".to_string()),
            seed_path: env::var("HOMEFIND_SEED_PATH")
                .unwrap_or_else(|_| "./seed/listings.json".to_string()),
            admin_token: env::var("HOMEFIND_ADMIN_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            upstream_url: env::var("HOMEFIND_UPSTREAM_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            cache: CacheConfig {
                ttl_secs: env::var("HOMEFIND_CACHE_TTL_SECS")
                    .unwrap_or_else(|_| DEFAULT_TTL_SECS.to_string())
                    .parse()?,
                retention_secs: env::var("HOMEFIND_CACHE_RETENTION_SECS")
                    .unwrap_or_else(|_| DEFAULT_RETENTION_SECS.to_string())
                    .parse()?,
                max_entries: env::var("HOMEFIND_CACHE_MAX_ENTRIES")
                    .unwrap_or_else(|_| DEFAULT_MAX_ENTRIES.to_string())
                    .parse()?,
            },
        })
    }
}
