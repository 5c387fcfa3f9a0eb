use std::time::Duration;

use cineshelf_core::types::RankList;
use tracing::warn;

/// Immutable runtime configuration, read once from `CINESHELF_*` variables
/// and passed explicitly into each component.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub bind_addr: String,
    pub jellyfin_url: String,
    pub jellyfin_api_key: String,
    pub rating_domain: String,
    pub feed_url: String,
    pub sync_on_startup: bool,
    pub feed_refresh_on_start: bool,
    pub feed_interval: Duration,
    pub rank_lists: Vec<RankList>,
}

impl Config {
    pub fn from_env() -> Self {
        let jellyfin_api_key = env_or("CINESHELF_JELLYFIN_API_KEY", "");
        if jellyfin_api_key.is_empty() {
            warn!("CINESHELF_JELLYFIN_API_KEY is not set, sync will be rejected upstream");
        }

        let feed_interval_secs: u64 = std::env::var("CINESHELF_FEED_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        Self {
            db_path: env_or("CINESHELF_DB", "cineshelf.db"),
            bind_addr: env_or("CINESHELF_BIND", "0.0.0.0:5002"),
            jellyfin_url: env_or("CINESHELF_JELLYFIN_URL", "http://127.0.0.1:8096"),
            jellyfin_api_key,
            rating_domain: env_or("CINESHELF_RATING_SITE", "javdb.com"),
            feed_url: env_or("CINESHELF_FEED_URL", "http://127.0.0.1:5200"),
            sync_on_startup: env_flag("CINESHELF_SYNC_ON_STARTUP"),
            feed_refresh_on_start: env_flag("CINESHELF_FEED_REFRESH_ON_START"),
            feed_interval: Duration::from_secs(feed_interval_secs),
            rank_lists: parse_rank_lists(&env_or("CINESHELF_RANK_LISTS", "")),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str) -> bool {
    matches!(
        std::env::var(key).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

/// Parse the rank-list mapping, `Name=path` pairs separated by `;`.
/// Malformed pairs are skipped with a warning so one typo does not drop
/// the whole mapping.
pub fn parse_rank_lists(raw: &str) -> Vec<RankList> {
    let mut lists = Vec::new();
    for pair in raw.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
                lists.push(RankList::new(name.trim(), path.trim()));
            }
            _ => warn!(pair = %pair, "malformed rank list entry, skipping"),
        }
    }
    lists
}
