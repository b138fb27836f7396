//! Process configuration, extracted from the environment.

use crate::blizzard::Region;
use anyhow::Context;
use figment::Figment;
use figment::providers::Env;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

const DEFAULT_OAUTH_URL: &str = "https://oauth.battle.net/token";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub battle_net_client_id: String,
    pub battle_net_secret: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Entrants handled by one worker task.
    #[serde(default = "default_group_size")]
    pub group_size: usize,
    /// Truncate every ranked list to this many entries before dedup.
    #[serde(default)]
    pub max_per_bracket: Option<usize>,
    /// Entrants who have not logged in for this long are not enriched.
    #[serde(default = "default_stale_hours")]
    pub last_login_stale_hours: u64,
    #[serde(default = "default_regions", deserialize_with = "deserialize_regions")]
    pub regions: Vec<Region>,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_throttle_retry_ms")]
    pub throttle_retry_ms: u64,
    #[serde(default = "default_server_error_attempts")]
    pub server_error_attempts: u32,

    /// Overrides `https://{region}.api.blizzard.com`; `{region}` is substituted if present.
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default = "default_oauth_url")]
    pub oauth_url: String,
}

impl Config {
    /// Load from raw environment variables (`GROUP_SIZE` -> `group_size`).
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(Figment::new().merge(Env::raw()))
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        figment.extract().context("Failed to load config")
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.last_login_stale_hours * 60 * 60)
    }

    pub fn throttle_retry_delay(&self) -> Duration {
        Duration::from_millis(self.throttle_retry_ms)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_group_size() -> usize {
    100
}

fn default_stale_hours() -> u64 {
    999
}

fn default_regions() -> Vec<Region> {
    vec![Region::Eu, Region::Us]
}

fn default_db_max_connections() -> u32 {
    8
}

fn default_requests_per_second() -> u32 {
    90
}

fn default_throttle_retry_ms() -> u64 {
    2000
}

fn default_server_error_attempts() -> u32 {
    3
}

fn default_oauth_url() -> String {
    DEFAULT_OAUTH_URL.to_string()
}

/// Accepts either a comma separated string (`"EU,US"`) or a list.
fn deserialize_regions<'de, D>(deserializer: D) -> Result<Vec<Region>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawRegions {
        Joined(String),
        List(Vec<String>),
    }

    let raw = match RawRegions::deserialize(deserializer)? {
        RawRegions::Joined(s) => s.split(',').map(str::to_owned).collect::<Vec<_>>(),
        RawRegions::List(list) => list,
    };

    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Region>().map_err(serde::de::Error::custom))
        .collect()
}
