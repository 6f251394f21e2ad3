//! Bot configuration
//!
//! Values come from `config/bot.yaml` when it exists, then environment
//! variables override them key by key.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default location of the optional config file
pub const CONFIG_FILE: &str = "config/bot.yaml";

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_GAME_NAME: &str = "the game";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Everything optional, as read from the file before validation
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    discord_token: Option<String>,
    modqueue_url: Option<String>,
    modqueue_secret: Option<String>,
    owner_id: Option<u64>,
    logs_channel_id: Option<u64>,
    guild_id: Option<u64>,
    visits_vc_id: Option<u64>,
    playing_vc_id: Option<u64>,
    stats_channel_id: Option<u64>,
    roblox_cookie: Option<String>,
    group_id: Option<u64>,
    place_id: Option<String>,
    universe_id: Option<String>,
    data_dir: Option<PathBuf>,
    game_name: Option<String>,
    http_timeout_secs: Option<u64>,
}

/// Validated bot configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub discord_token: String,
    pub modqueue_url: String,
    pub modqueue_secret: String,
    /// Super-admin chat identity
    pub owner_id: u64,
    pub logs_channel_id: Option<u64>,
    pub guild_id: Option<u64>,
    pub visits_vc_id: Option<u64>,
    pub playing_vc_id: Option<u64>,
    pub stats_channel_id: Option<u64>,
    /// Session credential for group role changes
    pub roblox_cookie: Option<String>,
    pub group_id: Option<u64>,
    /// Seed for the `PLACE_ID` runtime setting
    pub place_id: Option<String>,
    /// Seed for the `UNIVERSE_ID` runtime setting
    pub universe_id: Option<String>,
    pub data_dir: PathBuf,
    pub game_name: String,
    pub http_timeout: Duration,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_id(key: &'static str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    non_empty(value)
        .map(|v| {
            v.parse()
                .map_err(|_| ConfigError::Invalid { key, value: v })
        })
        .transpose()
}

impl BotConfig {
    /// Load from `path` (if present) and the process environment
    ///
    /// # Errors
    /// Returns an error if the file is unreadable or malformed, or a
    /// mandatory value is missing.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = match tokio::fs::read_to_string(path).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_sources(yaml.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build from optional YAML text and an environment lookup.
    ///
    /// # Errors
    /// Returns an error if the YAML is malformed, a value does not parse or a
    /// mandatory value is missing.
    pub fn from_sources(
        yaml: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw: RawConfig = match yaml {
            Some(text) if !text.trim().is_empty() => serde_yaml::from_str(text)?,
            _ => RawConfig::default(),
        };

        let text = |key: &str, file: Option<String>| non_empty(env(key)).or(non_empty(file));
        let id = |key: &'static str, file: Option<u64>| -> Result<Option<u64>, ConfigError> {
            Ok(parse_id(key, env(key))?.or(file))
        };

        Ok(Self {
            discord_token: text("DISCORD_TOKEN", raw.discord_token)
                .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?,
            modqueue_url: text("MODQUEUE_URL", raw.modqueue_url)
                .ok_or(ConfigError::Missing("MODQUEUE_URL"))?,
            modqueue_secret: text("MODQUEUE_SECRET", raw.modqueue_secret)
                .ok_or(ConfigError::Missing("MODQUEUE_SECRET"))?,
            owner_id: id("BOT_OWNER_ID", raw.owner_id)?
                .ok_or(ConfigError::Missing("BOT_OWNER_ID"))?,
            logs_channel_id: id("LOGS_CHANNEL_ID", raw.logs_channel_id)?,
            guild_id: id("GUILD_ID", raw.guild_id)?,
            visits_vc_id: id("VISITS_VC_ID", raw.visits_vc_id)?,
            playing_vc_id: id("PLAYING_VC_ID", raw.playing_vc_id)?,
            stats_channel_id: id("STATS_CHANNEL_ID", raw.stats_channel_id)?,
            roblox_cookie: text("ROBLOX_COOKIE", raw.roblox_cookie),
            group_id: id("GROUP_ID", raw.group_id)?,
            place_id: text("PLACE_ID", raw.place_id),
            universe_id: text("UNIVERSE_ID", raw.universe_id),
            data_dir: non_empty(env("DATA_DIR"))
                .map(PathBuf::from)
                .or(raw.data_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            game_name: text("GAME_NAME", raw.game_name)
                .unwrap_or_else(|| DEFAULT_GAME_NAME.to_string()),
            http_timeout: Duration::from_secs(
                raw.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
        })
    }
}
