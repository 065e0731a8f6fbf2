//! Client configuration loading from file and environment variables.

use parley_types::VoiceSettings;
use parley_voice::LiveKitConfig;
use serde::Deserialize;
use thiserror::Error;

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Dev server credentials used to mint join tokens.
    #[serde(default)]
    pub livekit: LiveKitConfig,

    /// Stored voice preferences, sanitised by [`Config::voice_settings`].
    #[serde(default)]
    pub voice: toml::Table,

    #[serde(default)]
    pub cues: CueConfig,

    #[serde(default)]
    pub channel: ChannelConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "parley_voice=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Where notification sounds come from.
#[derive(Debug, Clone, Deserialize)]
pub struct CueConfig {
    /// Directory path or `http(s)://` base URL holding `<cue>.wav` files.
    #[serde(default = "default_cue_source")]
    pub source: String,
}

/// The channel the client joins.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_channel_id")]
    pub id: String,

    /// Participant identity written into join tokens.
    #[serde(default = "default_identity")]
    pub identity: String,

    /// Display name written into join tokens.
    #[serde(default = "default_display_name")]
    pub name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cue_source() -> String {
    "assets/audio".to_string()
}

fn default_channel_id() -> String {
    "general".to_string()
}

fn default_identity() -> String {
    "parley-dev".to_string()
}

fn default_display_name() -> String {
    "Parley Dev".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            source: default_cue_source(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            id: default_channel_id(),
            identity: default_identity(),
            name: default_display_name(),
        }
    }
}

impl Config {
    /// Builds voice settings from the `[voice]` table. Unknown or
    /// wrong-typed entries fall back to their defaults.
    pub fn voice_settings(&self) -> VoiceSettings {
        match serde_json::to_value(&self.voice) {
            Ok(value) => VoiceSettings::clean(&value),
            Err(e) => {
                tracing::warn!(error = %e, "unreadable [voice] table, using defaults");
                VoiceSettings::default()
            }
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `PARLEY_LOG_LEVEL` overrides `logging.level`
/// - `PARLEY_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `PARLEY_LIVEKIT_URL` overrides `livekit.url`
/// - `PARLEY_LIVEKIT_API_KEY` overrides `livekit.api_key`
/// - `PARLEY_LIVEKIT_API_SECRET` overrides `livekit.api_secret`
/// - `PARLEY_CUE_SOURCE` overrides `cues.source`
/// - `PARLEY_CHANNEL_ID` overrides `channel.id`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Ok(level) = std::env::var("PARLEY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("PARLEY_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(url) = std::env::var("PARLEY_LIVEKIT_URL") {
        config.livekit.url = url;
    }
    if let Ok(key) = std::env::var("PARLEY_LIVEKIT_API_KEY") {
        config.livekit.api_key = key;
    }
    if let Ok(secret) = std::env::var("PARLEY_LIVEKIT_API_SECRET") {
        config.livekit.api_secret = secret;
    }
    if let Ok(source) = std::env::var("PARLEY_CUE_SOURCE") {
        config.cues.source = source;
    }
    if let Ok(id) = std::env::var("PARLEY_CHANNEL_ID") {
        config.channel.id = id;
    }

    Ok(config)
}
