use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::error::ConfigError;
use crate::repeat::RepeatMode;
use crate::session::{DurationPolicy, MAX_VOLUME, SessionSettings};

pub const CONFIG_PATH: &str = "config.jsonc";
pub const CONFIG_ENV: &str = "MUSICQ_CONFIG";

const DEFAULT_CONFIG: &str = r#"// Music bot config (JSONC: supports comments)
{
  // Command prefix, trailing space included
  "prefix": "!mq ",
  "embed_color": 5793266,

  "music": {
    // Longest track allowed, in seconds. 0 or less means no limit
    "max_track_seconds": 0,
    // Leave voice after this long with nothing to play. 0 stays forever
    "idle_timeout_secs": 300,
    // 0 - 150
    "default_volume": 35,
    // off | track | queue
    "default_repeat": "off",
    // Require votes from listeners to skip someone else's track
    "vote_skip": true,
    "skip_ratio": 0.55,
    // Give up auto-advancing after this many load failures in a row
    "failure_threshold": 3
  }
}
"#;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_color")]
    pub embed_color: u32,
    #[serde(default)]
    pub music: MusicConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MusicConfig {
    pub max_track_seconds: i64,
    pub idle_timeout_secs: u64,
    pub default_volume: u16,
    pub default_repeat: RepeatMode,
    pub vote_skip: bool,
    pub skip_ratio: f64,
    pub failure_threshold: u32,
}

fn default_prefix() -> String {
    "!mq ".to_string()
}

fn default_color() -> u32 {
    0x5865F2
}

impl Default for MusicConfig {
    fn default() -> Self {
        let settings = SessionSettings::default();
        Self {
            max_track_seconds: 0,
            idle_timeout_secs: settings.idle_timeout.as_secs(),
            default_volume: settings.default_volume as u16,
            default_repeat: settings.default_repeat,
            vote_skip: settings.vote_skip,
            skip_ratio: settings.skip_ratio,
            failure_threshold: settings.failure_threshold,
        }
    }
}

impl MusicConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.skip_ratio > 0.0 && self.skip_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "music.skip_ratio must be in (0, 1], got {}",
                self.skip_ratio
            )));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "music.failure_threshold must be at least 1".into(),
            ));
        }
        if self.default_volume > MAX_VOLUME {
            return Err(ConfigError::Invalid(format!(
                "music.default_volume must be at most {MAX_VOLUME}, got {}",
                self.default_volume
            )));
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            default_volume: self.default_volume.min(MAX_VOLUME) as u8,
            default_repeat: self.default_repeat,
            vote_skip: self.vote_skip,
            skip_ratio: self.skip_ratio,
            failure_threshold: self.failure_threshold,
        }
    }
}

/// Track length cap shared by every session. Updating it affects the next
/// play call everywhere.
#[derive(Debug, Default)]
pub struct DurationCap(AtomicI64);

impl DurationCap {
    pub fn new(max_seconds: i64) -> Self {
        Self(AtomicI64::new(max_seconds))
    }

    pub fn set(&self, max_seconds: i64) {
        self.0.store(max_seconds, Ordering::Relaxed);
    }

    /// Re-read the config file and adopt its cap. An invalid file leaves the
    /// current cap in place.
    pub async fn reload(&self, path: &Path) -> Result<i64, ConfigError> {
        let config = load_config(path).await?;
        let max_seconds = config.music.max_track_seconds;
        self.set(max_seconds);
        Ok(max_seconds)
    }
}

impl DurationPolicy for DurationCap {
    fn max_track_seconds(&self) -> i64 {
        self.0.max_track_seconds()
    }
}

/// `$MUSICQ_CONFIG`, or `config.jsonc` in the working directory.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_PATH))
}

pub async fn ensure_default_config(path: &Path) -> Result<(), ConfigError> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tokio::fs::write(path, DEFAULT_CONFIG).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    ensure_default_config(path).await?;
    let contents = tokio::fs::read_to_string(path).await?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let cfg: AppConfig = json5::from_str(contents)?;
    cfg.music.validate()?;
    Ok(cfg)
}
