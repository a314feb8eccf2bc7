use crate::engine::EngineSettings;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlayerConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub lyrics: LyricsConfig,
}

/// Sync engine tick rates and drift tolerance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_display_tick")]
    pub display_tick_ms: u64,
    #[serde(default = "default_volume_tick")]
    pub volume_tick_ms: u64,
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold_ms: u64,
}

const fn default_display_tick() -> u64 {
    16
}

const fn default_volume_tick() -> u64 {
    100
}

const fn default_drift_threshold() -> u64 {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            display_tick_ms: default_display_tick(),
            volume_tick_ms: default_volume_tick(),
            drift_threshold_ms: default_drift_threshold(),
        }
    }
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            display_tick: Duration::from_millis(config.display_tick_ms),
            volume_tick: Duration::from_millis(config.volume_tick_ms),
            drift_threshold: Duration::from_millis(config.drift_threshold_ms),
        }
    }
}

/// Stem separation / alignment backend connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Bearer token for the backend; omit when the backend is open
    pub api_key: Option<String>,
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            api_key: None,
        }
    }
}

/// Lyric source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    concat!("karaduo v", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
        }
    }
}

impl PlayerConfig {
    /// Get the configuration directory path (~/.config/karaduo/)
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path (~/.config/karaduo/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from file or create template on first run
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or
    /// `ConfigNotFound` on first run after the template has been written.
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&config_path, CONFIG_TEMPLATE)?;
            return Err(CoreError::ConfigNotFound { path: config_path });
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check tick rates for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error for zero tick periods.
    pub fn validate(&self) -> Result<()> {
        if self.engine.display_tick_ms == 0 {
            return Err(CoreError::config("engine.display_tick_ms must be nonzero"));
        }
        if self.engine.volume_tick_ms == 0 {
            return Err(CoreError::config("engine.volume_tick_ms must be nonzero"));
        }
        Ok(())
    }
}

const CONFIG_TEMPLATE: &str = r#"# Karaduo Configuration
# ~/.config/karaduo/config.toml

[engine]
# Display-rate tick for drift correction and position publication
display_tick_ms = 16
# Fixed tick for focus-volume recomputation
volume_tick_ms = 100
# Follower offset beyond which a playing track is hard-seeked
drift_threshold_ms = 100

[remote]
# Stem separation / forced alignment backend
backend_url = "http://127.0.0.1:8000"
# Optional bearer token for the backend
# api_key = ""

[lyrics]
# User agent sent to public lyric APIs
user_agent = "karaduo"
"#;
