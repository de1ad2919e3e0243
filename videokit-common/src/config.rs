//! Configuration loading and config file resolution
//!
//! Every field has a compiled default, so a missing config file is never
//! fatal. A file that exists but fails to parse or validate is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VIDEOKIT_CONFIG";

/// Requested decode resolution
///
/// The decode engine pads both dimensions to a multiple of 32, so the texture
/// handed to the host is usually larger than this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
        }
    }
}

/// PCM format negotiated with the decode engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz (must match what the sound sink expects)
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Capacity of each streaming sink, in seconds
    pub stream_buffer_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 1,
            stream_buffer_secs: 4.0,
        }
    }
}

/// Decode session tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Background wait-loop poll interval (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
        }
    }
}

/// Host loop settings (used by the demo binary)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Render ticks per second
    pub tick_rate_hz: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self { tick_rate_hz: 60 }
    }
}

/// Complete bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub session: SessionConfig,
    pub host: HostConfig,
}

impl BridgeConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: BridgeConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    ///
    /// A missing file yields the compiled defaults with a warning.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve and load configuration
    ///
    /// Priority order:
    /// 1. Command-line argument (highest priority)
    /// 2. `VIDEOKIT_CONFIG` environment variable
    /// 3. `<user config dir>/videokit/config.toml`
    /// 4. Compiled defaults (fallback)
    pub fn resolve(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg) {
            Some(path) => Self::load(&path),
            None => {
                debug!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the bridge cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.video.width == 0 || self.video.height == 0 {
            return Err(Error::Config(format!(
                "video size must be non-zero (got {}x{})",
                self.video.width, self.video.height
            )));
        }
        if self.audio.sample_rate == 0 {
            return Err(Error::Config("audio.sample_rate must be non-zero".to_string()));
        }
        if self.audio.channels == 0 {
            return Err(Error::Config("audio.channels must be non-zero".to_string()));
        }
        if !self.audio.stream_buffer_secs.is_finite() || self.audio.stream_buffer_secs <= 0.0 {
            return Err(Error::Config(format!(
                "audio.stream_buffer_secs must be positive (got {})",
                self.audio.stream_buffer_secs
            )));
        }
        if self.session.poll_interval_ms == 0 {
            return Err(Error::Config("session.poll_interval_ms must be non-zero".to_string()));
        }
        if self.host.tick_rate_hz == 0 {
            return Err(Error::Config("host.tick_rate_hz must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Find the config file to load, without reading it
///
/// Returns `None` when neither an explicit path nor a user config file exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config file
    default_config_file().filter(|path| path.exists())
}

/// Platform config file location (`~/.config/videokit/config.toml` on Linux)
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("videokit").join("config.toml"))
}
