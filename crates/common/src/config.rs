//! Application configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// External engine binaries.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Process runner behaviour.
    #[serde(default)]
    pub runner: RunnerSettings,

    /// Default render parameters used when a front end leaves them unset.
    #[serde(default)]
    pub defaults: RenderDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Locations of the transcoding engine and its probe tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine binary, either a bare name looked up on `PATH` or a path.
    pub ffmpeg: PathBuf,

    /// Probe binary used to read source durations.
    pub ffprobe: PathBuf,
}

/// Process runner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSettings {
    /// Time a terminated engine gets to exit before it is killed.
    pub grace_period_ms: u64,

    /// Seconds without progress before the job is considered stalled (0 disables).
    pub stall_timeout_secs: u64,

    /// What to do once a job is considered stalled.
    pub stall_policy: StallPolicy,

    /// Number of trailing diagnostic lines kept for failure reports.
    pub diagnostic_lines: usize,

    /// Seconds a preview may run before it is terminated (0 disables).
    #[serde(default = "default_preview_timeout_secs")]
    pub preview_timeout_secs: u64,
}

/// Reaction to an engine that stopped reporting progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StallPolicy {
    /// Report the stall and keep waiting; the caller decides whether to cancel.
    Warn,
    /// Terminate the engine and fail the job.
    Abort,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderDefaults {
    /// Output frame rate.
    pub frame_rate: u32,

    /// Output canvas width.
    pub width: u32,

    /// Output canvas height.
    pub height: u32,

    /// Encoder identifier (e.g. "software-h264", "hardware-h264").
    pub encoder: String,

    /// Quality preset name ("low", "medium", "best").
    pub quality: String,

    /// Output container ("mp4", "mov", "mkv").
    pub container: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "greensub_process_runner=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg: env_override("GREENSUB_FFMPEG", "ffmpeg"),
            ffprobe: env_override("GREENSUB_FFPROBE", "ffprobe"),
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: 3_000,
            stall_timeout_secs: 30,
            stall_policy: StallPolicy::Warn,
            diagnostic_lines: 40,
            preview_timeout_secs: default_preview_timeout_secs(),
        }
    }
}

fn default_preview_timeout_secs() -> u64 {
    30
}

impl RunnerSettings {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Stall window, or `None` when stall detection is disabled.
    pub fn stall_timeout(&self) -> Option<Duration> {
        (self.stall_timeout_secs > 0).then(|| Duration::from_secs(self.stall_timeout_secs))
    }

    /// Preview time limit, or `None` when previews are unbounded.
    pub fn preview_timeout(&self) -> Option<Duration> {
        (self.preview_timeout_secs > 0).then(|| Duration::from_secs(self.preview_timeout_secs))
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            frame_rate: 25,
            width: 1920,
            height: 1080,
            encoder: "software-h264".to_string(),
            quality: "medium".to_string(),
            container: "mp4".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("greensub").join("config.json")
}

fn env_override(var: &str, fallback: &str) -> PathBuf {
    std::env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"runner":{"grace_period_ms":500,"stall_timeout_secs":0,"stall_policy":"abort","diagnostic_lines":10}}"#)
                .unwrap();
        assert_eq!(config.runner.grace_period(), Duration::from_millis(500));
        assert_eq!(config.runner.stall_timeout(), None);
        assert_eq!(config.runner.stall_policy, StallPolicy::Abort);
        assert_eq!(config.runner.preview_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.defaults.frame_rate, 25);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.defaults.encoder = "hardware-h264".to_string();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.defaults.encoder, "hardware-h264");
    }

    #[test]
    fn test_unparseable_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.runner.diagnostic_lines, 40);
    }
}
