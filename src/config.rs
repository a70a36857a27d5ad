use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::ConfigError;
use crate::session::SessionConfig;

/// Persisted trainer settings. Everything a session needs except its lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub round_duration_secs: u32,
    pub rest_duration_secs: u32,
    pub delay_between_lines_secs: u32,
    pub round_count: u32,
    pub random_order: bool,
    pub cooldown_minutes: u32,
    pub startup_warning_secs: u32,
    pub rest_warning_secs: u32,
    pub speech_command: Option<String>,
    pub silent: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            round_duration_secs: 180,
            rest_duration_secs: 60,
            delay_between_lines_secs: 3,
            round_count: 3,
            random_order: true,
            cooldown_minutes: 0,
            startup_warning_secs: 5,
            rest_warning_secs: 5,
            speech_command: None,
            silent: false,
        }
    }
}

impl Config {
    /// Build a session from these settings and the given lines.
    pub fn session_config(&self, lines: Vec<String>) -> Result<SessionConfig, ConfigError> {
        let lines: Vec<String> = lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();

        if lines.is_empty() {
            return Err(ConfigError::EmptyScript);
        }
        if self.round_duration_secs == 0 {
            return Err(ConfigError::ZeroRoundDuration);
        }
        if self.round_count == 0 {
            return Err(ConfigError::ZeroRoundCount);
        }

        Ok(SessionConfig {
            lines,
            round_duration_secs: self.round_duration_secs,
            rest_duration_secs: self.rest_duration_secs,
            delay_between_lines_secs: self.delay_between_lines_secs,
            round_count: self.round_count,
            random_order: self.random_order,
            cooldown_minutes: self.cooldown_minutes,
            startup_warning_secs: self.startup_warning_secs,
            rest_warning_secs: self.rest_warning_secs,
        })
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|e| {
                log::warn!("ignoring unreadable config {}: {}", self.path.display(), e);
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
