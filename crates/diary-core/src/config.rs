//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/classroom-diary/config.toml)
//! 3. Environment variables (DIARY_* prefix)
//!
//! Environment variables take precedence over config file values.
//!
//! This is operator-level configuration. The per-classroom service settings
//! (Gemini key, spreadsheet, Apps Script URL) live in the local store as
//! [`AppSettings`](crate::models::AppSettings).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable prefix
const ENV_PREFIX: &str = "DIARY";

/// Directory name used under the platform config/data dirs
const APP_DIR: &str = "classroom-diary";

/// Public generative-language endpoint
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for diary feedback
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the local store files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Address the forwarding server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Gemini model name
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Gemini REST base URL
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    /// Shared password for the teacher login gate
    #[serde(default = "default_teacher_password")]
    pub teacher_password: String,

    /// Shared classroom code required for self-service registration
    #[serde(default)]
    pub classroom_password: Option<String>,

    /// Log file path (defaults to stderr when unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bind_address: default_bind_address(),
            gemini_model: default_gemini_model(),
            gemini_base_url: default_gemini_base_url(),
            teacher_password: default_teacher_password(),
            classroom_password: None,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (DIARY_DATA_DIR, DIARY_BIND_ADDRESS, ...)
    /// 2. Config file (~/.config/classroom-diary/config.toml or DIARY_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Configuration rooted at a specific data directory, everything else default
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_BIND_ADDRESS", ENV_PREFIX)) {
            if !val.is_empty() {
                self.bind_address = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_GEMINI_MODEL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.gemini_model = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_GEMINI_BASE_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.gemini_base_url = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_TEACHER_PASSWORD", ENV_PREFIX)) {
            if !val.is_empty() {
                self.teacher_password = val;
            }
        }

        // Empty string clears the classroom gate
        if let Ok(val) = std::env::var(format!("{}_CLASSROOM_PASSWORD", ENV_PREFIX)) {
            self.classroom_password = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with DIARY_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Path of the JSON document backing a store key
    pub fn store_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_bind_address() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_gemini_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

fn default_teacher_password() -> String {
    "teacher2024".to_string()
}
