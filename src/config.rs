//! Runtime configuration.
//!
//! Resolution order: built-in defaults, then the TOML file (explicit
//! `--config` path, else `<config dir>/bioface/config.toml` if it exists),
//! then `BIOFACE_*` environment variables.

use crate::auth::policy::{LoginPolicy, WeekAnchor};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default upload ceiling: 16 MiB.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// JSON document holding every user record.
    pub users_file: PathBuf,
    /// Where uploaded images are written before detection.
    pub upload_dir: PathBuf,
    /// HMAC key for session cookies.
    pub session_secret: String,
    pub max_upload_bytes: usize,
    pub login: LoginConfig,
    pub seed: SeedConfig,
    pub detector: DetectorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub weekly_limit: u32,
    pub week_start: WeekAnchor,
}

/// Account written into a fresh store on first run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Program invoked with the saved image path as its last argument.
    pub command: String,
    pub args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            users_file: PathBuf::from("users.json"),
            upload_dir: PathBuf::from("uploads"),
            session_secret: "bioface_secret_key".into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            login: LoginConfig::default(),
            seed: SeedConfig::default(),
            detector: DetectorConfig::default(),
        }
    }
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            weekly_limit: 3,
            week_start: WeekAnchor::default(),
        }
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            username: "admin".into(),
            password: "bio123".into(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            command: "face_detection".into(),
            args: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from `explicit` (must exist) or the default location
    /// (optional), then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(host) = non_empty("BIOFACE_HOST") {
            self.host = host;
        }
        if let Some(port) = non_empty("BIOFACE_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("BIOFACE_PORT is not a valid port: {port}"))?;
        }
        if let Some(path) = non_empty("BIOFACE_USERS_FILE") {
            self.users_file = PathBuf::from(path);
        }
        if let Some(path) = non_empty("BIOFACE_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(path);
        }
        if let Some(secret) = non_empty("BIOFACE_SESSION_SECRET") {
            self.session_secret = secret;
        }
        if let Some(command) = non_empty("BIOFACE_DETECTOR_COMMAND") {
            self.detector.command = command;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.login.weekly_limit == 0 {
            bail!("[login] weekly_limit must be at least 1");
        }
        if self.session_secret.is_empty() {
            bail!("session_secret cannot be empty");
        }
        if self.detector.command.trim().is_empty() {
            bail!("[detector] command cannot be empty");
        }
        Ok(())
    }

    pub fn login_policy(&self) -> LoginPolicy {
        LoginPolicy::new(self.login.weekly_limit, self.login.week_start)
    }
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "bioface")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
