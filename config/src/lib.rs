//! Configuration loading and persistence for stylewatch.
//!
//! Everything lives under `~/.stylewatch/`:
//!
//! - `config.toml`: user configuration (`[analysis]`, `[runner]`, `[report]`).
//! - `state.json`: image freshness record.
//! - `logs/`: log files.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use stylewatch_engine::{CoordinatorConfig, DEFAULT_IGNORE_FILE};
use stylewatch_runner::RunnerConfig;
use stylewatch_utils::atomic_write;
use thiserror::Error;
use toml_edit::{DocumentMut, Item, Table};

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "STYLEWATCH_CONFIG";

const APP_DIR: &str = ".stylewatch";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("config at {} is not editable TOML: {source}", .path.display())]
    Edit {
        path: PathBuf,
        #[source]
        source: toml_edit::TomlError,
    },
    #[error("failed to write config at {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not determine home directory")]
    NoHomeDir,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Ignore file read from each target root.
    pub ignore_file: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            ignore_file: DEFAULT_IGNORE_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StylewatchConfig {
    pub analysis: CoordinatorConfig,
    pub runner: RunnerConfig,
    pub report: ReportConfig,
}

impl StylewatchConfig {
    /// Parse the config at `path`. A missing file yields the defaults.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`read`](Self::read), but falls back to defaults on any error.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        Self::read(path).unwrap_or_else(|e| {
            tracing::warn!("{e}; using default configuration");
            Self::default()
        })
    }

    /// Persist `[analysis] enabled`, keeping the rest of the file as written.
    ///
    /// Creates the file and its parent directory if they don't exist.
    pub fn set_enabled(path: &Path, enabled: bool) -> Result<(), ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let mut doc = content
            .parse::<DocumentMut>()
            .map_err(|source| ConfigError::Edit {
                path: path.to_path_buf(),
                source,
            })?;
        if !doc.contains_table("analysis") {
            doc["analysis"] = Item::Table(Table::new());
        }
        doc["analysis"]["enabled"] = toml_edit::value(enabled);

        atomic_write(path, doc.to_string().as_bytes()).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), enabled, "Persisted analysis toggle");
        Ok(())
    }
}

/// `~/.stylewatch`.
pub fn app_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(APP_DIR))
        .ok_or(ConfigError::NoHomeDir)
}

/// Config file location: `explicit`, then `$STYLEWATCH_CONFIG`, then `~/.stylewatch/config.toml`.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    resolve_config_path(explicit, env::var_os(CONFIG_ENV), dirs::home_dir())
}

fn resolve_config_path(
    explicit: Option<&Path>,
    from_env: Option<OsString>,
    home: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(value) = from_env.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(value));
    }
    home.map(|h| h.join(APP_DIR).join("config.toml"))
        .ok_or(ConfigError::NoHomeDir)
}

/// Image freshness record, `~/.stylewatch/state.json`.
pub fn state_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dir()?.join("state.json"))
}
