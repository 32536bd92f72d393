//! Runner configuration, deserialized from the `[runner]` table.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_IMAGE: &str = "ghcr.io/epitech/coding-style-checker:latest";
pub const DEFAULT_CACHE_KEY: &str = "lastImagePull";
pub const DEFAULT_CACHE_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

/// How and where the checker container is run.
///
/// ```toml
/// [runner]
/// runtime = "docker"
/// image = "ghcr.io/epitech/coding-style-checker:latest"
/// cache_duration_ms = 86400000
/// run_timeout_secs = 300
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Container CLI used for pull, prune and run.
    pub runtime: String,
    /// Image reference of the checker.
    pub image: String,
    /// Key of the last-pull timestamp in the freshness store.
    pub cache_key: String,
    /// Image freshness window. A pull happens at most once per window.
    pub cache_duration_ms: u64,
    /// Upper bound on a container run. `0` disables the bound.
    pub run_timeout_secs: u64,
    /// Upper bound on an image pull. `0` disables the bound.
    pub pull_timeout_secs: u64,
    /// Report directory, relative to the target root.
    pub report_dir: String,
    /// File name the checker writes inside the report directory.
    pub report_file: String,
    /// In-container path where the target is mounted.
    pub delivery_mount: String,
    /// In-container path where the report directory is mounted.
    pub report_mount: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            image: DEFAULT_IMAGE.to_string(),
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            cache_duration_ms: DEFAULT_CACHE_DURATION_MS,
            run_timeout_secs: 300,
            pull_timeout_secs: 600,
            report_dir: ".vscode".to_string(),
            report_file: "coding-style-reports.log".to_string(),
            delivery_mount: "/mnt/delivery".to_string(),
            report_mount: "/mnt/reports".to_string(),
        }
    }
}

fn optional_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl RunnerConfig {
    #[must_use]
    pub fn cache_duration(&self) -> Duration {
        Duration::from_millis(self.cache_duration_ms)
    }

    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        optional_secs(self.run_timeout_secs)
    }

    #[must_use]
    pub fn pull_timeout(&self) -> Option<Duration> {
        optional_secs(self.pull_timeout_secs)
    }

    /// Host directory the report is written to for `target`.
    #[must_use]
    pub fn report_dir_for(&self, target: &Path) -> PathBuf {
        target.join(&self.report_dir)
    }

    /// Host path of the report file for `target`.
    #[must_use]
    pub fn report_path_for(&self, target: &Path) -> PathBuf {
        self.report_dir_for(target).join(&self.report_file)
    }
}
