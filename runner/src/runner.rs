use std::fs;
use std::io;
use std::path::{Path, PathBuf, absolute};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::config::RunnerConfig;
use crate::error::{ImagePullError, ToolExecutionError};
use crate::freshness::FreshnessStore;
use crate::process::{CommandSpec, ProcessExecutor};

/// Result of an image freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    /// Pulled within the freshness window; nothing was fetched.
    Cached,
    Pulled,
}

/// Runs the checker container against a target directory.
pub struct ToolRunner {
    config: RunnerConfig,
    executor: Arc<dyn ProcessExecutor>,
    freshness: Arc<dyn FreshnessStore>,
}

impl ToolRunner {
    pub fn new(
        config: RunnerConfig,
        executor: Arc<dyn ProcessExecutor>,
        freshness: Arc<dyn FreshnessStore>,
    ) -> Self {
        Self {
            config,
            executor,
            freshness,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Where the report for `target` is written.
    #[must_use]
    pub fn report_path(&self, target: &Path) -> PathBuf {
        self.config.report_path_for(target)
    }

    #[must_use]
    pub fn last_pull(&self) -> Option<SystemTime> {
        self.freshness.last_pull(&self.config.cache_key)
    }

    /// Forget the last pull so the next run fetches the image again.
    pub fn invalidate_image_cache(&self) -> io::Result<()> {
        tracing::info!(key = %self.config.cache_key, "Invalidating image cache");
        self.freshness.forget(&self.config.cache_key)
    }

    /// Pull the image unless it was pulled less than `cache_duration` before `now`.
    pub async fn ensure_image(
        &self,
        cache_key: &str,
        now: SystemTime,
        cache_duration: Duration,
    ) -> Result<ImageStatus, ImagePullError> {
        if let Some(last) = self.freshness.last_pull(cache_key) {
            // A timestamp in the future (clock skew) also counts as fresh.
            let fresh = now
                .duration_since(last)
                .ok()
                .is_none_or(|age| age < cache_duration);
            if fresh {
                tracing::debug!(image = %self.config.image, "Image is fresh, skipping pull");
                return Ok(ImageStatus::Cached);
            }
        }

        tracing::info!(image = %self.config.image, "Pulling checker image");
        let pull = CommandSpec::new(
            self.config.runtime.as_str(),
            ["pull", self.config.image.as_str()],
        )
        .with_timeout(self.config.pull_timeout());

        let output = match self.executor.execute(&pull).await {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                return Err(ImagePullError::TimedOut {
                    timeout: self.config.pull_timeout().unwrap_or_default(),
                });
            }
            Err(e) => return Err(ImagePullError::Spawn(e)),
        };
        if !output.is_success() {
            return Err(ImagePullError::Failed {
                exit: output.exit,
                stderr: output.stderr.trim().to_string(),
            });
        }

        if let Err(e) = self.freshness.record_pull(cache_key, now) {
            tracing::warn!(key = cache_key, "Failed to record image pull: {e}");
        }
        self.prune_images().await;
        Ok(ImageStatus::Pulled)
    }

    /// Remove dangling images. Failures are logged only.
    async fn prune_images(&self) {
        let prune = CommandSpec::new(self.config.runtime.as_str(), ["image", "prune", "-f"])
            .with_timeout(self.config.pull_timeout());
        match self.executor.execute(&prune).await {
            Ok(output) if output.is_success() => {
                if !output.stderr.trim().is_empty() {
                    tracing::warn!(stderr = %output.stderr.trim(), "Image prune reported errors");
                }
            }
            Ok(output) => tracing::warn!(
                exit = %output.exit,
                stderr = %output.stderr.trim(),
                "Image prune failed"
            ),
            Err(e) => tracing::warn!("Image prune failed: {e}"),
        }
    }

    /// Run the checker over `target_dir`, writing into `report_dir`.
    ///
    /// Returns the path the report is expected at. The file may still be
    /// absent if the checker found nothing to write.
    pub async fn run(
        &self,
        target_dir: &Path,
        report_dir: &Path,
    ) -> Result<PathBuf, ToolExecutionError> {
        fs::create_dir_all(report_dir).map_err(|source| ToolExecutionError::ReportDirectory {
            path: report_dir.to_path_buf(),
            source,
        })?;

        let report_path = report_dir.join(&self.config.report_file);
        match fs::remove_file(&report_path) {
            Ok(()) => tracing::debug!(path = %report_path.display(), "Removed stale report"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %report_path.display(), "Failed to remove stale report: {e}");
            }
        }

        if let Err(e) = self
            .ensure_image(
                &self.config.cache_key,
                SystemTime::now(),
                self.config.cache_duration(),
            )
            .await
        {
            tracing::warn!("Using cached image after pull failure: {e}");
        }

        let target_dir = absolute(target_dir).unwrap_or_else(|_| target_dir.to_path_buf());
        let report_dir = absolute(report_dir).unwrap_or_else(|_| report_dir.to_path_buf());
        let command = CommandSpec::new(
            self.config.runtime.as_str(),
            [
                "run".to_string(),
                "--rm".to_string(),
                "-i".to_string(),
                "-v".to_string(),
                format!("{}:{}", target_dir.display(), self.config.delivery_mount),
                "-v".to_string(),
                format!("{}:{}", report_dir.display(), self.config.report_mount),
                self.config.image.clone(),
                self.config.delivery_mount.clone(),
                self.config.report_mount.clone(),
            ],
        )
        .with_timeout(self.config.run_timeout());

        tracing::info!(root = %target_dir.display(), "Running style checker");
        let output = self.executor.execute(&command).await.map_err(|e| {
            if e.kind() == io::ErrorKind::TimedOut {
                ToolExecutionError::TimedOut {
                    timeout: self.config.run_timeout().unwrap_or_default(),
                }
            } else {
                ToolExecutionError::Spawn {
                    program: self.config.runtime.clone(),
                    source: e,
                }
            }
        })?;

        if !output.is_success() {
            return Err(ToolExecutionError::NonZeroExit {
                exit: output.exit,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(report_dir.join(&self.config.report_file))
    }

    /// [`run`](Self::run) with the configured report directory under `target`.
    pub async fn run_for_target(&self, target: &Path) -> Result<PathBuf, ToolExecutionError> {
        let report_dir = self.config.report_dir_for(target);
        self.run(target, &report_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freshness::MemoryFreshnessStore;
    use crate::process::ProcessOutput;
    use crate::testing::{CommandKind, ScriptedExecutor, host_mounts};

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn runner(executor: &Arc<ScriptedExecutor>) -> ToolRunner {
        ToolRunner::new(
            RunnerConfig::default(),
            Arc::clone(executor) as Arc<dyn ProcessExecutor>,
            Arc::new(MemoryFreshnessStore::new()),
        )
    }

    #[tokio::test]
    async fn pull_happens_at_most_once_per_window() {
        let executor = Arc::new(ScriptedExecutor::new());
        let runner = runner(&executor);
        let now = SystemTime::now();

        let first = runner.ensure_image("lastImagePull", now, DAY).await.unwrap();
        let second = runner
            .ensure_image("lastImagePull", now + Duration::from_secs(60), DAY)
            .await
            .unwrap();

        assert_eq!(first, ImageStatus::Pulled);
        assert_eq!(second, ImageStatus::Cached);
        assert_eq!(executor.pull_count(), 1);
        assert_eq!(executor.count(CommandKind::Prune), 1);
    }

    #[tokio::test]
    async fn expired_window_pulls_again() {
        let executor = Arc::new(ScriptedExecutor::new());
        let runner = runner(&executor);
        let now = SystemTime::now();

        runner.ensure_image("k", now, DAY).await.unwrap();
        let status = runner.ensure_image("k", now + DAY, DAY).await.unwrap();
        assert_eq!(status, ImageStatus::Pulled);
        assert_eq!(executor.pull_count(), 2);
    }

    #[tokio::test]
    async fn future_timestamp_counts_as_fresh() {
        let executor = Arc::new(ScriptedExecutor::new());
        let runner = runner(&executor);
        let now = SystemTime::now();

        runner.ensure_image("k", now + DAY, DAY).await.unwrap();
        let status = runner.ensure_image("k", now, DAY).await.unwrap();
        assert_eq!(status, ImageStatus::Cached);
    }

    #[tokio::test]
    async fn failed_pull_is_not_recorded_and_skips_prune() {
        let executor = Arc::new(
            ScriptedExecutor::new().with_pull(|_| Ok(ProcessOutput::failure(1, "denied\n"))),
        );
        let runner = runner(&executor);

        let err = runner
            .ensure_image("k", SystemTime::now(), DAY)
            .await
            .unwrap_err();
        assert!(matches!(&err, ImagePullError::Failed { stderr, .. } if stderr == "denied"));
        assert!(runner.last_pull().is_none());
        assert_eq!(executor.count(CommandKind::Prune), 0);
    }

    #[tokio::test]
    async fn prune_failure_is_swallowed() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .with_prune(|_| Err(io::Error::new(io::ErrorKind::NotFound, "no runtime"))),
        );
        let runner = runner(&executor);
        let status = runner
            .ensure_image("k", SystemTime::now(), DAY)
            .await
            .unwrap();
        assert_eq!(status, ImageStatus::Pulled);
    }

    #[tokio::test]
    async fn run_proceeds_after_pull_failure() {
        let dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(
            ScriptedExecutor::new()
                .with_pull(|_| Err(io::Error::new(io::ErrorKind::NotFound, "offline")))
                .with_report("coding-style-reports.log", "a.c:1:MAJOR:C-F3:x\n"),
        );
        let runner = runner(&executor);

        let report = runner.run_for_target(dir.path()).await.unwrap();
        assert_eq!(fs::read_to_string(&report).unwrap(), "a.c:1:MAJOR:C-F3:x\n");
        assert_eq!(executor.run_count(), 1);
    }

    #[tokio::test]
    async fn run_mounts_target_and_report_dir() {
        let dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::new());
        let runner = runner(&executor);

        let report = runner.run_for_target(dir.path()).await.unwrap();

        let run = executor
            .calls()
            .into_iter()
            .find(|c| CommandKind::of(c) == CommandKind::Run)
            .unwrap();
        let mounts = host_mounts(&run);
        assert_eq!(mounts, vec![dir.path().to_path_buf(), dir.path().join(".vscode")]);
        assert_eq!(
            &run.args[run.args.len() - 3..],
            [
                RunnerConfig::default().image,
                "/mnt/delivery".to_string(),
                "/mnt/reports".to_string()
            ]
        );
        assert!(dir.path().join(".vscode").is_dir());
        assert_eq!(report, dir.path().join(".vscode/coding-style-reports.log"));
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(
            ScriptedExecutor::new().with_run(|_| Ok(ProcessOutput::failure(125, " no space \n"))),
        );
        let runner = runner(&executor);

        let err = runner.run_for_target(dir.path()).await.unwrap_err();
        assert_eq!(err.exit_code(), Some(125));
        assert_eq!(err.stderr(), Some("no space"));
    }

    #[tokio::test]
    async fn spawn_and_timeout_errors_are_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(
            ScriptedExecutor::new()
                .with_run(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "slow"))),
        );
        let err = runner(&executor).run_for_target(dir.path()).await.unwrap_err();
        assert!(matches!(err, ToolExecutionError::TimedOut { .. }));

        let executor = Arc::new(
            ScriptedExecutor::new()
                .with_run(|_| Err(io::Error::new(io::ErrorKind::NotFound, "docker"))),
        );
        let err = runner(&executor).run_for_target(dir.path()).await.unwrap_err();
        assert!(matches!(err, ToolExecutionError::Spawn { .. }));
    }

    #[tokio::test]
    async fn stale_report_is_removed_before_run() {
        let dir = tempfile::tempdir().unwrap();
        let report_dir = dir.path().join(".vscode");
        fs::create_dir_all(&report_dir).unwrap();
        fs::write(report_dir.join("coding-style-reports.log"), "old.c:1:MAJOR:C-F3:x\n").unwrap();

        let executor = Arc::new(
            ScriptedExecutor::new().with_run(|_| Ok(ProcessOutput::failure(1, "boom"))),
        );
        assert!(runner(&executor).run_for_target(dir.path()).await.is_err());
        assert!(!report_dir.join("coding-style-reports.log").exists());
    }

    #[tokio::test]
    async fn report_directory_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the report directory should go.
        fs::write(dir.path().join(".vscode"), "").unwrap();
        let executor = Arc::new(ScriptedExecutor::new());

        let err = runner(&executor).run_for_target(dir.path()).await.unwrap_err();
        assert!(matches!(err, ToolExecutionError::ReportDirectory { .. }));
        assert_eq!(executor.run_count(), 0);
    }

    #[tokio::test]
    async fn invalidate_forces_next_pull() {
        let executor = Arc::new(ScriptedExecutor::new());
        let runner = runner(&executor);
        let now = SystemTime::now();

        runner.ensure_image("lastImagePull", now, DAY).await.unwrap();
        runner.invalidate_image_cache().unwrap();
        assert!(runner.last_pull().is_none());
        runner.ensure_image("lastImagePull", now, DAY).await.unwrap();
        assert_eq!(executor.pull_count(), 2);
    }
}
