//! Single-flight analysis scheduling.
//!
//! Each target root is IDLE or RUNNING and owns at most one pending run:
//!
//! - A trigger on an idle root starts a run right away.
//! - A trigger on a running root (re)arms the pending run's debounce timer.
//!   The previous timer is aborted and its waiters move to the new one.
//! - When the timer elapses on an idle root, the timer task starts the run.
//!   If the root is still running, the pending run is marked ready and the
//!   finishing run starts it as soon as it completes.
//!
//! Every caller awaits the outcome of the run that serves its trigger, so a
//! burst of triggers during a run yields exactly one trailing run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use stylewatch_report::{ReportError, ReportParser};
use stylewatch_runner::{ToolExecutionError, ToolRunner};
use stylewatch_types::FileFindings;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::CoordinatorConfig;
use crate::notify::{Notifier, TracingNotifier};
use crate::sink::DiagnosticsSink;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::validator::{InvalidTargetError, TargetValidator};

pub const DEFAULT_IGNORE_FILE: &str = ".gitignore";

/// Failures that end a run. Everything else is recovered where it happens.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Tool(#[from] ToolExecutionError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    ShutDown,
    InvalidTarget(InvalidTargetError),
}

/// What a trigger resulted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run finished; total findings published.
    Completed(usize),
    /// The run failed; the user was notified.
    Failed(String),
    Skipped(SkipReason),
    /// Shutdown happened before the coalesced run started.
    Cancelled,
}

impl RunOutcome {
    /// Finding count to report to the caller. Zero unless completed.
    #[must_use]
    pub fn total(&self) -> usize {
        match self {
            Self::Completed(total) => *total,
            _ => 0,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Status indicator text.
    #[must_use]
    pub fn status_line(&self) -> String {
        match self {
            Self::Completed(0) | Self::Skipped(SkipReason::InvalidTarget(_)) => {
                "No Coding Style Errors".to_string()
            }
            Self::Completed(1) => "1 Coding Style Error".to_string(),
            Self::Completed(n) => format!("{n} Coding Style Errors"),
            Self::Failed(_) => "Coding Style Check Failed".to_string(),
            Self::Skipped(SkipReason::Disabled) => "Disabled".to_string(),
            Self::Skipped(SkipReason::ShutDown) | Self::Cancelled => "Stopped".to_string(),
        }
    }
}

type Waiter = oneshot::Sender<RunOutcome>;

#[derive(Default)]
struct TargetSlot {
    running: bool,
    pending: Option<PendingRun>,
}

/// A coalesced run. `timer` is `None` once the debounce has elapsed.
struct PendingRun {
    id: u64,
    timer: Option<JoinHandle<()>>,
    waiters: Vec<Waiter>,
}

impl PendingRun {
    fn is_ready(&self) -> bool {
        self.timer.is_none()
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct Inner {
    runner: ToolRunner,
    sink: Arc<dyn DiagnosticsSink>,
    validator: Arc<dyn TargetValidator>,
    notifier: Arc<dyn Notifier>,
    sleeper: Arc<dyn Sleeper>,
    ignore_file: String,
    debounce: Duration,
    enabled: AtomicBool,
    shut_down: AtomicBool,
    next_pending_id: AtomicU64,
    /// Held while toggling and while publishing, so a disable never
    /// interleaves with a run's updates.
    publish: Mutex<()>,
    targets: Mutex<HashMap<PathBuf, TargetSlot>>,
}

/// Schedules analyses. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AnalysisCoordinator {
    inner: Arc<Inner>,
}

pub struct CoordinatorBuilder {
    runner: ToolRunner,
    sink: Arc<dyn DiagnosticsSink>,
    validator: Arc<dyn TargetValidator>,
    config: CoordinatorConfig,
    notifier: Arc<dyn Notifier>,
    sleeper: Arc<dyn Sleeper>,
    ignore_file: String,
}

impl CoordinatorBuilder {
    pub fn config(mut self, config: &CoordinatorConfig) -> Self {
        self.config = config.clone();
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Ignore file read from each target root before parsing its report.
    pub fn ignore_file(mut self, name: impl Into<String>) -> Self {
        self.ignore_file = name.into();
        self
    }

    #[must_use]
    pub fn build(self) -> AnalysisCoordinator {
        AnalysisCoordinator {
            inner: Arc::new(Inner {
                runner: self.runner,
                sink: self.sink,
                validator: self.validator,
                notifier: self.notifier,
                sleeper: self.sleeper,
                ignore_file: self.ignore_file,
                debounce: self.config.debounce_delay(),
                enabled: AtomicBool::new(self.config.enabled),
                shut_down: AtomicBool::new(false),
                next_pending_id: AtomicU64::new(0),
                publish: Mutex::new(()),
                targets: Mutex::new(HashMap::new()),
            }),
        }
    }
}

impl AnalysisCoordinator {
    pub fn builder(
        runner: ToolRunner,
        sink: Arc<dyn DiagnosticsSink>,
        validator: Arc<dyn TargetValidator>,
    ) -> CoordinatorBuilder {
        CoordinatorBuilder {
            runner,
            sink,
            validator,
            config: CoordinatorConfig::default(),
            notifier: Arc::new(TracingNotifier),
            sleeper: Arc::new(TokioSleeper),
            ignore_file: DEFAULT_IGNORE_FILE.to_string(),
        }
    }

    #[must_use]
    pub fn runner(&self) -> &ToolRunner {
        &self.inner.runner
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Toggle analysis. Disabling clears every published diagnostic, including
    /// whatever a run still in flight would have published.
    ///
    /// Re-enabling does not start a run; hosts trigger the roots they care
    /// about again.
    pub fn set_enabled(&self, enabled: bool) {
        let _publish = self.inner.publishing();
        let was = self.inner.enabled.swap(enabled, Ordering::AcqRel);
        if was == enabled {
            return;
        }
        tracing::info!(enabled, "Analysis toggled");
        if !enabled {
            self.inner.sink.clear_all();
        }
    }

    /// Whether a run is in flight for `root`.
    #[must_use]
    pub fn is_running(&self, root: &Path) -> bool {
        self.inner
            .targets()
            .get(root)
            .is_some_and(|slot| slot.running)
    }

    pub fn clear_all(&self) {
        self.inner.sink.clear_all();
    }

    /// Request an analysis of the root containing `path`.
    ///
    /// Resolves once the run serving this trigger has finished. Triggers that
    /// arrive while the root is running share one trailing run.
    pub async fn trigger(&self, path: &Path) -> RunOutcome {
        if self.inner.shut_down.load(Ordering::Acquire) {
            return RunOutcome::Skipped(SkipReason::ShutDown);
        }
        if !self.is_enabled() {
            return RunOutcome::Skipped(SkipReason::Disabled);
        }
        let root = match self.inner.validator.resolve(path) {
            Ok(root) => root,
            Err(e) => {
                tracing::debug!(path = %path.display(), "Ignoring trigger: {e}");
                return RunOutcome::Skipped(SkipReason::InvalidTarget(e));
            }
        };

        let (tx, rx) = oneshot::channel();
        Inner::schedule(&self.inner, root, tx);
        rx.await.unwrap_or(RunOutcome::Cancelled)
    }

    /// Cancel pending runs, refuse new triggers and dispose the sink.
    ///
    /// A run already in flight finishes, but its results go nowhere.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let pending: Vec<PendingRun> = self
            .inner
            .targets()
            .values_mut()
            .filter_map(|slot| slot.pending.take())
            .collect();
        for mut run in pending {
            run.cancel_timer();
            for waiter in run.waiters {
                let _ = waiter.send(RunOutcome::Cancelled);
            }
        }
        self.inner.sink.dispose();
        tracing::info!("Analysis coordinator shut down");
    }
}

impl Inner {
    fn targets(&self) -> MutexGuard<'_, HashMap<PathBuf, TargetSlot>> {
        self.targets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publishing(&self) -> MutexGuard<'_, ()> {
        self.publish.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule(this: &Arc<Self>, root: PathBuf, waiter: Waiter) {
        let mut targets = this.targets();
        let slot = targets.entry(root.clone()).or_default();

        let mut waiters = Vec::new();
        if let Some(mut previous) = slot.pending.take() {
            previous.cancel_timer();
            waiters = previous.waiters;
        }
        waiters.push(waiter);

        if slot.running {
            let id = this.next_pending_id.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                root = %root.display(),
                coalesced = waiters.len(),
                "Run in flight, deferring trigger"
            );
            let timer = tokio::spawn(Self::debounce(Arc::clone(this), root, id));
            slot.pending = Some(PendingRun {
                id,
                timer: Some(timer),
                waiters,
            });
        } else {
            slot.running = true;
            drop(targets);
            tokio::spawn(Self::drive(Arc::clone(this), root, waiters));
        }
    }

    async fn debounce(this: Arc<Self>, root: PathBuf, id: u64) {
        this.sleeper.sleep(this.debounce).await;

        let waiters = {
            let mut targets = this.targets();
            let Some(slot) = targets.get_mut(&root) else {
                return;
            };
            let Some(pending) = slot.pending.as_mut().filter(|p| p.id == id) else {
                // Replaced after the sleep finished.
                return;
            };
            if slot.running {
                pending.timer = None;
                tracing::debug!(root = %root.display(), "Debounce elapsed, waiting for current run");
                return;
            }
            slot.running = true;
            slot.pending
                .take()
                .map(|p| p.waiters)
                .unwrap_or_default()
        };
        Self::drive(this, root, waiters).await;
    }

    /// Run `root` until no ready pending run is left.
    async fn drive(this: Arc<Self>, root: PathBuf, mut waiters: Vec<Waiter>) {
        let _unwind = UnwindReset {
            inner: &this,
            root: &root,
        };
        loop {
            let outcome = this.analyze(&root).await;
            for waiter in waiters.drain(..) {
                let _ = waiter.send(outcome.clone());
            }

            let mut targets = this.targets();
            let Some(slot) = targets.get_mut(&root) else {
                return;
            };
            let ready = slot.pending.as_ref().is_some_and(PendingRun::is_ready);
            if ready && !this.shut_down.load(Ordering::Acquire) {
                waiters = slot
                    .pending
                    .take()
                    .map(|p| p.waiters)
                    .unwrap_or_default();
                tracing::debug!(root = %root.display(), "Starting coalesced run");
                continue;
            }

            slot.running = false;
            if slot.pending.is_none() {
                targets.remove(&root);
            }
            return;
        }
    }

    async fn analyze(&self, root: &Path) -> RunOutcome {
        if !self.enabled.load(Ordering::Acquire) {
            return RunOutcome::Skipped(SkipReason::Disabled);
        }

        tracing::info!(root = %root.display(), "Starting analysis");
        self.sink.clear_target(root);
        match self.execute(root).await {
            Ok(findings) => self.publish(root, findings),
            Err(e) if !self.enabled.load(Ordering::Acquire) => {
                tracing::debug!(root = %root.display(), "Analysis disabled during failed run: {e}");
                RunOutcome::Skipped(SkipReason::Disabled)
            }
            Err(e) => {
                tracing::error!(root = %root.display(), "Analysis failed: {e}");
                self.notifier
                    .error(&format!("Coding style check failed: {e}"));
                RunOutcome::Failed(e.to_string())
            }
        }
    }

    async fn execute(&self, root: &Path) -> Result<FileFindings, AnalysisError> {
        let report_path = self.runner.run_for_target(root).await?;
        let parser = ReportParser::for_project(root, &self.ignore_file);
        Ok(parser.parse_file(&report_path)?)
    }

    fn publish(&self, root: &Path, findings: FileFindings) -> RunOutcome {
        let _publish = self.publishing();
        if !self.enabled.load(Ordering::Acquire) {
            tracing::info!(root = %root.display(), "Analysis disabled during run, dropping findings");
            return RunOutcome::Skipped(SkipReason::Disabled);
        }

        let total = findings.total_count();
        for (path, items) in findings {
            self.sink.update(root.join(path), items);
        }
        tracing::info!(root = %root.display(), total, "Analysis complete");
        RunOutcome::Completed(total)
    }
}

/// Returns a root to IDLE if its run task unwinds. A pending run whose
/// debounce already elapsed is dropped, so its waiters see `Cancelled`.
struct UnwindReset<'a> {
    inner: &'a Inner,
    root: &'a Path,
}

impl Drop for UnwindReset<'_> {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }
        let mut targets = self.inner.targets();
        let Some(slot) = targets.get_mut(self.root) else {
            return;
        };
        slot.running = false;
        if slot.pending.as_ref().is_some_and(PendingRun::is_ready) {
            slot.pending = None;
        }
        if slot.pending.is_none() {
            targets.remove(self.root);
        }
        tracing::error!(root = %self.root.display(), "Analysis task panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::DiagnosticsStore;
    use crate::validator::WorkspaceValidator;
    use stylewatch_runner::testing::ScriptedExecutor;
    use stylewatch_runner::{MemoryFreshnessStore, ProcessOutput, RunnerConfig};
    use stylewatch_types::{Finding, Severity};
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    const REPORT_FILE: &str = "coding-style-reports.log";
    const RUN_TIME: Duration = Duration::from_secs(1);

    #[derive(Default)]
    struct RecordingNotifier {
        errors: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) -> crate::sleeper::SleepFut<'_> {
            self.sleeps.lock().unwrap().push(duration);
            Box::pin(tokio::time::sleep(duration))
        }
    }

    struct Fixture {
        dir: TempDir,
        executor: Arc<ScriptedExecutor>,
        store: Arc<DiagnosticsStore>,
        notifier: Arc<RecordingNotifier>,
        coordinator: AnalysisCoordinator,
    }

    impl Fixture {
        fn new(executor: ScriptedExecutor) -> Self {
            Self::with_sleeper(executor, Arc::new(TokioSleeper))
        }

        fn with_sleeper(executor: ScriptedExecutor, sleeper: Arc<dyn Sleeper>) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let executor = Arc::new(executor);
            let store = Arc::new(DiagnosticsStore::new());
            let notifier = Arc::new(RecordingNotifier::default());
            let runner = ToolRunner::new(
                RunnerConfig::default(),
                Arc::clone(&executor) as _,
                Arc::new(MemoryFreshnessStore::new()),
            );
            let validator = WorkspaceValidator::new([dir.path()]).with_banned_extensions(["md"]);
            let coordinator =
                AnalysisCoordinator::builder(runner, Arc::clone(&store) as _, Arc::new(validator))
                    .notifier(Arc::clone(&notifier) as _)
                    .sleeper(sleeper)
                    .build();
            Self {
                dir,
                executor,
                store,
                notifier,
                coordinator,
            }
        }

        fn file(&self, relative: &str) -> PathBuf {
            self.dir.path().join(relative)
        }

        fn spawn_trigger(&self, relative: &str) -> JoinHandle<RunOutcome> {
            let coordinator = self.coordinator.clone();
            let path = self.file(relative);
            tokio::spawn(async move { coordinator.trigger(&path).await })
        }
    }

    fn reporting(content: &str) -> ScriptedExecutor {
        ScriptedExecutor::new()
            .with_run_delay(RUN_TIME)
            .with_report(REPORT_FILE, content)
    }

    #[tokio::test(start_paused = true)]
    async fn single_run_publishes_findings() {
        let fx = Fixture::new(reporting(
            "./src/main.c:12:MAJOR:C-F3:Line too long\ntests/t.c:1:MINOR:C-L2:x\n",
        ));

        let outcome = fx.coordinator.trigger(&fx.file("src/main.c")).await;

        assert_eq!(outcome, RunOutcome::Completed(1));
        assert_eq!(outcome.status_line(), "1 Coding Style Error");
        let snap = fx.store.snapshot();
        let diags = snap.get(&fx.file("src/main.c")).unwrap();
        assert_eq!(diags[0].line(), 11);
        assert_eq!(diags[0].text(), "C-F3 - Line exceeds 80 columns");
        assert!(!fx.coordinator.is_running(fx.dir.path()));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_during_run_yields_exactly_one_more_run() {
        let fx = Fixture::new(reporting("a.c:1:MAJOR:C-F3:x\n"));

        let first = fx.spawn_trigger("a.c");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fx.coordinator.is_running(fx.dir.path()));

        let second = fx.spawn_trigger("a.c");
        let third = fx.spawn_trigger("b.c");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fx.executor.run_count(), 1);

        assert_eq!(first.await.unwrap(), RunOutcome::Completed(1));
        assert_eq!(second.await.unwrap(), RunOutcome::Completed(1));
        assert_eq!(third.await.unwrap(), RunOutcome::Completed(1));
        assert_eq!(fx.executor.run_count(), 2);
        assert_eq!(fx.executor.pull_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_run_waits_for_debounce_after_fast_run() {
        let executor = ScriptedExecutor::new()
            .with_run_delay(Duration::from_millis(100))
            .with_report(REPORT_FILE, "");
        let fx = Fixture::new(executor);
        let start = tokio::time::Instant::now();

        let first = fx.spawn_trigger("a.c");
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = fx.spawn_trigger("a.c");

        assert_eq!(first.await.unwrap(), RunOutcome::Completed(0));
        assert_eq!(fx.executor.run_count(), 1);
        assert_eq!(second.await.unwrap(), RunOutcome::Completed(0));
        assert_eq!(fx.executor.run_count(), 2);
        // Coalesced run starts one debounce after the last trigger.
        assert!(start.elapsed() >= Duration::from_millis(50 + 500 + 100));
    }

    #[tokio::test(start_paused = true)]
    async fn later_trigger_restarts_debounce() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let fx = Fixture::with_sleeper(reporting(""), Arc::clone(&sleeper) as _);

        let first = fx.spawn_trigger("a.c");
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = fx.spawn_trigger("a.c");
        tokio::time::sleep(Duration::from_millis(300)).await;
        let third = fx.spawn_trigger("a.c");

        first.await.unwrap();
        second.await.unwrap();
        third.await.unwrap();
        assert_eq!(fx.executor.run_count(), 2);
        assert_eq!(
            *sleeper.sleeps.lock().unwrap(),
            vec![Duration::from_millis(500); 2]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_notifies_once_and_still_runs_pending() {
        let executor = ScriptedExecutor::new()
            .with_run_delay(RUN_TIME)
            .with_run(|_| Ok(ProcessOutput::failure(1, "container crashed")));
        let fx = Fixture::new(executor);

        let first = fx.spawn_trigger("a.c");
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = fx.spawn_trigger("a.c");

        let outcome = first.await.unwrap();
        assert!(matches!(outcome, RunOutcome::Failed(ref msg) if msg.contains("container crashed")));
        assert_eq!(fx.notifier.errors.lock().unwrap().len(), 1);

        assert!(matches!(second.await.unwrap(), RunOutcome::Failed(_)));
        assert_eq!(fx.notifier.errors.lock().unwrap().len(), 2);
        assert!(!fx.coordinator.is_running(fx.dir.path()));
    }

    #[tokio::test(start_paused = true)]
    async fn run_clears_previous_diagnostics_of_target() {
        let fx = Fixture::new(reporting("b.c:2:MINOR:C-G7:trailing\n"));
        let stale = fx.file("a.c");
        fx.store.update(
            stale.clone(),
            vec![Finding::new(0, Severity::Major, "C-F3".into(), "x".into())],
        );

        fx.coordinator.trigger(&fx.file("b.c")).await;

        let snap = fx.store.snapshot();
        assert!(snap.get(&stale).is_none());
        assert_eq!(snap.get(&fx.file("b.c")).unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_target_touches_nothing() {
        let fx = Fixture::new(reporting(""));
        let existing = fx.file("a.c");
        fx.store.update(
            existing.clone(),
            vec![Finding::new(0, Severity::Major, "C-F3".into(), "x".into())],
        );

        let outcome = fx.coordinator.trigger(&fx.file("README.md")).await;
        assert!(matches!(
            outcome,
            RunOutcome::Skipped(SkipReason::InvalidTarget(
                InvalidTargetError::BannedExtension { .. }
            ))
        ));
        assert_eq!(outcome.total(), 0);

        let outside = fx.coordinator.trigger(Path::new("/somewhere/else.c")).await;
        assert!(matches!(
            outside,
            RunOutcome::Skipped(SkipReason::InvalidTarget(
                InvalidTargetError::OutsideWorkspace { .. }
            ))
        ));

        assert_eq!(fx.executor.calls().len(), 0);
        assert!(fx.store.snapshot().get(&existing).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_coordinator_skips_and_clears() {
        let fx = Fixture::new(reporting("a.c:1:MAJOR:C-F3:x\n"));
        fx.coordinator.trigger(&fx.file("a.c")).await;
        assert!(!fx.store.snapshot().is_empty());

        fx.coordinator.set_enabled(false);
        assert!(fx.store.snapshot().is_empty());

        let outcome = fx.coordinator.trigger(&fx.file("a.c")).await;
        assert_eq!(outcome, RunOutcome::Skipped(SkipReason::Disabled));
        assert_eq!(outcome.status_line(), "Disabled");
        assert_eq!(fx.executor.run_count(), 1);

        fx.coordinator.set_enabled(true);
        assert_eq!(
            fx.coordinator.trigger(&fx.file("a.c")).await,
            RunOutcome::Completed(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_and_refuses_triggers() {
        let fx = Fixture::new(reporting("a.c:1:MAJOR:C-F3:x\n"));

        let first = fx.spawn_trigger("a.c");
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = fx.spawn_trigger("a.c");
        tokio::time::sleep(Duration::from_millis(10)).await;

        fx.coordinator.shutdown();

        assert_eq!(second.await.unwrap(), RunOutcome::Cancelled);
        assert_eq!(first.await.unwrap(), RunOutcome::Completed(1));
        assert_eq!(fx.executor.run_count(), 1);
        assert!(fx.store.is_disposed());
        assert!(fx.store.snapshot().is_empty());
        assert_eq!(
            fx.coordinator.trigger(&fx.file("a.c")).await,
            RunOutcome::Skipped(SkipReason::ShutDown)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn roots_run_independently() {
        let dir = tempfile::tempdir().unwrap();
        let (one, two) = (dir.path().join("one"), dir.path().join("two"));
        std::fs::create_dir_all(&one).unwrap();
        std::fs::create_dir_all(&two).unwrap();

        let executor = Arc::new(reporting("a.c:1:MAJOR:C-F3:x\n"));
        let runner = ToolRunner::new(
            RunnerConfig::default(),
            Arc::clone(&executor) as _,
            Arc::new(MemoryFreshnessStore::new()),
        );
        let coordinator = AnalysisCoordinator::builder(
            runner,
            Arc::new(DiagnosticsStore::new()),
            Arc::new(WorkspaceValidator::new([&one, &two])),
        )
        .build();

        let (in_one, in_two) = (one.join("a.c"), two.join("a.c"));
        let (a, b) = tokio::join!(coordinator.trigger(&in_one), coordinator.trigger(&in_two));
        assert_eq!(a, RunOutcome::Completed(1));
        assert_eq!(b, RunOutcome::Completed(1));
        assert_eq!(executor.run_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_mid_run_drops_its_findings() {
        let gate = Arc::new(Semaphore::new(0));
        let fx = Fixture::new(
            ScriptedExecutor::new()
                .with_run_gate(Arc::clone(&gate))
                .with_report(REPORT_FILE, "a.c:1:MAJOR:C-F3:x\n"),
        );

        let run = fx.spawn_trigger("a.c");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(fx.coordinator.is_running(fx.dir.path()));

        fx.coordinator.set_enabled(false);
        gate.add_permits(1);

        assert_eq!(
            run.await.unwrap(),
            RunOutcome::Skipped(SkipReason::Disabled)
        );
        assert!(fx.store.snapshot().is_empty());
        assert!(fx.notifier.errors.lock().unwrap().is_empty());
        assert!(!fx.coordinator.is_running(fx.dir.path()));
    }

    #[tokio::test(start_paused = true)]
    async fn reenabling_does_not_start_a_run() {
        let fx = Fixture::new(reporting("a.c:1:MAJOR:C-F3:x\n"));
        fx.coordinator.set_enabled(false);
        fx.coordinator.set_enabled(true);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fx.executor.calls().len(), 0);
        assert!(fx.coordinator.is_enabled());
    }

    /// Panics on its first update, then forwards to a store.
    #[derive(Default)]
    struct PanicOnceSink {
        panicked: AtomicBool,
        store: DiagnosticsStore,
    }

    impl DiagnosticsSink for PanicOnceSink {
        fn update(&self, path: PathBuf, findings: Vec<Finding>) {
            assert!(
                self.panicked.swap(true, Ordering::SeqCst),
                "sink failure"
            );
            self.store.update(path, findings);
        }

        fn clear_target(&self, root: &Path) {
            self.store.clear_target(root);
        }

        fn clear_all(&self) {
            self.store.clear_all();
        }

        fn dispose(&self) {
            self.store.dispose();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_run_returns_root_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(reporting("a.c:1:MAJOR:C-F3:x\n"));
        let runner = ToolRunner::new(
            RunnerConfig::default(),
            Arc::clone(&executor) as _,
            Arc::new(MemoryFreshnessStore::new()),
        );
        let sink = Arc::new(PanicOnceSink::default());
        let coordinator = AnalysisCoordinator::builder(
            runner,
            Arc::clone(&sink) as _,
            Arc::new(WorkspaceValidator::new([dir.path()])),
        )
        .build();
        let file = dir.path().join("a.c");

        assert_eq!(coordinator.trigger(&file).await, RunOutcome::Cancelled);
        assert!(!coordinator.is_running(dir.path()));

        assert_eq!(coordinator.trigger(&file).await, RunOutcome::Completed(1));
        assert_eq!(executor.run_count(), 2);
        assert_eq!(sink.store.snapshot().total(), 1);
    }

    #[test]
    fn status_lines() {
        assert_eq!(
            RunOutcome::Completed(0).status_line(),
            "No Coding Style Errors"
        );
        assert_eq!(
            RunOutcome::Completed(3).status_line(),
            "3 Coding Style Errors"
        );
        assert_eq!(RunOutcome::Cancelled.total(), 0);
    }
}
