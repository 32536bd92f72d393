//! Analysis orchestration for stylewatch.
//!
//! [`AnalysisCoordinator`] turns trigger events into single-flight runs of the
//! style checker per workspace root, parses each report and publishes the
//! findings to a [`DiagnosticsSink`].
//!
//! ```text
//! trigger -> TargetValidator -> ToolRunner::run -> ReportParser::parse_file -> DiagnosticsSink
//! ```

mod config;
mod coordinator;
mod notify;
mod sink;
mod sleeper;
mod validator;

pub use config::{CoordinatorConfig, DEFAULT_DEBOUNCE_DELAY_MS};
pub use coordinator::{
    AnalysisCoordinator, AnalysisError, CoordinatorBuilder, DEFAULT_IGNORE_FILE, RunOutcome,
    SkipReason,
};
pub use notify::{Notifier, TracingNotifier};
pub use sink::{Diagnostic, DiagnosticsSink, DiagnosticsSnapshot, DiagnosticsStore};
pub use sleeper::{SleepFut, Sleeper, TokioSleeper};
pub use validator::{InvalidTargetError, TargetValidator, WorkspaceValidator, has_sources};
