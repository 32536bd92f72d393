//! Terminal rendering of run results.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use stylewatch_engine::{DiagnosticsSnapshot, Notifier, RunOutcome, SkipReason};

/// Prints notifications to stderr as well as the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn error(&self, message: &str) {
        tracing::error!("{message}");
        eprintln!("error: {message}");
    }
}

/// `path:line: level code - description`, paths relative to `root`, lines 1-indexed.
pub fn finding_lines(snapshot: &DiagnosticsSnapshot, root: &Path) -> Vec<String> {
    let mut lines = Vec::with_capacity(snapshot.total());
    for (path, diagnostics) in snapshot.files() {
        let shown = path.strip_prefix(root).unwrap_or(path);
        for diagnostic in diagnostics {
            lines.push(format!(
                "{}:{}: {} {}",
                shown.display(),
                u64::from(diagnostic.line()) + 1,
                diagnostic.level().label(),
                diagnostic.text()
            ));
        }
    }
    lines
}

/// `0` clean or disabled, `1` findings, `2` no usable result.
pub fn exit_code(outcome: &RunOutcome) -> u8 {
    match outcome {
        RunOutcome::Completed(0) | RunOutcome::Skipped(SkipReason::Disabled) => 0,
        RunOutcome::Completed(_) => 1,
        RunOutcome::Failed(_) | RunOutcome::Skipped(_) | RunOutcome::Cancelled => 2,
    }
}

pub fn format_time(at: Option<SystemTime>) -> String {
    match at {
        Some(at) => DateTime::<Local>::from(at)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string(),
        None => "never".to_string(),
    }
}
