//! Diagnostics publication.
//!
//! The coordinator hands every run's findings to a [`DiagnosticsSink`], keyed by
//! absolute path. [`DiagnosticsStore`] is the in-process sink the CLI renders
//! from; editor integrations provide their own.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use stylewatch_types::{DiagnosticLevel, Finding};

/// Receives per-file findings.
pub trait DiagnosticsSink: Send + Sync {
    /// Replace the findings shown for `path`.
    fn update(&self, path: PathBuf, findings: Vec<Finding>);
    /// Drop findings for every file under `root`.
    fn clear_target(&self, root: &Path);
    fn clear_all(&self);
    /// Release the sink. Later updates are ignored.
    fn dispose(&self);
}

/// A finding as rendered at the editor boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    level: DiagnosticLevel,
    line: u32,
    code: String,
    text: String,
}

impl Diagnostic {
    #[must_use]
    pub fn from_finding(finding: &Finding) -> Self {
        let severity = finding.severity();
        if !severity.is_recognized() {
            tracing::warn!(
                severity = %severity,
                code = finding.code(),
                "Unknown severity, publishing as hint"
            );
        }
        Self {
            level: severity.diagnostic_level(),
            line: finding.line(),
            code: finding.code().to_string(),
            text: finding.diagnostic_text(),
        }
    }

    #[must_use]
    pub fn level(&self) -> DiagnosticLevel {
        self.level
    }

    /// 0-indexed line.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// `<code> - <description>`.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Point-in-time copy of a [`DiagnosticsStore`], sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    files: Vec<(PathBuf, Vec<Diagnostic>)>,
}

impl DiagnosticsSnapshot {
    #[must_use]
    pub fn files(&self) -> &[(PathBuf, Vec<Diagnostic>)] {
        &self.files
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.files.iter().map(|(_, items)| items.len()).sum()
    }

    #[must_use]
    pub fn count(&self, level: DiagnosticLevel) -> usize {
        self.files
            .iter()
            .flat_map(|(_, items)| items)
            .filter(|d| d.level() == level)
            .count()
    }

    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&[Diagnostic]> {
        self.files
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, items)| items.as_slice())
    }
}

/// In-memory [`DiagnosticsSink`].
#[derive(Debug, Default)]
pub struct DiagnosticsStore {
    data: Mutex<HashMap<PathBuf, Vec<Diagnostic>>>,
    disposed: AtomicBool,
}

impl DiagnosticsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> MutexGuard<'_, HashMap<PathBuf, Vec<Diagnostic>>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let mut files: Vec<(PathBuf, Vec<Diagnostic>)> = self
            .data()
            .iter()
            .map(|(path, items)| (path.clone(), items.clone()))
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        DiagnosticsSnapshot { files }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl DiagnosticsSink for DiagnosticsStore {
    fn update(&self, path: PathBuf, findings: Vec<Finding>) {
        if self.is_disposed() {
            tracing::debug!(path = %path.display(), "Ignoring update on disposed sink");
            return;
        }
        let items: Vec<Diagnostic> = findings.iter().map(Diagnostic::from_finding).collect();
        let mut data = self.data();
        if items.is_empty() {
            data.remove(&path);
        } else {
            data.insert(path, items);
        }
    }

    fn clear_target(&self, root: &Path) {
        self.data().retain(|path, _| !path.starts_with(root));
    }

    fn clear_all(&self) {
        self.data().clear();
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.data().clear();
    }
}
