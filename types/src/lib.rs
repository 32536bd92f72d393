//! Core domain types for stylewatch.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod rules;
pub use rules::{UNKNOWN_RULE_DESCRIPTION, rule_description};

use std::collections::HashMap;
use std::collections::hash_map;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Severity
// ============================================================================

/// Severity reported by the style checker for a single finding.
///
/// Unknown severities are kept verbatim in [`Severity::Unrecognized`] rather
/// than coerced to a default; the presentation boundary decides how to show them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Major,
    Minor,
    Info,
    Unrecognized(String),
}

impl Severity {
    /// Parse a report severity token. Matching is exact (the checker emits upper case).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "MAJOR" => Self::Major,
            "MINOR" => Self::Minor,
            "INFO" => Self::Info,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Major => "MAJOR",
            Self::Minor => "MINOR",
            Self::Info => "INFO",
            Self::Unrecognized(raw) => raw,
        }
    }

    #[must_use]
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }

    /// Diagnostic level used when the finding is rendered.
    ///
    /// Unrecognized severities fall back to [`DiagnosticLevel::Hint`].
    #[must_use]
    pub fn diagnostic_level(&self) -> DiagnosticLevel {
        match self {
            Self::Major | Self::Minor => DiagnosticLevel::Warning,
            Self::Info => DiagnosticLevel::Information,
            Self::Unrecognized(_) => DiagnosticLevel::Hint,
        }
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        match value {
            Severity::Unrecognized(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editor-style diagnostic level a finding is published at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticLevel {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

impl DiagnosticLevel {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "info",
            Self::Hint => "hint",
        }
    }
}

// ============================================================================
// Findings
// ============================================================================

/// One issue reported by the style checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// 0-indexed line number (the report is 1-indexed).
    line: u32,
    severity: Severity,
    /// Taxonomy identifier, e.g. `C-F3`.
    code: String,
    /// Trimmed remainder of the report line, severity and code included.
    message: String,
}

impl Finding {
    #[must_use]
    pub fn new(line: u32, severity: Severity, code: String, message: String) -> Self {
        Self {
            line,
            severity,
            code,
            message,
        }
    }

    /// 0-indexed line number.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn severity(&self) -> &Severity {
        &self.severity
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Static description of the finding's rule code.
    #[must_use]
    pub fn description(&self) -> &'static str {
        rule_description(&self.code)
    }

    /// Diagnostic text shown to the user: `<code> - <description>`.
    #[must_use]
    pub fn diagnostic_text(&self) -> String {
        format!("{} - {}", self.code, self.description())
    }
}

/// Findings keyed by workspace-relative path (forward slashes, no leading `./`).
///
/// Each file keeps its findings in report order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileFindings {
    files: HashMap<String, Vec<Finding>>,
}

impl FileFindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finding for `path`, creating the entry if absent.
    pub fn push(&mut self, path: impl Into<String>, finding: Finding) {
        self.files.entry(path.into()).or_default().push(finding);
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&[Finding]> {
        self.files.get(path).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Number of files with at least one finding.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Total findings across all files.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, Vec<Finding>> {
        self.files.iter()
    }

    /// Paths in lexical order, for deterministic output.
    #[must_use]
    pub fn sorted_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.files.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}

impl IntoIterator for FileFindings {
    type Item = (String, Vec<Finding>);
    type IntoIter = hash_map::IntoIter<String, Vec<Finding>>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

impl<'a> IntoIterator for &'a FileFindings {
    type Item = (&'a String, &'a Vec<Finding>);
    type IntoIter = hash_map::Iter<'a, String, Vec<Finding>>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}
