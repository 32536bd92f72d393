use std::fs;
use std::io;
use std::path::Path;

use stylewatch_types::{FileFindings, Finding, Severity};

use crate::error::{MalformedReportLineError, ReportError};
use crate::exclusion::ExclusionMatcher;

/// Minimum `:`-separated fields: path, line, severity, code.
const MIN_FIELDS: usize = 4;

/// One structurally valid report line, before exclusion rules are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// Normalized workspace-relative path.
    pub path: String,
    pub finding: Finding,
}

/// Strip a single leading `./` from a report path.
#[must_use]
pub fn normalize_report_path(raw: &str) -> &str {
    raw.strip_prefix("./").unwrap_or(raw)
}

/// Whether `path` lies under a directory literally named `tests`.
#[must_use]
pub fn is_test_path(path: &str) -> bool {
    path.starts_with("tests/") || path.contains("/tests/")
}

/// Converts checker report text into per-file findings.
#[derive(Debug, Clone, Default)]
pub struct ReportParser {
    exclusions: ExclusionMatcher,
}

impl ReportParser {
    #[must_use]
    pub fn new(exclusions: ExclusionMatcher) -> Self {
        Self { exclusions }
    }

    /// Parser using the ignore file found at the project root, if any.
    #[must_use]
    pub fn for_project(root: &Path, ignore_file: &str) -> Self {
        Self::new(ExclusionMatcher::load(root, ignore_file))
    }

    #[must_use]
    pub fn exclusions(&self) -> &ExclusionMatcher {
        &self.exclusions
    }

    /// Structural parse of one line. `index` is the 1-based line position in the report.
    pub fn parse_line(index: usize, raw: &str) -> Result<ParsedLine, MalformedReportLineError> {
        let fields: Vec<&str> = raw.split(':').collect();
        if fields.len() < MIN_FIELDS {
            return Err(MalformedReportLineError::MissingFields {
                index,
                found: fields.len(),
                raw: raw.to_string(),
            });
        }

        let line_number = fields[1]
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .ok_or_else(|| MalformedReportLineError::InvalidLineNumber {
                index,
                value: fields[1].to_string(),
                raw: raw.to_string(),
            })?;

        // The message keeps any ':' inside the free text.
        let message = fields[2..].join(":").trim().to_string();
        let mut tokens = message.splitn(3, ':');
        let severity = Severity::parse(tokens.next().unwrap_or_default().trim());
        let code = tokens.next().unwrap_or_default().trim().to_string();

        Ok(ParsedLine {
            path: normalize_report_path(fields[0]).to_string(),
            finding: Finding::new(line_number, severity, code, message),
        })
    }

    /// Whether findings for `path` should be kept.
    #[must_use]
    pub fn accepts(&self, path: &str) -> bool {
        if is_test_path(path) {
            return false;
        }
        if let Some(pattern) = self.exclusions.matching_pattern(path) {
            tracing::trace!(path, pattern, "Report path excluded");
            return false;
        }
        true
    }

    /// Parse report text. Malformed lines are logged and skipped.
    #[must_use]
    pub fn parse(&self, text: &str) -> FileFindings {
        self.parse_detailed(text).0
    }

    /// Parse report text, also returning every malformed line encountered.
    #[must_use]
    pub fn parse_detailed(&self, text: &str) -> (FileFindings, Vec<MalformedReportLineError>) {
        let mut findings = FileFindings::new();
        let mut malformed = Vec::new();

        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match Self::parse_line(i + 1, line) {
                Ok(parsed) => {
                    if self.accepts(&parsed.path) {
                        findings.push(parsed.path, parsed.finding);
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping malformed report line: {e}");
                    malformed.push(e);
                }
            }
        }

        tracing::debug!(
            files = findings.file_count(),
            findings = findings.total_count(),
            malformed = malformed.len(),
            "Parsed report"
        );
        (findings, malformed)
    }

    /// Parse the report file at `path`. An absent report means zero findings.
    pub fn parse_file(&self, path: &Path) -> Result<FileFindings, ReportError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(self.parse(&text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Report file not found");
                Ok(FileFindings::new())
            }
            Err(source) => Err(ReportError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
