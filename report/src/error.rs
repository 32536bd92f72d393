use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A single report line that could not be parsed. Recovered locally: the line
/// is skipped and parsing continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReportLineError {
    #[error("report line {index}: expected at least 4 ':'-separated fields, got {found}: {raw:?}")]
    MissingFields {
        index: usize,
        found: usize,
        raw: String,
    },
    #[error("report line {index}: invalid line number {value:?}: {raw:?}")]
    InvalidLineNumber {
        index: usize,
        value: String,
        raw: String,
    },
}

impl MalformedReportLineError {
    /// 1-based index of the line within the report.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::MissingFields { index, .. } | Self::InvalidLineNumber { index, .. } => *index,
        }
    }
}

/// Failure that escapes the parse step entirely.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to read report {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
