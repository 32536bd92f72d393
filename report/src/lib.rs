//! Report parsing for the containerized style checker.
//!
//! The checker writes one finding per line:
//!
//! ```text
//! <relativeFilePath>:<lineNumber>:<SEVERITY>:<CODE>[:<freeText>]
//! ```
//!
//! [`ReportParser`] turns that text into [`FileFindings`], dropping files under
//! a `tests/` directory and files matched by the project's [`ExclusionMatcher`].
//!
//! [`FileFindings`]: stylewatch_types::FileFindings

mod error;
mod exclusion;
mod parser;

pub use error::{MalformedReportLineError, ReportError};
pub use exclusion::ExclusionMatcher;
pub use parser::{ParsedLine, ReportParser, is_test_path, normalize_report_path};
