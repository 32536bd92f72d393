//! Gitignore-flavored path exclusion.
//!
//! The matching rules are deliberately simpler than real gitignore globbing:
//!
//! - `dir/` matches `dir` and anything below it.
//! - Any other pattern must match the whole path.
//! - `*` matches any run of characters, `/` included.
//!
//! Existing ignore files are written against these rules, so they are kept as-is.

use std::fs;
use std::io;
use std::path::Path;

use regex::Regex;

/// Compiled set of exclusion patterns, evaluated as a logical OR.
#[derive(Debug, Clone, Default)]
pub struct ExclusionMatcher {
    patterns: Vec<CompiledPattern>,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    source: String,
    regex: Regex,
}

impl ExclusionMatcher {
    /// A matcher that excludes nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile patterns from ignore-file lines. Blank lines and `#` comments are dropped.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = Vec::new();
        for line in lines {
            let line = line.as_ref().trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match Regex::new(&pattern_to_regex(line)) {
                Ok(regex) => patterns.push(CompiledPattern {
                    source: line.to_string(),
                    regex,
                }),
                Err(e) => tracing::warn!(pattern = line, "Skipping exclusion pattern: {e}"),
            }
        }
        Self { patterns }
    }

    /// Load patterns from `root/file_name`. A missing file yields an empty matcher.
    #[must_use]
    pub fn load(root: &Path, file_name: &str) -> Self {
        let path = root.join(file_name);
        match fs::read_to_string(&path) {
            Ok(content) => {
                let matcher = Self::from_lines(content.lines());
                tracing::debug!(
                    path = %path.display(),
                    count = matcher.len(),
                    "Loaded exclusion patterns"
                );
                matcher
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::empty(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to read ignore file: {e}");
                Self::empty()
            }
        }
    }

    /// Whether a workspace-relative, forward-slash path is excluded.
    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.regex.is_match(path))
    }

    /// The pattern that excludes `path`, if any.
    #[must_use]
    pub fn matching_pattern(&self, path: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(path))
            .map(|p| p.source.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn pattern_to_regex(pattern: &str) -> String {
    let (body, directory) = match pattern.strip_suffix('/') {
        Some(body) => (body, true),
        None => (pattern, false),
    };
    let body = regex::escape(body).replace(r"\*", ".*");
    if directory {
        format!("^{body}(?:/.*)?$")
    } else {
        format!("^{body}$")
    }
}
