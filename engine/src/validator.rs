//! Trigger eligibility: which paths may start an analysis, and of which root.

use std::path::{Path, PathBuf, absolute};

use ignore::WalkBuilder;
use thiserror::Error;

/// Extensions the checker understands. A root without any is not worth a run.
const SOURCE_EXTENSIONS: &[&str] = &["c", "h", "cpp", "hpp"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTargetError {
    #[error("{} has banned extension .{extension}", .path.display())]
    BannedExtension { path: PathBuf, extension: String },
    #[error("{} is outside every workspace root", .path.display())]
    OutsideWorkspace { path: PathBuf },
    #[error("no C or C++ sources under {}", .root.display())]
    NoSources { root: PathBuf },
}

/// Maps a trigger path to the target root it belongs to.
pub trait TargetValidator: Send + Sync {
    fn resolve(&self, trigger: &Path) -> Result<PathBuf, InvalidTargetError>;
}

/// Accepts paths inside one of a fixed set of workspace roots.
#[derive(Debug, Clone)]
pub struct WorkspaceValidator {
    roots: Vec<PathBuf>,
    banned_extensions: Vec<String>,
    require_sources: bool,
}

fn normalize(path: &Path) -> PathBuf {
    absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

impl WorkspaceValidator {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            roots: roots.into_iter().map(|r| normalize(r.as_ref())).collect(),
            banned_extensions: Vec::new(),
            require_sources: false,
        }
    }

    pub fn with_banned_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.banned_extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn with_require_sources(mut self, require: bool) -> Self {
        self.require_sources = require;
        self
    }

    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn banned_extension(&self, path: &Path) -> Option<String> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        self.banned_extensions
            .contains(&extension)
            .then_some(extension)
    }

    /// Innermost root containing `path`.
    fn root_of(&self, path: &Path) -> Option<&PathBuf> {
        self.roots
            .iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
    }
}

/// Whether `root` contains at least one C or C++ source file.
#[must_use]
pub fn has_sources(root: &Path) -> bool {
    WalkBuilder::new(root)
        .hidden(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build()
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .any(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
        })
}

impl TargetValidator for WorkspaceValidator {
    fn resolve(&self, trigger: &Path) -> Result<PathBuf, InvalidTargetError> {
        if let Some(extension) = self.banned_extension(trigger) {
            return Err(InvalidTargetError::BannedExtension {
                path: trigger.to_path_buf(),
                extension,
            });
        }

        let path = normalize(trigger);
        let root = self
            .root_of(&path)
            .ok_or_else(|| InvalidTargetError::OutsideWorkspace { path: path.clone() })?;

        if self.require_sources && !has_sources(root) {
            return Err(InvalidTargetError::NoSources { root: root.clone() });
        }
        Ok(root.clone())
    }
}
