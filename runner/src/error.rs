use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::process::ProcessExit;

/// The checker container could not produce a report. Fatal to the current run.
#[derive(Debug, Error)]
pub enum ToolExecutionError {
    #[error("failed to create report directory {path:?}: {source}")]
    ReportDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("container execution failed ({exit}): {stderr}")]
    NonZeroExit { exit: ProcessExit, stderr: String },
    #[error("container run timed out after {}s", .timeout.as_secs())]
    TimedOut { timeout: Duration },
}

impl ToolExecutionError {
    /// Exit code of the container, when it exited on its own.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { exit, .. } => exit.code(),
            _ => None,
        }
    }

    /// Captured stderr of a failed container run.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// The image pull failed. Callers recover by using the locally cached image.
#[derive(Debug, Error)]
pub enum ImagePullError {
    #[error("failed to execute pull: {0}")]
    Spawn(#[source] io::Error),
    #[error("failed to pull image ({exit}): {stderr}")]
    Failed { exit: ProcessExit, stderr: String },
    #[error("image pull timed out after {}s", .timeout.as_secs())]
    TimedOut { timeout: Duration },
}
