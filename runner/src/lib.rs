//! Execution of the containerized style checker.
//!
//! [`ToolRunner`] pulls the checker image when the freshness window has
//! elapsed, runs the container against a target directory and returns the path
//! of the report it wrote. External processes go through [`ProcessExecutor`] and
//! the last-pull timestamp through [`FreshnessStore`], so both can be replaced
//! in tests.

mod config;
mod error;
mod freshness;
mod process;
mod runner;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::RunnerConfig;
pub use error::{ImagePullError, ToolExecutionError};
pub use freshness::{FreshnessStore, JsonFreshnessStore, MemoryFreshnessStore};
pub use process::{
    CommandSpec, ProcFut, ProcessExecutor, ProcessExit, ProcessOutput, TokioProcessExecutor,
};
pub use runner::{ImageStatus, ToolRunner};
