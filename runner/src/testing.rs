//! Scripted [`ProcessExecutor`] for tests.
//!
//! Every invocation is recorded. Responses are chosen by [`CommandKind`], so a
//! test only scripts the commands it cares about; everything else succeeds
//! with empty output.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::process::{CommandSpec, ProcFut, ProcessExecutor, ProcessOutput};

type Handler = Arc<dyn Fn(&CommandSpec) -> io::Result<ProcessOutput> + Send + Sync>;

/// Which runtime subcommand an invocation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Pull,
    Prune,
    Run,
    Other,
}

impl CommandKind {
    #[must_use]
    pub fn of(command: &CommandSpec) -> Self {
        match (command.args.first(), command.args.get(1)) {
            (Some(first), _) if first == "pull" => Self::Pull,
            (Some(first), Some(second)) if first == "image" && second == "prune" => Self::Prune,
            (Some(first), _) if first == "run" => Self::Run,
            _ => Self::Other,
        }
    }
}

/// Host side of every `-v host:container` bind mount, in argument order.
#[must_use]
pub fn host_mounts(command: &CommandSpec) -> Vec<PathBuf> {
    command
        .args
        .windows(2)
        .filter(|pair| pair[0] == "-v")
        .filter_map(|pair| pair[1].rsplit_once(':').map(|(host, _)| PathBuf::from(host)))
        .collect()
}

pub struct ScriptedExecutor {
    calls: Mutex<Vec<CommandSpec>>,
    pull: Handler,
    prune: Handler,
    run: Handler,
    run_delay: Option<Duration>,
    run_gate: Option<Arc<Semaphore>>,
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn succeed(_: &CommandSpec) -> io::Result<ProcessOutput> {
    Ok(ProcessOutput::success(""))
}

impl ScriptedExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            pull: Arc::new(succeed),
            prune: Arc::new(succeed),
            run: Arc::new(succeed),
            run_delay: None,
            run_gate: None,
        }
    }

    pub fn with_pull(
        mut self,
        f: impl Fn(&CommandSpec) -> io::Result<ProcessOutput> + Send + Sync + 'static,
    ) -> Self {
        self.pull = Arc::new(f);
        self
    }

    pub fn with_prune(
        mut self,
        f: impl Fn(&CommandSpec) -> io::Result<ProcessOutput> + Send + Sync + 'static,
    ) -> Self {
        self.prune = Arc::new(f);
        self
    }

    pub fn with_run(
        mut self,
        f: impl Fn(&CommandSpec) -> io::Result<ProcessOutput> + Send + Sync + 'static,
    ) -> Self {
        self.run = Arc::new(f);
        self
    }

    /// Container runs write `content` as `file_name` into the mounted report directory.
    pub fn with_report(self, file_name: &str, content: &str) -> Self {
        let file_name = file_name.to_string();
        let content = content.to_string();
        self.with_run(move |command| {
            let report_dir = host_mounts(command)
                .into_iter()
                .nth(1)
                .ok_or_else(|| io::Error::other("run without report mount"))?;
            fs::write(report_dir.join(&file_name), &content)?;
            Ok(ProcessOutput::success(""))
        })
    }

    /// Container runs take `delay` of (tokio) time before completing.
    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = Some(delay);
        self
    }

    /// Container runs wait for a permit on `gate` before completing.
    pub fn with_run_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.run_gate = Some(gate);
        self
    }

    #[must_use]
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn count(&self, kind: CommandKind) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| CommandKind::of(c) == kind)
            .count()
    }

    #[must_use]
    pub fn run_count(&self) -> usize {
        self.count(CommandKind::Run)
    }

    #[must_use]
    pub fn pull_count(&self) -> usize {
        self.count(CommandKind::Pull)
    }
}

impl ProcessExecutor for ScriptedExecutor {
    fn execute<'a>(&'a self, command: &'a CommandSpec) -> ProcFut<'a> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(command.clone());
            let kind = CommandKind::of(command);
            if kind == CommandKind::Run {
                if let Some(delay) = self.run_delay {
                    tokio::time::sleep(delay).await;
                }
                if let Some(gate) = &self.run_gate {
                    gate.acquire()
                        .await
                        .map_err(|_| io::Error::other("run gate closed"))?
                        .forget();
                }
            }
            match kind {
                CommandKind::Pull => (self.pull)(command),
                CommandKind::Prune => (self.prune)(command),
                CommandKind::Run => (self.run)(command),
                CommandKind::Other => succeed(command),
            }
        })
    }
}
