//! External process execution.

use std::fmt;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Process execution future type alias.
pub type ProcFut<'a> = Pin<Box<dyn Future<Output = io::Result<ProcessOutput>> + Send + 'a>>;

/// A program invocation. Arguments are passed as-is, never through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Kill the process if it has not exited after this long.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// First argument, i.e. the runtime subcommand (`pull`, `run`, ...).
    #[must_use]
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit(Option<i32>);

impl ProcessExit {
    #[must_use]
    pub fn from_code(code: Option<i32>) -> Self {
        Self(code)
    }

    #[must_use]
    pub fn success() -> Self {
        Self(Some(0))
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        self.0 == Some(0)
    }

    /// Exit code, `None` when terminated by a signal.
    #[must_use]
    pub fn code(self) -> Option<i32> {
        self.0
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit: ProcessExit,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit: ProcessExit::success(),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    #[must_use]
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit: ProcessExit::from_code(Some(code)),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit.is_success()
    }
}

/// Runs external programs to completion.
///
/// Errors are reserved for processes that could not be started or that hit
/// their timeout (`io::ErrorKind::TimedOut`); a non-zero exit is a normal
/// [`ProcessOutput`].
pub trait ProcessExecutor: Send + Sync {
    fn execute<'a>(&'a self, command: &'a CommandSpec) -> ProcFut<'a>;
}

/// [`ProcessExecutor`] backed by `tokio::process`.
///
/// stdout and stderr are streamed line by line to the debug log while the
/// process runs. The child is killed if the future is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessExecutor;

impl ProcessExecutor for TokioProcessExecutor {
    fn execute<'a>(&'a self, command: &'a CommandSpec) -> ProcFut<'a> {
        Box::pin(run_command(command))
    }
}

async fn run_command(command: &CommandSpec) -> io::Result<ProcessOutput> {
    let program =
        which::which(&command.program).unwrap_or_else(|_| PathBuf::from(&command.program));
    tracing::debug!(command = %command, "Spawning process");

    let mut child = Command::new(&program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("no stdout from child"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("no stderr from child"))?;

    let stdout_task = tokio::spawn(capture_lines(stdout, command.program.clone(), "stdout"));
    let stderr_task = tokio::spawn(capture_lines(stderr, command.program.clone(), "stderr"));

    let status = match command.timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                tracing::warn!(command = %command, "Process timed out, killing");
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{} timed out after {}s", command.program, limit.as_secs()),
                ));
            }
        },
        None => child.wait().await?,
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();
    let exit = ProcessExit::from_code(status.code());
    tracing::debug!(command = %command, %exit, "Process finished");

    Ok(ProcessOutput {
        exit,
        stdout,
        stderr,
    })
}

async fn capture_lines<R>(reader: R, program: String, stream: &'static str) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut captured = String::new();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                tracing::debug!(program = %program, stream, "{line}");
                captured.push_str(&line);
                captured.push('\n');
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(program = %program, stream, "Output read error: {e}");
                break;
            }
        }
    }
    captured
}
