//! stylewatch CLI - runs the coding-style checker container and reports findings.
//!
//! ```text
//! main() -> StylewatchConfig::load -> AnalysisCoordinator
//!              |                            |
//!              |                 check: one trigger, print findings
//!              |                 watch: trigger per stdin path
//!              v
//!        enable / disable / status / refresh
//! ```

mod args;
mod output;

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::slice;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use stylewatch_config::{StylewatchConfig, app_dir, config_path, state_path};
use stylewatch_engine::{
    AnalysisCoordinator, DiagnosticsStore, RunOutcome, SkipReason, WorkspaceValidator,
};
use stylewatch_runner::{ImageStatus, JsonFreshnessStore, TokioProcessExecutor, ToolRunner};

use crate::args::{Cli, Command};
use crate::output::{StderrNotifier, exit_code, finding_lines, format_time};

fn init_tracing(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(dir) = app_dir() {
        candidates.push(dir.join("logs").join("stylewatch.log"));
    }
    candidates.push(PathBuf::from(".stylewatch").join("logs").join("stylewatch.log"));
    candidates
}

fn build_runner(config: &StylewatchConfig) -> Result<ToolRunner> {
    let state = state_path().context("locating the image freshness record")?;
    Ok(ToolRunner::new(
        config.runner.clone(),
        Arc::new(TokioProcessExecutor),
        Arc::new(JsonFreshnessStore::new(state)),
    ))
}

fn build_coordinator(
    config: &StylewatchConfig,
    roots: &[PathBuf],
    store: Arc<DiagnosticsStore>,
) -> Result<AnalysisCoordinator> {
    let validator = WorkspaceValidator::new(roots)
        .with_banned_extensions(&config.analysis.banned_extensions)
        .with_require_sources(config.analysis.require_sources);
    Ok(
        AnalysisCoordinator::builder(build_runner(config)?, store, Arc::new(validator))
            .config(&config.analysis)
            .notifier(Arc::new(StderrNotifier))
            .ignore_file(config.report.ignore_file.as_str())
            .build(),
    )
}

fn canonical_root(root: &Path) -> Result<PathBuf> {
    fs::canonicalize(root).with_context(|| format!("resolving {}", root.display()))
}

async fn check(config: &StylewatchConfig, root: &Path) -> Result<u8> {
    let root = canonical_root(root)?;
    let store = Arc::new(DiagnosticsStore::new());
    let coordinator = build_coordinator(config, slice::from_ref(&root), Arc::clone(&store))?;

    let outcome = coordinator.trigger(&root).await;
    for line in finding_lines(&store.snapshot(), &root) {
        println!("{line}");
    }
    match &outcome {
        RunOutcome::Skipped(SkipReason::InvalidTarget(e)) => eprintln!("error: {e}"),
        other => println!("{}", other.status_line()),
    }
    coordinator.shutdown();
    Ok(exit_code(&outcome))
}

async fn watch(config: &StylewatchConfig, roots: &[PathBuf]) -> Result<u8> {
    let roots = roots
        .iter()
        .map(|r| canonical_root(r))
        .collect::<Result<Vec<_>>>()?;
    let coordinator = build_coordinator(config, &roots, Arc::new(DiagnosticsStore::new()))?;
    let cwd = env::current_dir().context("reading current directory")?;

    eprintln!("Watching {} root(s); reading changed paths from stdin", roots.len());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut runs = JoinSet::new();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        };
        let Some(line) = line else { break };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let path = cwd.join(trimmed);
        let coordinator = coordinator.clone();
        runs.spawn(async move {
            let outcome = coordinator.trigger(&path).await;
            if let RunOutcome::Skipped(SkipReason::InvalidTarget(e)) = &outcome {
                tracing::debug!("{e}");
            } else {
                println!("{}: {}", path.display(), outcome.status_line());
            }
        });

        while runs.try_join_next().is_some() {}
    }

    while runs.join_next().await.is_some() {}
    coordinator.shutdown();
    Ok(0)
}

fn status(config_file: &Path, config: &StylewatchConfig) -> Result<u8> {
    let runner = build_runner(config)?;
    println!("config:         {}", config_file.display());
    println!("enabled:        {}", config.analysis.enabled);
    println!("debounce:       {}ms", config.analysis.debounce_delay_ms);
    println!("runtime:        {}", config.runner.runtime);
    println!("image:          {}", config.runner.image);
    println!(
        "freshness:      {}h",
        config.runner.cache_duration().as_secs() / 3600
    );
    println!("last pull:      {}", format_time(runner.last_pull()));
    println!("ignore file:    {}", config.report.ignore_file);
    Ok(0)
}

async fn refresh(config: &StylewatchConfig) -> Result<u8> {
    let runner = build_runner(config)?;
    runner
        .invalidate_image_cache()
        .context("clearing the image freshness record")?;

    let settings = runner.config();
    let pulled = runner
        .ensure_image(
            &settings.cache_key,
            SystemTime::now(),
            settings.cache_duration(),
        )
        .await;
    match pulled {
        Ok(ImageStatus::Pulled) => {
            println!("Pulled {}", settings.image);
            Ok(0)
        }
        Ok(ImageStatus::Cached) => {
            println!("{} is up to date", settings.image);
            Ok(0)
        }
        Err(e) => {
            eprintln!("error: {e}");
            Ok(2)
        }
    }
}

fn set_enabled(config_file: &Path, enabled: bool) -> Result<u8> {
    StylewatchConfig::set_enabled(config_file, enabled)?;
    println!(
        "Coding style analysis {}",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(0)
}

async fn run(cli: Cli) -> Result<u8> {
    let config_file = config_path(cli.config.as_deref())?;
    let config = StylewatchConfig::load(&config_file);
    tracing::debug!(path = %config_file.display(), "Loaded configuration");

    match cli.command {
        Command::Check { root } => check(&config, &root).await,
        Command::Watch { roots } => watch(&config, &roots).await,
        Command::Enable => set_enabled(&config_file, true),
        Command::Disable => set_enabled(&config_file, false),
        Command::Status => status(&config_file, &config),
        Command::Refresh => refresh(&config).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("Error: {err:?}");
            ExitCode::from(2)
        }
    }
}
