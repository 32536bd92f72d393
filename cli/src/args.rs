use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "stylewatch", version, about = "Coding-style checks through a container")]
pub struct Cli {
    /// Config file (default: $STYLEWATCH_CONFIG or ~/.stylewatch/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Log at debug level regardless of RUST_LOG
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze a project once and print its findings
    Check {
        /// Project root
        #[arg(default_value = ".")]
        root: PathBuf,
    },
    /// Read changed file paths from stdin and re-analyze their projects
    Watch {
        /// Workspace roots
        #[arg(default_value = ".")]
        roots: Vec<PathBuf>,
    },
    /// Turn analysis on
    Enable,
    /// Turn analysis off
    Disable,
    /// Show effective configuration and image freshness
    Status,
    /// Forget the last image pull and pull again
    Refresh,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_defaults_to_current_dir() {
        let cli = Cli::try_parse_from(["stylewatch", "check"]).unwrap();
        assert!(matches!(cli.command, Command::Check { root } if root == PathBuf::from(".")));
        assert!(!cli.verbose);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["stylewatch", "watch", "a", "b", "--config", "c.toml", "-v"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
        assert!(cli.verbose);
        match cli.command {
            Command::Watch { roots } => {
                assert_eq!(roots, vec![PathBuf::from("a"), PathBuf::from("b")]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["stylewatch"]).is_err());
    }
}
