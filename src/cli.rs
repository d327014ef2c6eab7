// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `etagwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "etagwatch",
    version,
    about = "Watch a directory tree and print size/mtime etags as files change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// A missing file is fine when it is the default; built-in defaults are
    /// used instead.
    #[arg(long, value_name = "PATH", default_value = "etagwatch.toml")]
    pub config: String,

    /// Directory to watch. Overrides `[watch].root` from the config.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ETAGWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the effective configuration, but don't watch.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["etagwatch"]).unwrap();
        assert_eq!(args.config, "etagwatch.toml");
        assert!(args.root.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn root_and_level() {
        let args =
            CliArgs::try_parse_from(["etagwatch", "--root", "public", "--log-level", "debug"])
                .unwrap();
        assert_eq!(args.root, Some(PathBuf::from("public")));
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }
}
