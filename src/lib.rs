// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod registry;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::model::ConfigFile;
use crate::engine::{WatchEvent, WatchOptions, Watcher};
use crate::watch::path_utils::relative_str;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (optional file, `--root` override)
/// - the watcher
/// - printing one line per event on stdout
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_config(&config_path)?;

    let mut options = cfg.watch_options(&config_root_dir(&config_path));
    if let Some(root) = args.root.clone() {
        options.root = root;
    }

    if args.dry_run {
        print_dry_run(&cfg, &options);
        return Ok(());
    }

    let (watcher, mut events) = Watcher::start(options)
        .await
        .context("starting watcher")?;
    let root = watcher.root().to_path_buf();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if let Some(line) = format_event(&root, &event) {
                        println!("{line}");
                    }
                }
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                }
                info!("shutdown requested");
                break;
            }
        }
    }

    watcher.shutdown().await?;
    Ok(())
}

/// Load the config file, falling back to defaults when the default path
/// does not exist. An explicitly given path must exist.
fn load_config(config_path: &Path) -> Result<ConfigFile> {
    if !config_path.exists() && config_path == default_config_path() {
        debug!(?config_path, "no config file; using defaults");
        return Ok(ConfigFile::default());
    }
    load_and_validate(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))
}

/// Figure out the directory relative roots are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "site/etagwatch.toml"),
///   we use that directory.
/// - If it's just a bare filename like "etagwatch.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Render an event as a single stdout line. `Initialized` is only logged.
pub fn format_event(root: &Path, event: &WatchEvent) -> Option<String> {
    let rel = |path: &Path| {
        relative_str(root, path).unwrap_or_else(|| path.display().to_string())
    };

    match event {
        WatchEvent::Initialized => {
            info!(root = ?root, "watching");
            None
        }
        WatchEvent::Changed { path, etag } => Some(format!("changed {} {etag}", rel(path))),
        WatchEvent::Added { path } => Some(format!("added {}", rel(path))),
        WatchEvent::Deleted { path } => Some(format!("deleted {}", rel(path))),
        WatchEvent::Error { path, message } => Some(format!("error {} {message}", rel(path))),
    }
}

/// Simple dry-run output: print the effective configuration.
fn print_dry_run(cfg: &ConfigFile, options: &WatchOptions) {
    println!("etagwatch dry-run");
    println!("  watch.root = {}", options.root.display());
    println!("  watch.backend = {:?}", options.backend);
    println!("  watch.poll_interval_ms = {}", cfg.watch.poll_interval_ms);
    if !options.exclude.is_empty() {
        println!("  watch.exclude = {:?}", options.exclude);
    }
    println!();

    println!("dependencies ({}):", cfg.dependencies.len());
    for (path, deps) in cfg.dependencies.iter() {
        println!("  - {path}");
        println!("      on: {:?}", deps);
    }

    debug!("dry-run complete (nothing watched)");
}
