//! Supervisor configuration: `clap` flags with env-var fallback plus a
//! `directories`-located config file, covering the handful of settings
//! the daemon actually needs.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use directories::ProjectDirs;

/// `ridgeline-daemon` CLI flags. Every flag has an env var fallback so the
/// same binary can be launched either interactively or by an init system
/// with only environment configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "ridgeline-daemon", version, about = "On-device component orchestrator supervisor")]
pub struct Args {
    /// Root directory for the component store, persisted state and
    /// per-deployment scratch directories.
    #[arg(long, env = "RIDGELINE_ROOT")]
    pub root: Option<PathBuf>,

    /// Directory polled for incoming deployment documents and local
    /// deployment requests from either producer.
    #[arg(long, env = "RIDGELINE_INCOMING_DIR")]
    pub incoming_dir: Option<PathBuf>,

    /// Log output format.
    #[arg(long, env = "RIDGELINE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Logging verbosity, repeatable (`-v`, `-vv`, `-vvv`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Poll interval, in milliseconds, for the incoming-deployment
    /// directories.
    #[arg(long, env = "RIDGELINE_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// The settings the rest of the daemon actually consumes, after resolving
/// CLI/env flags against the platform default directory. Resolution
/// happens once, here, rather than being re-derived by every subsystem.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub root: PathBuf,
    pub incoming_dir: PathBuf,
    pub log_format: LogFormat,
    pub verbosity: u8,
    pub poll_interval: std::time::Duration,
}

impl SupervisorConfig {
    #[must_use]
    pub fn resolve(args: Args) -> Self {
        let root = args.root.unwrap_or_else(default_root);
        let incoming_dir = args.incoming_dir.unwrap_or_else(|| root.join("deployments-incoming"));
        Self {
            incoming_dir,
            root,
            log_format: args.log_format,
            verbosity: args.verbose,
            poll_interval: std::time::Duration::from_millis(args.poll_interval_ms),
        }
    }
}

/// `directories::ProjectDirs`' platform-conventional data directory.
fn default_root() -> PathBuf {
    ProjectDirs::from("dev", "ridgeline", "ridgeline")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/var/lib/ridgeline"))
}
