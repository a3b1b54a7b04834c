//! Resolves the daemon's root/incoming directories the same way
//! `ridgeline-daemon`'s own `SupervisorConfig` does, so the two binaries
//! agree on where the filesystem-framed control channel lives without
//! sharing a crate (the real transport between them lives outside this
//! workspace, so its two halves meet on disk instead).

use std::path::PathBuf;

use directories::ProjectDirs;

/// Global flags every `ridgeline-ctl` subcommand accepts.
#[derive(Debug, Clone, clap::Args)]
pub struct GlobalArgs {
    /// Root directory the daemon was started with (`RIDGELINE_ROOT`).
    #[arg(long, global = true, env = "RIDGELINE_ROOT")]
    pub root: Option<PathBuf>,

    /// Incoming-request directory the daemon polls
    /// (`RIDGELINE_INCOMING_DIR`).
    #[arg(long, global = true, env = "RIDGELINE_INCOMING_DIR")]
    pub incoming_dir: Option<PathBuf>,

    /// How long to wait for the daemon to answer a request before giving
    /// up, in seconds.
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout_seconds: u64,

    /// Emit machine-readable JSON instead of a formatted table.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress informational output.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl GlobalArgs {
    #[must_use]
    pub fn resolved_root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(default_root)
    }

    #[must_use]
    pub fn resolved_incoming_dir(&self) -> PathBuf {
        self.incoming_dir
            .clone()
            .unwrap_or_else(|| self.resolved_root().join("deployments-incoming"))
    }

    #[must_use]
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds)
    }
}

fn default_root() -> PathBuf {
    ProjectDirs::from("dev", "ridgeline", "ridgeline")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/var/lib/ridgeline"))
}
