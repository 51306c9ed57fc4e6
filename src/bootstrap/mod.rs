//! Host preparation before detection
//!
//! In OVN interconnect deployments the node-local databases live under
//! `/var/run/ovn-ic`. The CLIs look in `/var/run/ovn`, so the IC run dir
//! is bind-mounted over it before any metric is read.

use crate::errors::{Result, TrackerError};
use crate::tools::process::CommandRunner;
use std::path::{Path, PathBuf};

/// Run directories involved in interconnect detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirs {
    /// Interconnect run dir
    pub ic_rundir: PathBuf,

    /// Run dir the OVN CLIs use
    pub ovn_rundir: PathBuf,
}

impl Default for RunDirs {
    fn default() -> Self {
        Self {
            ic_rundir: PathBuf::from("/var/run/ovn-ic"),
            ovn_rundir: PathBuf::from("/var/run/ovn"),
        }
    }
}

/// Bootstrap status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStatus {
    /// Classic deployment, nothing to do
    Standard,

    /// Interconnect deployment, run dir bound
    Interconnect,
}

impl BootstrapStatus {
    /// Check if running in interconnect mode
    pub fn is_interconnect(&self) -> bool {
        matches!(self, BootstrapStatus::Interconnect)
    }
}

/// Check whether `dir` exists and has at least one entry
pub async fn is_interconnect(dir: &Path) -> bool {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
        Err(_) => false,
    }
}

/// Host bootstrapper
pub struct Bootstrap<'a, R: CommandRunner> {
    runner: &'a R,
    dirs: RunDirs,
}

impl<'a, R: CommandRunner> Bootstrap<'a, R> {
    /// Create bootstrapper
    pub fn new(runner: &'a R, dirs: RunDirs) -> Self {
        Self { runner, dirs }
    }

    /// Detect the deployment mode and bind the run dir if needed
    ///
    /// A failed mount is fatal: every metric read afterwards would hit the
    /// wrong sockets.
    pub async fn prepare(&self) -> Result<BootstrapStatus> {
        if !is_interconnect(&self.dirs.ic_rundir).await {
            return Ok(BootstrapStatus::Standard);
        }

        tracing::info!(
            from = %self.dirs.ic_rundir.display(),
            to = %self.dirs.ovn_rundir.display(),
            "interconnect mode, binding run dir"
        );
        self.bind_rundir().await?;
        Ok(BootstrapStatus::Interconnect)
    }

    async fn bind_rundir(&self) -> Result<()> {
        let from = self.dirs.ic_rundir.to_string_lossy();
        let to = self.dirs.ovn_rundir.to_string_lossy();

        let output = self
            .runner
            .run("mount", &["--bind", &*from, &*to])
            .await
            .map_err(|e| TrackerError::SetupError(format!("failed to update {}: {}", to, e)))?;

        if output.has_stderr() || !output.succeeded() {
            return Err(TrackerError::SetupError(format!(
                "failed to update {}: {}",
                to,
                output.stderr.trim()
            )));
        }

        Ok(())
    }
}
