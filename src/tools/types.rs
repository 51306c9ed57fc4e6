//! Command execution types
//!
//! Captured output of an external program and the bounds it runs under.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Captured result of running an external program
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Program that was executed
    pub program: String,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,

    /// Exit code, if the process exited normally
    pub exit_code: Option<i32>,

    /// Execution duration in milliseconds
    pub duration_ms: u64,

    /// Whether either stream was cut at the output size limit
    #[serde(default)]
    pub truncated: bool,
}

impl CommandOutput {
    /// Create output for a process that exited normally
    pub fn new(
        program: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        exit_code: i32,
        duration: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
            duration_ms: duration.as_millis() as u64,
            truncated: false,
        }
    }

    /// Mark output as cut at the size limit
    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    /// Whether the program wrote anything to stderr
    ///
    /// The OVN CLIs report most failures (no leader, socket missing) on
    /// stderr while still exiting zero, so stderr is the failure signal.
    pub fn has_stderr(&self) -> bool {
        !self.stderr.trim().is_empty()
    }

    /// Whether the process exited with code zero
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Execution bounds for external commands
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Maximum execution time per command
    pub timeout: Duration,

    /// Maximum captured output size (bytes) per stream
    pub max_output_size: usize,
}

impl Default for CommandContext {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_output_size: 16_777_216, // 16MB, logical_flow listings get large
        }
    }
}

impl CommandContext {
    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set max output size
    pub fn with_max_output_size(mut self, size: usize) -> Self {
        self.max_output_size = size;
        self
    }
}
