//! External process execution
//!
//! Runs control-plane CLIs (`ovn-sbctl`, `ovn-nbctl`, `ovs-ofctl`, `mount`)
//! as argv arrays, never through a shell, with a timeout per call.

use crate::errors::{Result, TrackerError};
use crate::tools::types::{CommandContext, CommandOutput};
use async_trait::async_trait;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::timeout;

/// Something that can run an external program and capture its output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and capture stdout/stderr
    ///
    /// Returns an error only when the program could not be run to
    /// completion (spawn failure, timeout). A non-zero exit, stderr
    /// output or truncated output is still `Ok`; callers decide what that
    /// means.
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Runs programs on the local host
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    context: CommandContext,
}

impl SystemRunner {
    /// Create runner with the given execution bounds
    pub fn new(context: CommandContext) -> Self {
        Self { context }
    }

    /// Get execution bounds
    pub fn context(&self) -> &CommandContext {
        &self.context
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        if program.is_empty() {
            return Err(TrackerError::CommandFailed {
                program: String::new(),
                reason: "command cannot be empty".to_string(),
            });
        }

        let start = Instant::now();
        let mut cmd = Command::new(program);
        cmd.args(args).kill_on_drop(true);

        match timeout(self.context.timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                let (stdout, stdout_cut) = truncate(
                    String::from_utf8_lossy(&output.stdout).into_owned(),
                    self.context.max_output_size,
                );
                let (stderr, stderr_cut) = truncate(
                    String::from_utf8_lossy(&output.stderr).into_owned(),
                    self.context.max_output_size,
                );
                let exit_code = output.status.code().unwrap_or(-1);

                if stdout_cut || stderr_cut {
                    tracing::warn!(
                        program,
                        limit = self.context.max_output_size,
                        "command output truncated"
                    );
                }
                tracing::trace!(program, exit_code, "command finished");

                Ok(CommandOutput::new(
                    program,
                    stdout,
                    stderr,
                    exit_code,
                    start.elapsed(),
                )
                .with_truncated(stdout_cut || stderr_cut))
            }
            Ok(Err(e)) => Err(TrackerError::CommandFailed {
                program: program.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(TrackerError::Timeout {
                duration_ms: self.context.timeout.as_millis() as u64,
            }),
        }
    }
}

/// Cut `text` to at most `max` bytes, reporting whether anything was lost
fn truncate(mut text: String, max: usize) -> (String, bool) {
    if text.len() <= max {
        return (text, false);
    }

    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    (text, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_program_rejected() {
        let runner = SystemRunner::default();
        let result = runner.run("", &[]).await;
        assert!(matches!(result, Err(TrackerError::CommandFailed { .. })));
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let runner = SystemRunner::default();
        let result = runner
            .run("definitely-not-a-real-binary-7f3a", &["--version"])
            .await;
        assert!(matches!(result, Err(TrackerError::CommandFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout() {
        let runner = SystemRunner::default();
        let output = runner.run("echo", &["flow_count=7"]).await.unwrap();
        assert!(output.succeeded());
        assert_eq!(output.stdout.trim(), "flow_count=7");
        assert!(!output.has_stderr());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_enforced() {
        let runner = SystemRunner::new(
            CommandContext::default().with_timeout(Duration::from_millis(100)),
        );
        let result = runner.run("sleep", &["5"]).await;
        assert!(matches!(result, Err(TrackerError::Timeout { duration_ms: 100 })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_oversized_output_is_flagged() {
        let runner = SystemRunner::new(CommandContext::default().with_max_output_size(1000));
        let output = runner
            .run(
                "sh",
                &["-c", "i=0; while [ $i -lt 1000 ]; do echo \"_uuid : $i\"; i=$((i+1)); done"],
            )
            .await
            .unwrap();

        assert!(output.truncated);
        assert!(output.stdout.len() <= 1000);
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "ab\u{00e9}cd".to_string();
        assert_eq!(truncate(text.clone(), 3), ("ab".to_string(), true));
        assert_eq!(truncate(text, 100), ("ab\u{00e9}cd".to_string(), false));
    }
}
