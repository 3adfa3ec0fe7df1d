// External command runner

//! External command execution
//!
//! The reload controller never spawns processes itself; it goes through
//! [`CommandExecutor`] so the rmmod/modprobe/lsmod sequence can be driven
//! by a recording fake in tests. [`SystemExecutor`] is the real thing: it
//! spawns the child with tokio, captures both output streams and bounds
//! the wait with a timeout.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the child was killed by a signal
    pub code: Option<i32>,
    /// Standard output, lossily decoded
    pub stdout: String,
    /// Standard error, lossily decoded
    pub stderr: String,
}

impl CommandOutput {
    /// True when the command exited with status 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Best human-readable explanation of a failure
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match self.code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Failures that prevent a command from producing an exit status
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started (missing binary, permissions)
    #[error("failed to spawn '{program}': {source}")]
    SpawnFailed {
        /// Program that was run
        program: String,
        /// Error from the spawn call
        #[source]
        source: std::io::Error,
    },

    /// The program was killed after running past the limit
    #[error("'{program}' did not finish within {}s", .limit.as_secs())]
    TimedOut {
        /// Program that was run
        program: String,
        /// Configured per-command limit
        limit: Duration,
    },
}

/// Runs external programs to completion
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` with `args` and wait for it to exit
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError>;
}

/// Executor backed by real child processes
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    limit: Duration,
}

impl SystemExecutor {
    /// Create an executor whose commands are killed after `limit`
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }
}

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        log::debug!("Running: {} {}", program, args.join(" "));

        // kill_on_drop so a timed out or abandoned reload leaves no orphan
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = timeout(self.limit, child)
            .await
            .map_err(|_| CommandError::TimedOut {
                program: program.to_string(),
                limit: self.limit,
            })?
            .map_err(|source| CommandError::SpawnFailed {
                program: program.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
