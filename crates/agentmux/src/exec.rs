//! Subprocess execution.
//!
//! The orchestration core only depends on the `CommandExecutor` trait;
//! `ProcessExecutor` is the real implementation on top of
//! `tokio::process`. Tests substitute scripted executors.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::{Error, Result};

/// One fully-resolved invocation of an agent binary.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    pub env: HashMap<String, String>,
    /// Payload written to the child's stdin (providers that take the
    /// prompt on stdin rather than argv).
    pub stdin_data: Option<String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self {
            argv,
            env: HashMap::new(),
            stdin_data: None,
            timeout,
        }
    }

    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn stdin_data(mut self, data: impl Into<String>) -> Self {
        self.stdin_data = Some(data.into());
        self
    }
}

/// What came back from the child process.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run the command to completion. Throws `Error::Timeout` when the
    /// deadline fires (the child is killed) and
    /// `Error::CommandExecution` when the process cannot be spawned.
    async fn execute(&self, spec: CommandSpec) -> Result<ExecOutput>;

    /// Resolve a binary on `PATH`.
    fn which(&self, binary: &str) -> Option<PathBuf>;
}

/// Executor backed by real child processes.
#[derive(Debug, Default, Clone)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, spec: CommandSpec) -> Result<ExecOutput> {
        let program = spec
            .argv
            .first()
            .ok_or_else(|| Error::CommandExecution("empty argv".into()))?;

        debug!(program = %program, args = ?&spec.argv[1..], "spawning agent binary");

        let mut command = Command::new(program);
        command
            .args(&spec.argv[1..])
            .envs(&spec.env)
            .stdin(if spec.stdin_data.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout must not leak the child.
            .kill_on_drop(true);

        let started = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|e| Error::CommandExecution(format!("failed to spawn `{program}`: {e}")))?;

        if let Some(data) = &spec.stdin_data {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| Error::CommandExecution("child stdin unavailable".into()))?;
            stdin
                .write_all(data.as_bytes())
                .await
                .map_err(|e| Error::CommandExecution(format!("stdin write failed: {e}")))?;
            // Closing stdin signals EOF to agents that read the prompt
            // until end of input.
            drop(stdin);
        }

        let output = match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(result) => {
                result.map_err(|e| Error::CommandExecution(format!("wait failed: {e}")))?
            }
            Err(_) => {
                warn!(program = %program, timeout = ?spec.timeout, "agent binary timed out");
                return Err(Error::Timeout {
                    timeout: spec.timeout,
                });
            }
        };

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: started.elapsed(),
        })
    }

    fn which(&self, binary: &str) -> Option<PathBuf> {
        let path = std::env::var_os("PATH")?;
        for dir in std::env::split_paths(&path) {
            let candidate = dir.join(binary);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }
}
