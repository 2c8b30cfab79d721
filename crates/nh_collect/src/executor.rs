//! Command transport for switch CLIs
//!
//! [`SshExecutor`] runs one IOS exec command per `ssh` invocation. The
//! [`CommandTransport`] trait is the seam tests replace with canned output.

use crate::CommandError;
use async_trait::async_trait;
use nh_config::{ConfigError, NhConfig};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Runs a single command against a host and returns its stdout
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn run(&self, host: &str, command: &str) -> Result<String, CommandError>;
}

#[async_trait]
impl<T: CommandTransport + ?Sized> CommandTransport for std::sync::Arc<T> {
    async fn run(&self, host: &str, command: &str) -> Result<String, CommandError> {
        (**self).run(host, command).await
    }
}

/// Output from one command execution
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Check if the command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// SSH transport using the system `ssh` client in batch mode
#[derive(Debug, Clone)]
pub struct SshExecutor {
    program: String,
    user: String,
    key_path: Option<PathBuf>,
    port: u16,
    timeout: Duration,
}

impl SshExecutor {
    #[must_use]
    pub fn new(user: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: "ssh".to_string(),
            user: user.into(),
            key_path: None,
            port: 22,
            timeout,
        }
    }

    /// Build from the `[ssh]` section
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when no SSH user is configured.
    pub fn from_config(config: &NhConfig) -> Result<Self, ConfigError> {
        let user = config
            .ssh
            .user
            .clone()
            .ok_or_else(|| ConfigError::MissingField("ssh.user".to_string()))?;
        let mut executor = Self::new(user, config.command_timeout()).with_port(config.ssh.port);
        if let Some(key) = &config.ssh.key_path {
            executor = executor.with_key(key.clone());
        }
        Ok(executor)
    }

    /// Set the SSH key path
    #[must_use]
    pub fn with_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Set the SSH port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Replace the client binary (used by tests with a local stand-in)
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn build_command(&self, host: &str, command: &str) -> Command {
        let mut ssh_cmd = Command::new(&self.program);

        if let Some(key) = &self.key_path {
            ssh_cmd.arg("-i").arg(key);
        }

        if self.port != 22 {
            ssh_cmd.arg("-p").arg(self.port.to_string());
        }

        ssh_cmd
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.timeout.as_secs().max(5)));

        ssh_cmd
            .arg(format!("{}@{}", self.user, host))
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        ssh_cmd
    }

    /// Run a command and return the raw output regardless of exit code
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the client cannot be spawned or the
    /// command exceeds the timeout.
    #[instrument(skip(self))]
    pub async fn execute(&self, host: &str, command: &str) -> Result<CommandOutput, CommandError> {
        debug!(host, command, "Running remote command");

        let child = self
            .build_command(host, command)
            .spawn()
            .map_err(|e| CommandError::Transport {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                exit_code: output.status.code().unwrap_or(-1),
            }),
            Ok(Err(e)) => Err(CommandError::Io(e)),
            Err(_) => Err(CommandError::Timeout {
                host: host.to_string(),
                command: command.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

#[async_trait]
impl CommandTransport for SshExecutor {
    async fn run(&self, host: &str, command: &str) -> Result<String, CommandError> {
        let output = self.execute(host, command).await?;
        if !output.success() {
            // ssh itself exits 255 on connection and auth failures
            if output.exit_code == 255 {
                return Err(CommandError::Transport {
                    host: host.to_string(),
                    reason: output.stderr.trim().to_string(),
                });
            }
            return Err(CommandError::Failed {
                host: host.to_string(),
                command: command.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output.stdout)
    }
}
