use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{Error, Result};

/// Default bound on a single remote command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(45);

/// Typed result of one remote command: exit code plus captured output.
/// Callers branch on the exit code, never on output text alone.
#[derive(Debug, Clone)]
pub struct RemoteOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RemoteOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Executes commands and places files on a remote host.
///
/// Every implementation must bound each call with a timeout so a hung host
/// resolves to a local failure instead of blocking sibling operations.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, address: &str, command: &str) -> Result<RemoteOutcome>;
    async fn upload(&self, address: &str, remote_path: &str, contents: &str) -> Result<()>;
}

/// `CommandRunner` backed by the system `ssh` client.
#[derive(Debug, Clone)]
pub struct SshRunner {
    pub program: PathBuf,
    pub key_path: PathBuf,
    pub username: String,
    pub command_timeout: Duration,
}

impl SshRunner {
    pub fn new(key_path: impl Into<PathBuf>, username: impl Into<String>) -> Self {
        SshRunner { program: PathBuf::from("ssh"), key_path: key_path.into(), username: username.into(), command_timeout: DEFAULT_COMMAND_TIMEOUT }
    }

    /// Overrides the client binary, e.g. a wrapper script or a non-PATH ssh.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn base_command(&self, address: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg("-o")
            .arg("ConnectTimeout=10")
            .arg("-i")
            .arg(&self.key_path)
            .arg(format!("{}@{}", self.username, address));
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        // A timed-out call drops the output future; the child goes with it
        // instead of lingering as an orphaned ssh process.
        cmd.kill_on_drop(true);
        cmd
    }

    fn timeout_error(&self, address: &str) -> Error {
        Error::RemoteTimeout { target: address.to_string(), seconds: self.command_timeout.as_secs() }
    }
}

#[async_trait]
impl CommandRunner for SshRunner {
    async fn run(&self, address: &str, command: &str) -> Result<RemoteOutcome> {
        let mut cmd = self.base_command(address);
        cmd.arg(command);

        let output = timeout(self.command_timeout, cmd.output()).await.map_err(|_| self.timeout_error(address))??;

        let outcome = RemoteOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        log::debug!("Remote command on {} exited with {}", address, outcome.exit_code);
        Ok(outcome)
    }

    async fn upload(&self, address: &str, remote_path: &str, contents: &str) -> Result<()> {
        let mut cmd = self.base_command(address);
        cmd.arg(format!("mkdir -p $(dirname {remote_path}) && cat > {remote_path}"));
        cmd.stdin(Stdio::piped());

        let mut child = cmd.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(contents.as_bytes()).await?;
        }

        let output = timeout(self.command_timeout, child.wait_with_output()).await.map_err(|_| self.timeout_error(address))??;
        if !output.status.success() {
            return Err(Error::RemoteExecError {
                target: address.to_string(),
                message: format!("upload to {} failed: {}", remote_path, String::from_utf8_lossy(&output.stderr)),
            });
        }
        Ok(())
    }
}
