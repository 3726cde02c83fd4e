//! Helpers for driving the `dropwatch` binary
//!
//! Short-lived commands (`config`, failing `run`) go through
//! [`DropwatchCommand::execute`]; long-running watchers are spawned and
//! stopped with a signal.

use anyhow::{Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// CLI command builder
pub struct DropwatchCommand {
    binary_path: PathBuf,
    working_dir: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl DropwatchCommand {
    /// Create a new command in the given working directory
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            binary_path: PathBuf::from(env!("CARGO_BIN_EXE_dropwatch")),
            working_dir: working_dir.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Set environment variable
    pub fn env(&mut self, key: &str, value: &str) -> &mut Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary_path);
        command
            .args(&self.args)
            .current_dir(&self.working_dir)
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1")
            .envs(&self.env)
            .stdin(Stdio::null());
        command
    }

    /// Run to completion
    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();
        let output = self.command().output().context("Failed to execute command")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    /// Start a long-running watcher
    pub fn spawn(&self) -> Result<WatcherProcess> {
        let child = self
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn dropwatch")?;

        Ok(WatcherProcess { child: Some(child) })
    }
}

/// A running `dropwatch run`
pub struct WatcherProcess {
    child: Option<Child>,
}

impl WatcherProcess {
    /// Send SIGTERM
    pub fn terminate(&self) -> Result<()> {
        let child = self.child.as_ref().context("process already reaped")?;
        kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM)
            .context("Failed to signal dropwatch")?;
        Ok(())
    }

    /// Wait for exit, failing if it takes longer than `timeout`
    pub fn wait(&mut self, timeout: Duration) -> Result<CommandResult> {
        let start = Instant::now();
        let child = self.child.as_mut().context("process already reaped")?;

        let status: ExitStatus = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if start.elapsed() > timeout {
                anyhow::bail!("dropwatch did not exit within {:?}", timeout);
            }
            thread::sleep(Duration::from_millis(20));
        };

        let mut stdout = String::new();
        let mut stderr = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout)?;
        }
        if let Some(mut err) = child.stderr.take() {
            err.read_to_string(&mut stderr)?;
        }
        self.child = None;

        Ok(CommandResult {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }
}

impl Drop for WatcherProcess {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Command execution result with timing
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Check if stdout contains text
    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    /// Check if stderr contains text
    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }
}

/// Macro for convenient command construction
///
/// Usage:
/// ```ignore
/// dropwatch!(dir, "run", "--path", "/srv/drop").spawn()?;
/// ```
#[macro_export]
macro_rules! dropwatch {
    ($dir:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::DropwatchCommand::new($dir);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
