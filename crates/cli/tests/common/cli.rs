//! CLI command execution helpers with automatic timing
//!
//! `FwatchCommand` runs the `fwatch` binary to completion (for invocations
//! that exit on their own). `WatchSession` keeps a watching process alive and
//! streams its output lines back to the test.

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Path of the binary under test
fn fwatch_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fwatch"))
}

/// CLI command builder with timing
pub struct FwatchCommand {
    working_dir: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl FwatchCommand {
    /// Create a new command in the given working directory
    ///
    /// The config lookup is pointed at the working directory so a user's own
    /// config never leaks into a test.
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        let working_dir = working_dir.as_ref().to_path_buf();
        let mut env = HashMap::new();
        let home = working_dir.to_string_lossy().to_string();
        env.insert("HOME".to_string(), home.clone());
        env.insert("XDG_CONFIG_HOME".to_string(), home);

        Self {
            working_dir,
            args: Vec::new(),
            env,
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(fwatch_binary());
        command
            .args(&self.args)
            .current_dir(&self.working_dir)
            .envs(&self.env);
        command
    }

    /// Execute command and return result with timing
    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();
        let output = self
            .command()
            .output()
            .context("Failed to execute command")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }

        Ok(result)
    }

    /// Execute and expect failure
    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }

        Ok(result)
    }

    /// Start a long-running watch
    pub fn spawn(&self) -> Result<WatchSession> {
        let mut child = self
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn command")?;

        let stdout = child.stdout.take().context("stdout not captured")?;
        let stderr = child.stderr.take().context("stderr not captured")?;

        Ok(WatchSession {
            child,
            stdout: forward_lines(stdout),
            stderr: forward_lines(stderr),
        })
    }
}

/// Pump a pipe into a channel, one line per message
fn forward_lines(pipe: impl Read + Send + 'static) -> Receiver<String> {
    let (tx, rx) = unbounded();
    std::thread::spawn(move || {
        for line in BufReader::new(pipe).lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// A running `fwatch` process; killed on drop
pub struct WatchSession {
    child: Child,
    stdout: Receiver<String>,
    stderr: Receiver<String>,
}

impl WatchSession {
    /// Wait until a stderr line contains `text`
    pub fn wait_for_stderr(&self, text: &str, timeout: Duration) -> Result<String> {
        wait_for(&self.stderr, text, timeout)
    }

    /// Wait until a stdout line contains `text`
    pub fn wait_for_stdout(&self, text: &str, timeout: Duration) -> Result<String> {
        wait_for(&self.stdout, text, timeout)
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn wait_for(lines: &Receiver<String>, text: &str, timeout: Duration) -> Result<String> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match lines.recv_timeout(remaining) {
            Ok(line) if line.contains(text) => return Ok(line),
            Ok(_) => continue,
            Err(RecvTimeoutError::Timeout) => {
                anyhow::bail!("No line containing {:?} within {:?}", text, timeout)
            }
            Err(RecvTimeoutError::Disconnected) => {
                anyhow::bail!("Process output closed before {:?} appeared", text)
            }
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
/// fwatch!(dir, "--events", "size", "a.txt").spawn()?;
/// ```
#[macro_export]
macro_rules! fwatch {
    ($dir:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::FwatchCommand::new($dir);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
