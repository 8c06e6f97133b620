//! Subprocess execution utilities.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

/// How often a running child is polled while waiting with a timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

/// Result of waiting on a child process with a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The process exited before the deadline.
    Exited(ExitStatus),
    /// The deadline passed; the process was killed.
    TimedOut,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Create a builder that runs `command` through the host shell.
    #[cfg(windows)]
    pub fn shell(command: &str) -> Self {
        ProcessBuilder::new("cmd.exe").arg("/c").arg(command)
    }

    /// Create a builder that runs `command` through the host shell.
    #[cfg(not(windows))]
    pub fn shell(command: &str) -> Self {
        ProcessBuilder::new("/bin/sh").arg("-c").arg(command)
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Build the Command.
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Spawn the command and wait for it, giving up after `timeout`.
    ///
    /// A child still running at the deadline is killed and reaped.
    pub fn exec_with_timeout(&self, timeout: Duration) -> Result<ProcessOutcome> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("failed to wait for `{}`", self.program.display()))?
            {
                return Ok(ProcessOutcome::Exited(status));
            }

            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(ProcessOutcome::TimedOut);
            }

            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("make").arg("-C").arg("Builds/Linux");
        assert_eq!(pb.display_command(), "make -C Builds/Linux");
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_builder() {
        let pb = ProcessBuilder::shell("echo hi");
        assert_eq!(pb.get_program(), Path::new("/bin/sh"));
        assert_eq!(pb.get_args(), &["-c".to_string(), "echo hi".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_with_timeout_exits() {
        let outcome = ProcessBuilder::shell("exit 3")
            .exec_with_timeout(Duration::from_secs(5))
            .unwrap();

        match outcome {
            ProcessOutcome::Exited(status) => assert_eq!(status.code(), Some(3)),
            ProcessOutcome::TimedOut => panic!("expected the command to exit"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_with_timeout_times_out() {
        let start = Instant::now();
        let outcome = ProcessBuilder::shell("sleep 5")
            .exec_with_timeout(Duration::from_millis(200))
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
