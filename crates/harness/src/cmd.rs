//! External command execution with bounded retries.
//!
//! The scenario driver never rolls back a partially applied attempt: the
//! commands fed through here must themselves be safe to repeat
//! (`helm upgrade --install`, `helm repo add` on an existing repo, the K3s
//! installer re-run over an existing install).

use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::error::{Error, Result};
use crate::retry::{retry, RetryPolicy};

/// Description of an external command: program, arguments, extra environment
/// and working directory.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    cwd: Option<PathBuf>,
}

impl CommandSpec {
    /// Start building a command.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            cwd: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child process.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// The program name, for logs.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the command once. Returns the combined stdout/stderr on success,
    /// or a one-line failure description (spawn error or exit status plus
    /// output) suitable for the retry log.
    pub fn run_once(&self) -> std::result::Result<String, String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        debug!(program = %self.program, args = ?self.args, "running command");

        let output = cmd
            .output()
            .map_err(|e| format!("failed to spawn {}: {e}", self.program))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        if output.status.success() {
            Ok(combined)
        } else {
            Err(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                combined.trim()
            ))
        }
    }

    /// Run the command once, mapping failure into the error taxonomy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Command`] on non-zero exit.
    pub fn run(&self) -> Result<String> {
        self.run_once().map_err(|detail| Error::Command {
            program: self.program.clone(),
            detail,
        })
    }

    /// Run the command under a retry policy. On success the successful
    /// attempt's output is returned; earlier failures are only kept in the
    /// diagnostic log.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] carrying every failed attempt's output once
    /// the budget is exhausted.
    pub async fn run_with_retry(&self, policy: &RetryPolicy) -> Result<String> {
        retry(policy, &self.program, || async move { self.run_once() }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(5), Duration::from_millis(20)).unwrap()
    }

    #[test]
    fn captures_combined_output() {
        let out = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo out; echo err >&2")
            .run()
            .unwrap();
        assert!(out.contains("out"));
        assert!(out.contains("err"));
    }

    #[test]
    fn env_reaches_child() {
        let out = CommandSpec::new("sh")
            .arg("-c")
            .arg("printf '%s' \"$HARNESS_PROBE\"")
            .env("HARNESS_PROBE", "probe-value")
            .run()
            .unwrap();
        assert_eq!(out, "probe-value");
    }

    #[test]
    fn failure_reports_exit_status_and_output() {
        let err = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo broken; exit 3")
            .run()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("sh failed"));
        assert!(msg.contains("broken"));
    }

    #[tokio::test]
    async fn retries_until_marker_file_allows_success() {
        // Fails twice, then succeeds: the runner must return the third
        // attempt's output only.
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("count");

        let script = format!(
            "n=$(cat {path} 2>/dev/null || echo 0); n=$((n + 1)); printf '%s' \"$n\" > {path}; \
             if [ \"$n\" -lt 3 ]; then echo \"failure $n\"; exit 1; fi; echo \"success $n\"",
            path = counter.display()
        );

        let out = CommandSpec::new("sh")
            .arg("-c")
            .arg(&script)
            .run_with_retry(&quick_policy())
            .await
            .unwrap();

        assert!(out.contains("success 3"));
        assert!(!out.contains("failure"));
    }

    #[tokio::test]
    async fn always_failing_command_times_out_with_log() {
        let policy = RetryPolicy::new(Duration::from_millis(150), Duration::from_millis(30)).unwrap();
        let err = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo doomed; exit 1")
            .run_with_retry(&policy)
            .await
            .unwrap_err();

        match err {
            Error::Timeout { log, .. } => {
                assert!(!log.is_empty());
                assert!(log.iter().all(|line| line.contains("doomed")));
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }
}
