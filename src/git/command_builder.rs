//! Fluent builder for the Git commands the registry cache runs.
//!
//! Every Git invocation goes through [`GitCommand`] so that timeouts, working
//! directory handling, credential redaction and error mapping behave the same
//! way everywhere.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::PrsError;
use crate::git::url::strip_auth_from_url;

/// Name of the Git executable looked up on `PATH`.
#[cfg(windows)]
pub const GIT_EXECUTABLE: &str = "git.exe";
/// Name of the Git executable looked up on `PATH`.
#[cfg(not(windows))]
pub const GIT_EXECUTABLE: &str = "git";

/// Builder for a single Git process.
///
/// ```rust,no_run
/// use prs_resolver::git::command_builder::GitCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let head = GitCommand::current_commit()
///     .current_dir("/path/to/clone")
///     .execute_stdout()
///     .await?;
/// println!("{head}");
/// # Ok(())
/// # }
/// ```
///
/// New commands time out after five minutes, capture output and inherit the
/// parent environment. Prompts are disabled so a missing credential fails
/// fast instead of hanging.
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
    /// Remote URL of a clone or fetch, redacted in logs and errors
    clone_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            env_vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            timeout_duration: Some(Duration::from_secs(300)),
            context: None,
            clone_url: None,
        }
    }
}

impl GitCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the command with `git -C <dir>`.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for this invocation only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Sets `GIT_SSH_COMMAND` to authenticate with the given private key.
    pub fn ssh_key(self, key_path: impl AsRef<Path>) -> Self {
        let command = format!(
            "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=accept-new",
            key_path.as_ref().display()
        );
        self.env("GIT_SSH_COMMAND", command)
    }

    /// Sets a custom timeout (`None` for no timeout).
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Prefixes log lines with an identifier, usually the repository being fetched.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn display_args(&self, full_args: &[String]) -> String {
        full_args
            .iter()
            .map(|arg| match &self.clone_url {
                Some(url) if arg == url => strip_auth_from_url(url),
                _ => arg.clone(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Executes the command and returns its captured output.
    ///
    /// A non-zero exit becomes [`PrsError::GitCommandError`] carrying stderr
    /// (or stdout when stderr is empty); a missing executable becomes
    /// [`PrsError::GitNotFound`].
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = Instant::now();
        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());

        let operation = self.args.first().cloned().unwrap_or_else(|| "unknown".to_string());
        let shown = self.display_args(&full_args);
        let prefix = self.context.as_ref().map(|ctx| format!("({ctx}) ")).unwrap_or_default();
        tracing::debug!(target: "git", "{}Executing command: {} {}", prefix, GIT_EXECUTABLE, shown);

        let mut cmd = Command::new(GIT_EXECUTABLE);
        cmd.args(&full_args).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        let output_future = cmd.output();
        let result = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        target: "git",
                        "{}Command timed out after {} seconds: git {}",
                        prefix,
                        duration.as_secs(),
                        shown
                    );
                    return Err(PrsError::GitCommandError {
                        operation,
                        stderr: format!("git {shown} timed out after {} seconds", duration.as_secs()),
                    }
                    .into());
                }
            },
            None => output_future.await,
        };

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PrsError::GitNotFound.into());
            }
            Err(e) => return Err(e).context(format!("Failed to execute git {shown}")),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "{}Command failed with exit code {:?}: {}",
                prefix,
                output.status.code(),
                stderr.trim()
            );
            let stderr = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(PrsError::GitCommandError {
                operation,
                stderr: match &self.clone_url {
                    Some(url) => stderr.replace(url.as_str(), &strip_auth_from_url(url)),
                    None => stderr,
                },
            }
            .into());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() >= 1 {
            tracing::info!(target: "git::perf", "{}Git {} took {:.2}s", prefix, operation, elapsed.as_secs_f64());
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(target: "git::perf", "{}Git {} took {}ms", prefix, operation, elapsed.as_millis());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Executes the command and returns trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Executes the command, discarding its output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

/// Captured output of a successful Git command.
#[derive(Debug)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl GitCommand {
    /// `git clone --depth <depth> --branch <ref> --single-branch <url> <target>`
    pub fn clone_shallow(url: &str, reference: &str, depth: u32, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new().args([
            "clone".to_string(),
            "--depth".to_string(),
            depth.to_string(),
            "--branch".to_string(),
            reference.to_string(),
            "--single-branch".to_string(),
            "--no-tags".to_string(),
            url.to_string(),
            target.as_ref().display().to_string(),
        ]);
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// Full clone of the default branch, used when `--branch` cannot name the ref
    /// (for example a commit SHA).
    pub fn clone_full(url: &str, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new().args([
            "clone".to_string(),
            url.to_string(),
            target.as_ref().display().to_string(),
        ]);
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// `git fetch --force [--depth <depth>] <remote> <ref>`
    ///
    /// `remote` is either `origin` or a URL carrying credentials, so tokens
    /// are never written into the clone's config.
    pub fn fetch_ref(remote: &str, reference: &str, depth: Option<u32>) -> Self {
        let cmd = Self::new().args(["fetch", "--force"]);
        let mut cmd = match depth {
            Some(depth) => cmd.args(["--depth".to_string(), depth.to_string()]),
            None => cmd,
        };
        cmd = cmd.args([remote, reference]);
        cmd.clone_url = Some(remote.to_string());
        cmd
    }

    /// Checks out whatever the last fetch brought in.
    pub fn checkout_fetch_head() -> Self {
        Self::new().args(["checkout", "--force", "--detach", "FETCH_HEAD"])
    }

    pub fn checkout(reference: &str) -> Self {
        Self::new().args(["checkout", "--force", reference])
    }

    /// `git reset --hard <target>`
    pub fn reset_hard(target: &str) -> Self {
        Self::new().args(["reset", "--hard", target])
    }

    pub fn current_commit() -> Self {
        Self::new().args(["rev-parse", "HEAD"])
    }

    pub fn remote_url() -> Self {
        Self::new().args(["remote", "get-url", "origin"])
    }

    pub fn set_remote_url(url: &str) -> Self {
        Self::new().args(["remote", "set-url", "origin", url])
    }

    pub fn version() -> Self {
        Self::new().arg("--version").with_timeout(Some(Duration::from_secs(10)))
    }
}
