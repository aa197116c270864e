//! `git` process spawning.
//!
//! All repository access goes through the system `git` binary, inheriting the
//! user's config, hooks and credential store. The [`GitRunner`] trait is the
//! seam tests use to script git output.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::GitError;

/// Global options applied to every invocation.
///
/// Unquoted non-ASCII paths keep diff headers readable; disabling color
/// keeps ANSI escapes out of diffs even when the user forces
/// `color.ui=always`. Path listings additionally use `-z`.
const GLOBAL_ARGS: [&str; 4] = ["-c", "core.quotePath=false", "-c", "color.ui=false"];

/// Substring git prints on stderr outside of a work tree.
const NOT_A_REPOSITORY: &str = "not a git repository";

/// How a non-zero exit status is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTolerance {
    /// Any non-zero exit is a failure.
    Strict,
    /// A non-zero exit with nothing on stderr means "no results".
    EmptyStderr,
}

/// One git command line, without the leading `git`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitInvocation {
    pub args: Vec<String>,
    pub tolerance: ExitTolerance,
}

impl GitInvocation {
    /// A read-only query that tolerates silent failures.
    pub fn query<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            tolerance: ExitTolerance::EmptyStderr,
        }
    }

    /// A mutating command where every non-zero exit is an error.
    pub fn command<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            tolerance: ExitTolerance::Strict,
        }
    }

    /// Subcommand name used in error messages.
    pub fn name(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }

    /// Whether the arguments start with the given sequence.
    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        self.args.len() >= prefix.len() && self.args.iter().zip(prefix).all(|(a, p)| a == p)
    }
}

/// Trait for executing git commands.
///
/// This abstraction allows mocking the git subprocess in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitRunner: Send + Sync {
    /// Run git in `workdir` and return its stdout.
    async fn run(&self, workdir: &Path, invocation: &GitInvocation) -> Result<String, GitError>;
}

/// Runner backed by the system `git` binary.
#[derive(Debug, Clone)]
pub struct SystemGit {
    timeout: Duration,
}

impl SystemGit {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl GitRunner for SystemGit {
    async fn run(&self, workdir: &Path, invocation: &GitInvocation) -> Result<String, GitError> {
        debug!(workdir = %workdir.display(), args = ?invocation.args, "running git");

        let output = timeout(
            self.timeout,
            Command::new("git")
                .args(GLOBAL_ARGS)
                .args(&invocation.args)
                .current_dir(workdir)
                .env("LC_ALL", "C")
                .env("GIT_TERMINAL_PROMPT", "0")
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| GitError::Timeout(self.timeout.as_secs()))?
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GitError::GitNotInstalled,
            _ => GitError::SpawnFailed(e),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            return Ok(stdout);
        }

        classify_failure(invocation, output.status.code(), stdout, stderr)
    }
}

/// Map a non-zero exit to a result according to the invocation's tolerance.
fn classify_failure(
    invocation: &GitInvocation,
    code: Option<i32>,
    stdout: String,
    stderr: String,
) -> Result<String, GitError> {
    if stderr.to_lowercase().contains(NOT_A_REPOSITORY) {
        return Err(GitError::NotARepository(stderr.trim().to_string()));
    }

    if invocation.tolerance == ExitTolerance::EmptyStderr && stderr.trim().is_empty() {
        debug!(command = invocation.name(), ?code, "treating silent git failure as empty output");
        return Ok(String::new());
    }

    let detail = if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.trim().to_string()
    };

    Err(GitError::CommandFailed {
        command: invocation.name().to_string(),
        code,
        detail,
    })
}

/// Check that a `git` executable is on PATH.
pub fn check_git_installed() -> Result<(), GitError> {
    which::which("git").map(|_| ()).map_err(|_| GitError::GitNotInstalled)
}
