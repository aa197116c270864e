//! Opening files and scratch documents for the user.

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::WorkbenchError;

/// Editor actions requested by the host.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Workbench: Send + Sync {
    /// Open an existing file (absolute path).
    async fn open_file(&self, path: &Path) -> Result<(), WorkbenchError>;

    /// Open `content` as a new scratch document.
    async fn open_document(&self, content: &str) -> Result<(), WorkbenchError>;
}

/// Opens files in the editor named by `$VISUAL` or `$EDITOR`.
///
/// The editor is spawned detached with null stdio so it never touches the
/// protocol stream.
#[derive(Debug, Clone, Default)]
pub struct ExternalEditor {
    command: Option<Vec<String>>,
}

impl ExternalEditor {
    /// Resolve the editor command line from the environment.
    pub fn from_env() -> Self {
        let command = ["VISUAL", "EDITOR"]
            .iter()
            .filter_map(|var| env::var(var).ok())
            .find_map(|value| shlex::split(&value).filter(|words| !words.is_empty()));
        Self { command }
    }

    /// Use an explicit command line, e.g. `["code", "--wait"]`.
    pub fn with_command(command: Vec<String>) -> Self {
        Self {
            command: Some(command).filter(|c| !c.is_empty()),
        }
    }

    async fn launch(&self, target: &Path) -> Result<(), WorkbenchError> {
        let (program, args) = self
            .command
            .as_deref()
            .and_then(|c| c.split_first())
            .ok_or(WorkbenchError::NoEditor)?;

        let resolved = which::which(program).map_err(|e| WorkbenchError::Spawn {
            editor: program.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
        })?;

        debug!(editor = %resolved.display(), target = %target.display(), "launching editor");
        Command::new(&resolved)
            .args(args)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| WorkbenchError::Spawn {
                editor: program.clone(),
                source,
            })?;

        info!(target = %target.display(), "opened in editor");
        Ok(())
    }
}

/// Write `content` to a persistent temp file the editor can open.
pub fn write_scratch_document(content: &str) -> Result<PathBuf, WorkbenchError> {
    let mut file = tempfile::Builder::new()
        .prefix("commitpilot-")
        .suffix(".txt")
        .tempfile()
        .map_err(WorkbenchError::Io)?;
    file.write_all(content.as_bytes()).map_err(WorkbenchError::Io)?;
    file.flush().map_err(WorkbenchError::Io)?;

    let (_, path) = file.keep().map_err(|e| WorkbenchError::Io(e.error))?;
    Ok(path)
}

#[async_trait]
impl Workbench for ExternalEditor {
    async fn open_file(&self, path: &Path) -> Result<(), WorkbenchError> {
        self.launch(path).await
    }

    async fn open_document(&self, content: &str) -> Result<(), WorkbenchError> {
        // Fail before leaving a file behind.
        if self.command.is_none() {
            return Err(WorkbenchError::NoEditor);
        }
        let path = write_scratch_document(content)?;
        self.launch(&path).await
    }
}
