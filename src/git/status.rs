//! Change-set types and parsers for git's name-only / name-status output.
//!
//! Queries run with `-z`, so paths arrive unquoted even when they contain
//! quotes, backslashes or control characters.

use std::fmt;

use serde::Serialize;

/// Symbol reported for untracked files.
pub const UNTRACKED_SYMBOL: &str = "??";

/// Normalized state of a changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Added,
    Modified,
    Deleted,
    Renamed,
    Untracked,
}

impl FileState {
    /// Classify a raw name-status symbol by its first character.
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol.chars().next() {
            Some('A') => FileState::Added,
            Some('M') => FileState::Modified,
            Some('D') => FileState::Deleted,
            Some('R') => FileState::Renamed,
            _ => FileState::Modified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Added => "added",
            FileState::Modified => "modified",
            FileState::Deleted => "deleted",
            FileState::Renamed => "renamed",
            FileState::Untracked => "untracked",
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file in a staged or working-tree view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    /// Final path segment only.
    pub file_name: String,
    /// Repository-relative path; the key for stage/open actions.
    pub file_path: String,
    pub status: FileState,
    /// Raw symbol as git reported it (`M`, `R100`, `??`, ...).
    pub status_symbol: String,
    /// Source path of a rename or copy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
}

impl FileStatus {
    /// Synthesize an entry for an untracked path.
    pub fn untracked(path: &str) -> Self {
        Self {
            file_name: base_name(path).to_string(),
            file_path: path.to_string(),
            status: FileState::Untracked,
            status_symbol: UNTRACKED_SYMBOL.to_string(),
            original_path: None,
        }
    }
}

/// Normalized result of a repository query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub diff: String,
    pub changed_files: Vec<String>,
    pub has_changes: bool,
    pub staged_files: Vec<FileStatus>,
    pub modified_files: Vec<FileStatus>,
}

impl ChangeSet {
    /// Paths of the staged entries, in order.
    pub fn staged_paths(&self) -> Vec<String> {
        self.staged_files.iter().map(|f| f.file_path.clone()).collect()
    }

    /// Paths of the modified and untracked entries, in order.
    pub fn modified_paths(&self) -> Vec<String> {
        self.modified_files.iter().map(|f| f.file_path.clone()).collect()
    }
}

/// Staged and working-tree views captured by one status query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub staged: ChangeSet,
    pub working: ChangeSet,
}

impl StatusSnapshot {
    /// Merge both views into the full-status change set.
    ///
    /// The staged diff wins when non-empty; file lists are concatenated
    /// (staged first) without deduplication.
    pub fn merged(&self) -> ChangeSet {
        let diff = if self.staged.diff.is_empty() {
            self.working.diff.clone()
        } else {
            self.staged.diff.clone()
        };

        let mut changed_files = self.staged.changed_files.clone();
        changed_files.extend(self.working.changed_files.iter().cloned());

        ChangeSet {
            diff,
            changed_files,
            has_changes: self.staged.has_changes || self.working.has_changes,
            staged_files: self.staged.staged_files.clone(),
            modified_files: self.working.modified_files.clone(),
        }
    }
}

/// Split path output, dropping blank entries.
///
/// NUL-terminated (`-z`) output is split on NUL and paths are taken
/// verbatim; otherwise each non-blank line is one path.
pub fn parse_name_list(output: &str) -> Vec<String> {
    if output.contains('\0') {
        return output
            .split('\0')
            .filter(|path| !path.is_empty())
            .map(str::to_string)
            .collect();
    }
    output
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `git diff --name-status` output into file entries.
///
/// Accepts both the tab-separated line form and the `-z` form, where
/// every field is NUL-terminated and rename/copy records carry two paths.
/// Total over any input: unknown symbols map to `Modified` and a record
/// without a path yields an empty path.
pub fn parse_name_status(output: &str) -> Vec<FileStatus> {
    if output.contains('\0') {
        return parse_nul_records(output);
    }
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_status_line)
        .collect()
}

fn parse_nul_records(output: &str) -> Vec<FileStatus> {
    let mut fields = output.split('\0');
    let mut files = Vec::new();
    while let Some(symbol) = fields.next() {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            continue;
        }
        let file = if symbol.starts_with(['R', 'C']) {
            let original = fields.next().unwrap_or_default();
            let path = fields.next().unwrap_or_default();
            entry(symbol, path, Some(original.to_string()))
        } else {
            entry(symbol, fields.next().unwrap_or_default(), None)
        };
        files.push(file);
    }
    files
}

fn parse_status_line(line: &str) -> FileStatus {
    let line = line.trim_end_matches('\r');
    let fields: Vec<&str> = line.split('\t').collect();

    // Renames and copies carry "<symbol>\t<old>\t<new>"
    match fields.as_slice() {
        [symbol, old, new, ..] => entry(symbol.trim(), new, Some(old.to_string())),
        [symbol, path] => entry(symbol.trim(), path, None),
        _ => entry(fields[0].trim(), "", None),
    }
}

fn entry(symbol: &str, path: &str, original_path: Option<String>) -> FileStatus {
    FileStatus {
        file_name: base_name(path).to_string(),
        file_path: path.to_string(),
        status: FileState::from_symbol(symbol),
        status_symbol: symbol.to_string(),
        original_path,
    }
}

/// Final `/`-separated segment of a repository path.
fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
