//! Repository access through the system `git` binary.

pub mod runner;
pub mod service;
pub mod status;

pub use runner::{ExitTolerance, GitInvocation, GitRunner, SystemGit, check_git_installed};
pub use service::{CommitOutcome, RepositoryService};
pub use status::{ChangeSet, FileState, FileStatus, StatusSnapshot, parse_name_list, parse_name_status};
