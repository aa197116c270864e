//! Commit orchestration and the host protocol.

pub mod context;
pub mod orchestrator;
pub mod protocol;
pub mod server;
pub mod workbench;

pub use context::{SessionContext, SummarizerFactory};
pub use orchestrator::{GenerateOutcome, Orchestrator, Outbox, Phase};
pub use protocol::{CommitMessageView, GitStatusView, InboundMessage, OutboundMessage};
pub use server::serve;
pub use workbench::{ExternalEditor, Workbench};
