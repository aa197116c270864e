//! Per-workspace service bundle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Settings;
use crate::error::SummarizeError;
use crate::git::{GitRunner, RepositoryService, SystemGit};
use crate::llm::{ChatCompletionClient, Summarizer};

/// Builds the summarizer for a workspace from the current settings.
pub type SummarizerFactory =
    Arc<dyn Fn(&Settings) -> Result<Arc<dyn Summarizer>, SummarizeError> + Send + Sync>;

/// Services bound to one workspace root.
///
/// Built once per root and replaced wholesale when the host switches
/// workspaces; the replacement gets a summarizer of its own.
#[derive(Clone)]
pub struct SessionContext {
    pub workspace_root: PathBuf,
    pub repository: RepositoryService,
    pub summarizer: Arc<dyn Summarizer>,
    factory: SummarizerFactory,
}

impl SessionContext {
    /// Production context: system git plus the HTTP summarizer.
    pub fn open(root: impl Into<PathBuf>, settings: &Settings) -> Result<Self, SummarizeError> {
        let runner: Arc<dyn GitRunner> = Arc::new(SystemGit::new(settings.git_timeout));
        Self::with_factory(root, runner, Arc::new(http_summarizer), settings)
    }

    /// Context whose summarizers come from `factory`, one per root.
    pub fn with_factory(
        root: impl Into<PathBuf>,
        runner: Arc<dyn GitRunner>,
        factory: SummarizerFactory,
        settings: &Settings,
    ) -> Result<Self, SummarizeError> {
        let workspace_root = root.into();
        let summarizer = factory(settings)?;
        Ok(Self {
            repository: RepositoryService::new(workspace_root.clone(), runner),
            workspace_root,
            summarizer,
            factory,
        })
    }

    /// Context over one caller-supplied summarizer, kept across roots.
    pub fn with_services(
        root: impl Into<PathBuf>,
        runner: Arc<dyn GitRunner>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        let workspace_root = root.into();
        let shared = Arc::clone(&summarizer);
        Self {
            repository: RepositoryService::new(workspace_root.clone(), runner),
            workspace_root,
            summarizer,
            factory: Arc::new(
                move |_: &Settings| -> Result<Arc<dyn Summarizer>, SummarizeError> {
                    Ok(Arc::clone(&shared))
                },
            ),
        }
    }

    /// Services for a different root, with a summarizer built from `settings`.
    pub fn rebind(
        &self,
        root: impl Into<PathBuf>,
        settings: &Settings,
    ) -> Result<Self, SummarizeError> {
        let summarizer = (self.factory)(settings)?;
        let repository = self.repository.rebind(root);
        Ok(Self {
            workspace_root: repository.root().to_path_buf(),
            repository,
            summarizer,
            factory: Arc::clone(&self.factory),
        })
    }

    pub fn root(&self) -> &Path {
        &self.workspace_root
    }
}

fn http_summarizer(settings: &Settings) -> Result<Arc<dyn Summarizer>, SummarizeError> {
    Ok(Arc::new(ChatCompletionClient::new(settings)?))
}
