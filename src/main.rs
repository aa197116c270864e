//! commitpilot - CLI entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dialoguer::{Editor, Select};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use commitpilot::git::{ChangeSet, CommitOutcome, FileStatus, check_git_installed};
use commitpilot::session::{
    ExternalEditor, GenerateOutcome, Orchestrator, OutboundMessage, SessionContext, serve,
};
use commitpilot::{CommitMessageResult, Settings, SettingsUpdate};

/// Generate conventional commit messages from pending git changes.
#[derive(Parser, Debug)]
#[command(name = "commitpilot")]
#[command(about = "Generate conventional commit messages from pending git changes")]
#[command(version)]
struct Cli {
    /// Repository root (defaults to the current directory)
    #[arg(short = 'C', long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// API key (overrides COMMITPILOT_API_KEY / OPENAI_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Model id (overrides COMMITPILOT_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Maximum output tokens (overrides COMMITPILOT_MAX_TOKENS)
    #[arg(long, global = true)]
    max_tokens: Option<u32>,

    /// Log filter directive, e.g. "commitpilot=debug"
    #[arg(long, global = true, env = "COMMITPILOT_LOG")]
    log: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Speak the JSON-lines host protocol on stdin/stdout
    Serve,
    /// Show staged and modified files
    Status,
    /// Print the staged diff
    Diff,
    /// Stage files, or every change with --all
    Stage {
        /// Repository-relative paths to stage
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        paths: Vec<String>,

        /// Stage all changes, including untracked files
        #[arg(long)]
        all: bool,
    },
    /// Generate a commit message for the pending changes
    Generate {
        /// Offer to commit, edit or regenerate the message
        #[arg(long)]
        commit: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log.as_deref());

    check_git_installed().context("git is required")?;

    let mut settings = Settings::from_env();
    settings.apply(SettingsUpdate {
        api_key: cli.api_key,
        model: cli.model,
        max_tokens: cli.max_tokens,
    });

    let root = cli
        .workspace
        .canonicalize()
        .with_context(|| format!("Workspace not found: {}", cli.workspace.display()))?;
    let context =
        SessionContext::open(&root, &settings).context("Failed to initialize the summarizer")?;
    let (orchestrator, outbound) =
        Orchestrator::new(context, settings, Arc::new(ExternalEditor::from_env()));

    match cli.command {
        Command::Serve => {
            serve(
                Arc::new(orchestrator),
                outbound,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await
            .context("Protocol stream failed")?;
        }
        Command::Status => {
            let status = orchestrator
                .refresh_status()
                .await
                .context("Failed to get git status")?;
            print_status(&status);
        }
        Command::Diff => {
            let diff = orchestrator
                .staged_diff()
                .await
                .context("Failed to read staged diff")?;
            if diff.trim().is_empty() {
                eprintln!("No staged changes.");
            } else {
                print!("{}", diff);
            }
        }
        Command::Stage { paths, all } => {
            let status = if all {
                orchestrator.stage_all().await.context("Failed to stage changes")?
            } else {
                let mut latest = None;
                for path in &paths {
                    latest = Some(
                        orchestrator
                            .stage_file(path)
                            .await
                            .with_context(|| format!("Failed to stage {}", path))?,
                    );
                }
                latest.unwrap_or_default()
            };
            print_status(&status);
        }
        Command::Generate { commit } => {
            let progress = tokio::spawn(print_progress(outbound));
            let result = run_generate(&orchestrator, commit).await;
            drop(orchestrator);
            progress.await.ok();
            result?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, directive: Option<&str>) {
    let filter = match directive {
        Some(d) => EnvFilter::new(d),
        None if verbose => EnvFilter::new("debug"),
        None => EnvFilter::new("warn"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Echo orchestrator progress to stderr while a terminal command runs.
async fn print_progress(mut outbound: mpsc::UnboundedReceiver<OutboundMessage>) {
    while let Some(message) = outbound.recv().await {
        if let OutboundMessage::Status { message, loading: true } = message {
            eprintln!("{}", message);
        }
    }
}

async fn run_generate(orchestrator: &Orchestrator, offer_commit: bool) -> Result<()> {
    loop {
        let message = match orchestrator.generate().await {
            Ok(GenerateOutcome::NoChanges) => {
                println!("No changes found to commit.");
                return Ok(());
            }
            Ok(GenerateOutcome::Generated(message)) => message,
            Err(e) if e.is_not_configured() => bail!("{}", e),
            Err(e) => return Err(e).context("Failed to generate commit message"),
        };

        print_message(&message);
        if !offer_commit {
            return Ok(());
        }

        let choice = Select::new()
            .with_prompt("What next?")
            .items(&["Commit", "Edit, then commit", "Regenerate", "Quit"])
            .default(0)
            .interact()
            .context("Prompt cancelled")?;

        match choice {
            0 => return commit_message(orchestrator, &message.full_message()).await,
            1 => match Editor::new()
                .edit(&message.full_message())
                .context("Failed to open editor")?
            {
                Some(edited) => return commit_message(orchestrator, &edited).await,
                None => {
                    println!("Edit discarded; nothing committed.");
                    return Ok(());
                }
            },
            2 => continue,
            _ => return Ok(()),
        }
    }
}

async fn commit_message(orchestrator: &Orchestrator, message: &str) -> Result<()> {
    match orchestrator
        .commit(message)
        .await
        .context("Failed to commit changes")?
    {
        CommitOutcome::Committed => println!("Changes committed successfully."),
        CommitOutcome::NothingToCommit => {
            println!("Nothing to commit. Stage some changes first.")
        }
    }
    Ok(())
}

fn print_message(message: &CommitMessageResult) {
    println!();
    println!("[{}] {}", message.commit_type, message.summary);
    if !message.description.trim().is_empty() {
        println!();
        println!("{}", message.description.trim());
    }
    println!();
}

fn print_status(status: &ChangeSet) {
    if !status.has_changes {
        println!("No changes.");
        return;
    }
    print_files("Staged", &status.staged_files);
    print_files("Modified", &status.modified_files);
}

fn print_files(title: &str, files: &[FileStatus]) {
    println!("{} ({}):", title, files.len());
    for file in files {
        match &file.original_path {
            Some(from) => println!("  {:<4} {} -> {}", file.status_symbol, from, file.file_path),
            None => println!("  {:<4} {}", file.status_symbol, file.file_path),
        }
    }
}
