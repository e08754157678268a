mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cli::search::SearchKind;
use cli::Workspace;

#[derive(Parser)]
#[command(name = "lore", version, about = "Persistent project knowledge base")]
struct Cli {
    /// Repository root
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Knowledge directory, relative to the repository root unless absolute
    /// (default: `.lore`, or $LORE_DIR)
    #[arg(long, global = true)]
    dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the knowledge directory and an empty index
    Init,
    /// Show store and index statistics
    Stats,
    /// Search the index
    Search {
        query: String,
        /// What to search
        #[arg(long, value_enum, default_value_t = SearchKind::Decisions)]
        kind: SearchKind,
        /// Rank by TF-IDF similarity instead of keyword match
        #[arg(long)]
        semantic: bool,
        /// Restrict decisions and warnings to a feature
        #[arg(long)]
        feature: Option<String>,
        /// Restrict files and code chunks to a language
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Regenerate the search index and semantic vectors from the store
    Rebuild,
    /// Pull, auto-resolve and push the knowledge directory through git
    Sync {
        #[arg(long)]
        no_pull: bool,
        #[arg(long)]
        no_push: bool,
        /// Remote name (default from config)
        #[arg(long)]
        remote: Option<String>,
        /// Branch (default: current branch)
        #[arg(long)]
        branch: Option<String>,
        /// Commit message for local changes
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Check the index and knowledge directory for problems
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let workspace = Workspace::locate(&cli.repo, cli.dir.as_deref())?;

    // Log to stderr so command output on stdout stays clean.
    let filter = EnvFilter::try_new(&workspace.config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Init => cli::init::init(&workspace)?,
        Command::Stats => cli::stats::stats(&workspace)?,
        Command::Search {
            query,
            kind,
            semantic,
            feature,
            language,
            limit,
        } => {
            let args = cli::search::SearchArgs {
                query,
                kind,
                semantic,
                feature,
                language,
                limit,
            };
            cli::search::search(&workspace, &args)?;
        }
        Command::Rebuild => cli::rebuild::rebuild(&workspace)?,
        Command::Sync {
            no_pull,
            no_push,
            remote,
            branch,
            message,
        } => {
            let mut opts = lore::sync::SyncOptions::from_config(&workspace.config.sync);
            opts.pull = !no_pull;
            opts.push = !no_push;
            if let Some(remote) = remote {
                opts.remote = remote;
            }
            if branch.is_some() {
                opts.branch = branch;
            }
            opts.message = message;
            cli::sync::sync(&workspace, &opts)?;
        }
        Command::Doctor => cli::doctor::doctor(&workspace)?,
    }

    Ok(())
}
