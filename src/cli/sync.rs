//! CLI `sync` command: share the knowledge directory through git.

use anyhow::{Context, Result};

use lore::sync::{self, PullOutcome, PushOutcome, SyncOptions};

use super::Workspace;

pub fn sync(workspace: &Workspace, opts: &SyncOptions) -> Result<()> {
    let store = workspace.initialized_store()?;
    let report = sync::sync(&workspace.repo_root, &workspace.root, opts)
        .context("sync failed")?;

    let pull = match &report.pull {
        PullOutcome::Skipped => "skipped".to_string(),
        PullOutcome::NoRemote => format!("no remote named {:?}", opts.remote),
        PullOutcome::UpToDate => "up to date".to_string(),
        PullOutcome::Merged => "merged".to_string(),
        PullOutcome::Resolved { paths } => {
            format!("merged, took remote version of {} file(s)", paths.len())
        }
        PullOutcome::Aborted { paths } => format!(
            "ABORTED, conflicts outside the knowledge directory: {}",
            paths.join(", ")
        ),
        PullOutcome::Failed(reason) => format!("FAILED ({reason})"),
    };
    let push = match &report.push {
        PushOutcome::Skipped => "skipped".to_string(),
        PushOutcome::Pushed { committed: true } => "committed and pushed".to_string(),
        PushOutcome::Pushed { committed: false } => "pushed (nothing to commit)".to_string(),
        PushOutcome::CommittedLocally { committed: true } => {
            "committed locally (no remote)".to_string()
        }
        PushOutcome::CommittedLocally { committed: false } => {
            "nothing to commit (no remote)".to_string()
        }
        PushOutcome::Failed(reason) => format!("FAILED ({reason})"),
    };

    println!("Sync Report");
    println!("{}", "=".repeat(40));
    println!("  Pull:  {pull}");
    println!("  Push:  {push}");

    if let PullOutcome::Resolved { paths } = &report.pull {
        for path in paths {
            println!("    {path}");
        }
    }

    if !report.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }

    if report.needs_reindex {
        let rebuilt = super::rebuild::rebuild_all(workspace, &store)?;
        println!();
        println!("Index rebuilt ({} records)", rebuilt.indexed());
    }
    Ok(())
}
