//! CLI `rebuild` command: regenerate the derived index from the canonical store.

use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use lore::index::{DerivedIndex, RebuildReport};
use lore::store::KnowledgeStore;

use super::Workspace;

pub fn rebuild(workspace: &Workspace) -> Result<()> {
    let store = workspace.initialized_store()?;
    let report = rebuild_all(workspace, &store)?;

    println!("Rebuild complete");
    println!("{}", "=".repeat(40));
    println!("  Files:               {}", report.files);
    println!("  Decisions:           {}", report.decisions);
    println!("  Warnings:            {}", report.warnings);
    println!("  Features:            {}", report.features);
    println!("  Semantic documents:  {}", report.semantic_documents);

    if !report.is_clean() {
        println!();
        println!("Skipped ({}):", report.failures.len());
        for failure in &report.failures {
            println!("  - {failure}");
        }
    }
    Ok(())
}

/// Run the structured and semantic passes with a spinner on stderr.
pub fn rebuild_all(workspace: &Workspace, store: &KnowledgeStore) -> Result<RebuildReport> {
    let index = workspace.open_index()?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("  {spinner} {msg} ({elapsed})")?);
    pb.enable_steady_tick(Duration::from_millis(100));

    pb.set_message("indexing store");
    let mut report = index
        .rebuild_from(store)
        .context("failed to rebuild search index")?;

    pb.set_message("fitting semantic model");
    let semantic = index
        .semantic(&workspace.config.semantic)
        .rebuild_from(store)
        .context("failed to rebuild semantic vectors")?;
    report.merge(semantic);

    pb.finish_and_clear();
    tracing::info!(
        indexed = report.indexed(),
        failures = report.failures.len(),
        "index rebuilt"
    );
    Ok(report)
}
