//! CLI `stats` command: counts from the canonical store and the search index.

use anyhow::{Context, Result};

use lore::index::IndexStats;

use super::Workspace;

/// Display knowledge statistics in the terminal.
pub fn stats(workspace: &Workspace) -> Result<()> {
    let store = workspace.initialized_store()?;

    let decisions = store.decisions().context("failed to read decisions")?;
    let active_decisions = decisions
        .iter()
        .filter(|d| d.status == lore::store::types::DecisionStatus::Active)
        .count();
    let warnings = store.warnings().context("failed to read warnings")?;
    let insights = store.insights().context("failed to read insights")?;
    let patterns = store.patterns().context("failed to read patterns")?;
    let edges = store.edges().context("failed to read graph")?;
    let files = store.file_indexes().context("failed to read file index")?;
    let features = store.features().context("failed to read features")?;
    let archived = store
        .archived_features()
        .context("failed to read archived features")?;

    println!("Knowledge Statistics");
    println!("{}", "=".repeat(40));
    println!("  Decisions:           {} ({} active)", decisions.len(), active_decisions);
    println!("  Warnings:            {}", warnings.len());
    println!("  Insights:            {}", insights.len());
    println!("  Patterns:            {}", patterns.len());
    println!("  Graph edges:         {}", edges.len());
    println!("  Indexed files:       {}", files.len());
    println!();

    println!("Features:");
    println!("  {:<12} {}", "active", features.len());
    println!("  {:<12} {}", "archived", archived.len());
    println!();

    let index_path = workspace.index_path();
    if !index_path.exists() {
        println!("Search index:          not built (run `lore rebuild`)");
        return Ok(());
    }
    let index = workspace.open_index()?;
    let IndexStats {
        files,
        decisions,
        warnings,
        features,
        code_chunks,
        semantic_documents,
    } = index.stats().context("failed to read index statistics")?;
    let size = std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0);

    println!("Search index:");
    println!("  Files:               {files}");
    println!("  Decisions:           {decisions}");
    println!("  Warnings:            {warnings}");
    println!("  Features:            {features}");
    println!("  Code chunks:         {code_chunks}");
    println!("  Semantic documents:  {semantic_documents}");
    println!("  Database size:       {size} bytes");

    Ok(())
}
