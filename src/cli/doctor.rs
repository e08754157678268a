//! CLI `doctor` command: check the knowledge directory and index, print a health report.

use anyhow::{Context, Result};

use lore::index::meta::TOKENIZER_VERSION;
use lore::store::features::AncestorTermination;
use lore::store::KnowledgeStore;

use super::Workspace;

/// Run diagnostics and print a health report.
pub fn doctor(workspace: &Workspace) -> Result<()> {
    let store = workspace.store();
    if !store.is_initialized() {
        println!("Knowledge directory: not found at {}", workspace.root.display());
        println!("Run `lore init` to create it.");
        return Ok(());
    }

    println!("Lore Health Report");
    println!("==================");
    println!();
    println!("Knowledge dir:     {}", workspace.root.display());

    let problems = check_store(workspace, &store);
    if problems.is_empty() {
        println!("Collections:       OK");
    } else {
        println!("Collections:       {} problem(s)", problems.len());
        for problem in &problems {
            println!("  - {problem}");
        }
    }
    println!();

    let db_path = workspace.index_path();
    if !db_path.exists() {
        println!("Search index:      not found at {}", db_path.display());
        println!("Run `lore rebuild` to create it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    let index = workspace
        .open_index()
        .context("failed to open search index (may be corrupt)")?;
    let report = index.check_health().context("failed to run health check")?;

    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!();
    println!("Tokenizer:");
    println!(
        "  Stored:          {}",
        report.tokenizer_version.as_deref().unwrap_or("(not set)")
    );
    println!("  Current:         {TOKENIZER_VERSION}");
    if report.tokenizer_stale() {
        println!("  WARNING: tokenizer mismatch! Run `lore rebuild` to refit vectors.");
    } else if report.tokenizer_version.is_some() {
        println!("  Status:          OK (match)");
    }
    if !report.semantic_model_fitted {
        println!("  Semantic model:  not fitted (run `lore rebuild`)");
    }
    println!();
    println!("Row counts:");
    println!("  Files:           {}", report.stats.files);
    println!("  Decisions:       {}", report.stats.decisions);
    println!("  Warnings:        {}", report.stats.warnings);
    println!("  Features:        {}", report.stats.features);
    println!("  Code chunks:     {}", report.stats.code_chunks);
    println!("  Semantic docs:   {}", report.stats.semantic_documents);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  The index is derived and safe to delete:");
        println!("     rm {}", db_path.display());
        println!("     lore rebuild");
    }

    Ok(())
}

/// Load every collection and walk every feature's ancestry, collecting problems.
fn check_store(workspace: &Workspace, store: &KnowledgeStore) -> Vec<String> {
    let mut problems = Vec::new();
    let mut check = |label: &str, result: Result<usize, lore::error::StoreError>| {
        if let Err(e) = result {
            problems.push(format!("{label}: {e}"));
        }
    };
    check("decisions", store.decisions().map(|v| v.len()));
    check("warnings", store.warnings().map(|v| v.len()));
    check("insights", store.insights().map(|v| v.len()));
    check("patterns", store.patterns().map(|v| v.len()));
    check("evolution", store.evolution().map(|v| v.len()));
    check("graph", store.edges().map(|v| v.len()));
    check("files", store.file_indexes().map(|v| v.len()));
    check("archive", store.archived_features().map(|v| v.len()));

    let features = match store.features() {
        Ok(features) => features,
        Err(e) => {
            problems.push(format!("features: {e}"));
            return problems;
        }
    };
    let depth = workspace.config.storage.ancestor_depth;
    for feature in &features {
        match store.feature_ancestors(&feature.id, depth) {
            Ok(chain) => match chain.termination {
                AncestorTermination::Cycle => {
                    problems.push(format!("feature {}: `extends` chain has a cycle", feature.id))
                }
                AncestorTermination::Unresolved => problems.push(format!(
                    "feature {}: extends a feature that does not exist",
                    feature.id
                )),
                _ => {}
            },
            Err(e) => problems.push(format!("feature {}: {e}", feature.id)),
        }
    }
    problems
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
