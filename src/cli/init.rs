//! CLI `init` command: create the knowledge directory and an empty index.

use anyhow::{Context, Result};

use lore::store::KnowledgeStore;

use super::Workspace;

pub fn init(workspace: &Workspace) -> Result<()> {
    let already = workspace.store().is_initialized();
    let store = KnowledgeStore::init(&workspace.root, &workspace.config)
        .with_context(|| format!("failed to initialize {}", workspace.root.display()))?;
    let index = workspace.open_index()?;

    if already {
        println!("Knowledge directory already exists at {}", store.root().display());
    } else {
        println!("Initialized knowledge directory at {}", store.root().display());
    }
    if let Some(path) = index.path() {
        println!("Search index:  {}", path.display());
    }
    println!("Commit the directory to share it; `cache/` is ignored by git.");
    Ok(())
}
