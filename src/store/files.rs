//! Scanner output and project-level singleton documents.
//!
//! File summaries live in `index/files.json` as a map keyed by path, so the
//! serialized form is ordered and diffs cleanly.

use std::collections::BTreeMap;

use super::types::{FileIndex, ProjectMeta};
use super::{atomic, now, KnowledgeStore};
use crate::error::StoreResult;

type FileMap = BTreeMap<String, FileIndex>;

impl KnowledgeStore {
    /// Insert or replace one file summary.
    pub fn save_file_index(&self, file: FileIndex) -> StoreResult<()> {
        self.save_file_indexes_bulk(vec![file]).map(|_| ())
    }

    /// Insert or replace many file summaries with one read and one write.
    pub fn save_file_indexes_bulk(&self, files: Vec<FileIndex>) -> StoreResult<usize> {
        if files.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_guard()?;
        let path = self.layout.files();
        let mut map: FileMap = atomic::read_json(&path)?;

        let count = files.len();
        for file in files {
            map.insert(file.path.clone(), file);
        }
        atomic::write_json(&path, &map)?;

        tracing::debug!(count, total = map.len(), "file summaries saved");
        Ok(count)
    }

    pub fn file_index(&self, path: &str) -> StoreResult<Option<FileIndex>> {
        let _guard = self.read_guard()?;
        let mut map: FileMap = atomic::read_json(&self.layout.files())?;
        Ok(map.remove(path))
    }

    /// All file summaries, ordered by path.
    pub fn file_indexes(&self) -> StoreResult<Vec<FileIndex>> {
        let _guard = self.read_guard()?;
        let map: FileMap = atomic::read_json(&self.layout.files())?;
        Ok(map.into_values().collect())
    }

    /// Returns `true` if a summary was removed.
    pub fn remove_file_index(&self, path: &str) -> StoreResult<bool> {
        let _guard = self.write_guard()?;
        let files_path = self.layout.files();
        let mut map: FileMap = atomic::read_json(&files_path)?;
        if map.remove(path).is_none() {
            return Ok(false);
        }
        atomic::write_json(&files_path, &map)?;
        Ok(true)
    }

    pub fn project_meta(&self) -> StoreResult<Option<ProjectMeta>> {
        let _guard = self.read_guard()?;
        atomic::read_json_opt(&self.layout.project())
    }

    /// Write project metadata, stamping `created_at` on first save and
    /// `updated_at` every time.
    pub fn save_project_meta(&self, mut meta: ProjectMeta) -> StoreResult<ProjectMeta> {
        let _guard = self.write_guard()?;
        let path = self.layout.project();
        let existing: Option<ProjectMeta> = atomic::read_json_opt(&path)?;

        let timestamp = now();
        meta.created_at = existing
            .map(|m| m.created_at)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| timestamp.clone());
        meta.updated_at = timestamp;

        atomic::write_json(&path, &meta)?;
        Ok(meta)
    }

    pub fn architecture(&self) -> StoreResult<Option<serde_json::Value>> {
        let _guard = self.read_guard()?;
        atomic::read_json_opt(&self.layout.architecture())
    }

    pub fn save_architecture(&self, doc: &serde_json::Value) -> StoreResult<()> {
        let _guard = self.write_guard()?;
        atomic::write_json(&self.layout.architecture(), doc)
    }

    pub fn api_surface(&self) -> StoreResult<Option<serde_json::Value>> {
        let _guard = self.read_guard()?;
        atomic::read_json_opt(&self.layout.api_surface())
    }

    pub fn save_api_surface(&self, doc: &serde_json::Value) -> StoreResult<()> {
        let _guard = self.write_guard()?;
        atomic::write_json(&self.layout.api_surface(), doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file(path: &str, summary: &str) -> FileIndex {
        FileIndex {
            path: path.into(),
            summary: summary.into(),
            exports: vec![],
            imports: vec![],
            language: Some("rust".into()),
            patterns: vec![],
            content_hash: "abc".into(),
            indexed_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn save_replaces_by_path() {
        let tmp = TempDir::new().unwrap();
        let store = KnowledgeStore::open(tmp.path());
        store.save_file_index(file("src/lib.rs", "old")).unwrap();
        store.save_file_index(file("src/lib.rs", "new")).unwrap();

        let files = store.file_indexes().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].summary, "new");
    }

    #[test]
    fn bulk_save_and_remove() {
        let tmp = TempDir::new().unwrap();
        let store = KnowledgeStore::open(tmp.path());
        let saved = store
            .save_file_indexes_bulk(vec![file("b.rs", "b"), file("a.rs", "a")])
            .unwrap();
        assert_eq!(saved, 2);

        let paths: Vec<String> = store.file_indexes().unwrap().into_iter().map(|f| f.path).collect();
        assert_eq!(paths, vec!["a.rs", "b.rs"]);

        assert!(store.remove_file_index("a.rs").unwrap());
        assert!(!store.remove_file_index("a.rs").unwrap());
        assert!(store.file_index("a.rs").unwrap().is_none());
        assert_eq!(store.file_index("b.rs").unwrap().unwrap().summary, "b");
    }

    #[test]
    fn project_meta_keeps_creation_time() {
        let tmp = TempDir::new().unwrap();
        let store = KnowledgeStore::open(tmp.path());
        assert!(store.project_meta().unwrap().is_none());

        let first = store
            .save_project_meta(ProjectMeta {
                name: "lore".into(),
                ..Default::default()
            })
            .unwrap();
        let second = store
            .save_project_meta(ProjectMeta {
                name: "lore".into(),
                description: "knowledge base".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(store.project_meta().unwrap().unwrap().description, "knowledge base");
    }

    #[test]
    fn singleton_documents() {
        let tmp = TempDir::new().unwrap();
        let store = KnowledgeStore::open(tmp.path());
        let doc = serde_json::json!({"layers": ["store", "index"]});
        store.save_architecture(&doc).unwrap();
        assert_eq!(store.architecture().unwrap(), Some(doc));
        assert!(store.api_surface().unwrap().is_none());
    }
}
