//! Feature contexts: lifecycle, conversations, and `extends` resolution.
//!
//! A feature is a directory. Archiving and recalling rename that directory
//! between `features/` and `archive/`, carrying its conversations along.
//! Metadata is only rewritten after the rename succeeds; if the rewrite
//! then fails, the rename is rolled back.

use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::layout::{self, conversations_dir, meta_path};
use super::types::{Conversation, Feature, FeatureStatus, FeatureUpdate, NewConversation, NewFeature};
use super::{atomic, new_id, now, KnowledgeStore, Salvaged};
use crate::error::{StoreError, StoreResult};

pub const CONVERSATION_PREFIX: &str = "conv";

/// Default bound for the `extends` walk.
pub const DEFAULT_ANCESTOR_DEPTH: usize = 5;

/// Why an ancestor walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AncestorTermination {
    /// Reached a feature with no parent.
    Root,
    /// The next parent had already been visited.
    Cycle,
    /// Hit the depth bound while parents remained.
    DepthLimit,
    /// The next parent could not be found (or read) in either location.
    Unresolved,
}

/// Result of resolving a feature's `extends` chain, nearest parent first.
#[derive(Debug, Clone, Serialize)]
pub struct AncestorChain {
    pub ancestors: Vec<Feature>,
    pub termination: AncestorTermination,
}

impl AncestorChain {
    /// True if the chain ended naturally rather than being cut short.
    pub fn is_complete(&self) -> bool {
        self.termination == AncestorTermination::Root
    }
}

/// Where a feature currently lives.
enum Location {
    Active(PathBuf),
    Archived(PathBuf),
}

impl KnowledgeStore {
    /// Create an active feature. Fails if the id exists in either location.
    pub fn create_feature(&self, new: NewFeature) -> StoreResult<Feature> {
        validate_feature_id(&new.id)?;
        let _guard = self.write_guard()?;

        if self.locate(&new.id).is_some() {
            return Err(StoreError::FeatureExists(new.id));
        }

        let timestamp = now();
        let feature = Feature {
            id: new.id,
            status: FeatureStatus::Active,
            branch: new.branch,
            extends: new.extends.filter(|p| !p.is_empty()),
            current_state: new.current_state,
            relevant_files: new.relevant_files,
            owner: new.owner,
            created_at: timestamp.clone(),
            last_accessed: timestamp,
            archived_at: None,
        };

        let dir = self.layout.feature_dir(&feature.id);
        let conversations = conversations_dir(&dir);
        fs::create_dir_all(&conversations).map_err(|e| StoreError::io(&conversations, e))?;
        atomic::write_json(&meta_path(&dir), &feature)?;

        tracing::info!(id = %feature.id, extends = ?feature.extends, "feature created");
        Ok(feature)
    }

    /// Move an active feature (and its conversations) into the archive.
    pub fn archive_feature(&self, id: &str) -> StoreResult<Feature> {
        validate_feature_id(id)?;
        let _guard = self.write_guard()?;

        let from = match self.locate(id) {
            Some(Location::Active(dir)) => dir,
            Some(Location::Archived(_)) => return Err(StoreError::AlreadyArchived(id.into())),
            None => return Err(StoreError::FeatureNotFound(id.into())),
        };
        let to = self.layout.archived_feature_dir(id);

        let feature = self.relocate(id, &from, &to, |feature| {
            let timestamp = now();
            feature.status = FeatureStatus::Archived;
            feature.archived_at = Some(timestamp.clone());
            feature.last_accessed = timestamp;
        })?;

        tracing::info!(id = %id, "feature archived");
        Ok(feature)
    }

    /// Bring an archived feature back to the active location.
    pub fn recall_feature(&self, id: &str) -> StoreResult<Feature> {
        validate_feature_id(id)?;
        let _guard = self.write_guard()?;

        let from = match self.locate(id) {
            Some(Location::Archived(dir)) => dir,
            _ => return Err(StoreError::NotArchived(id.into())),
        };
        let to = self.layout.feature_dir(id);

        let feature = self.relocate(id, &from, &to, |feature| {
            feature.status = FeatureStatus::Active;
            feature.archived_at = None;
            feature.last_accessed = now();
        })?;

        tracing::info!(id = %id, "feature recalled");
        Ok(feature)
    }

    /// Look up a feature, active location first.
    pub fn feature(&self, id: &str) -> StoreResult<Feature> {
        validate_feature_id(id)?;
        let _guard = self.read_guard()?;
        self.load_feature(id)?
            .ok_or_else(|| StoreError::FeatureNotFound(id.into()))
    }

    /// Active features, sorted by id.
    pub fn features(&self) -> StoreResult<Vec<Feature>> {
        let _guard = self.read_guard()?;
        load_features_in(&self.layout.features_dir())
    }

    /// Archived features, sorted by id.
    pub fn archived_features(&self) -> StoreResult<Vec<Feature>> {
        let _guard = self.read_guard()?;
        load_features_in(&self.layout.archive_dir())
    }

    /// Update mutable fields of an active feature and bump `last_accessed`.
    pub fn update_feature(&self, id: &str, update: FeatureUpdate) -> StoreResult<Feature> {
        self.modify_active(id, |feature| {
            if let Some(state) = update.current_state {
                feature.current_state = state;
            }
            if let Some(files) = update.relevant_files {
                feature.relevant_files = files;
            }
            if let Some(branch) = update.branch {
                feature.branch = Some(branch);
            }
            if let Some(owner) = update.owner {
                feature.owner = Some(owner);
            }
            feature.last_accessed = now();
        })
    }

    pub fn touch_feature(&self, id: &str) -> StoreResult<Feature> {
        self.modify_active(id, |feature| feature.last_accessed = now())
    }

    /// Walk the `extends` chain up to `max_depth` parents.
    ///
    /// Stops quietly on a missing parent, a cycle, or the depth bound; the
    /// [`AncestorTermination`] says which. Only a missing starting feature
    /// is an error.
    pub fn feature_ancestors(&self, id: &str, max_depth: usize) -> StoreResult<AncestorChain> {
        let mut current = self.feature(id)?;
        let _guard = self.read_guard()?;

        let mut visited: HashSet<String> = HashSet::from([current.id.clone()]);
        let mut ancestors = Vec::new();

        let termination = loop {
            let Some(parent_id) = current.extends.clone().filter(|p| !p.is_empty()) else {
                break AncestorTermination::Root;
            };
            if !visited.insert(parent_id.clone()) {
                break AncestorTermination::Cycle;
            }
            if ancestors.len() >= max_depth {
                break AncestorTermination::DepthLimit;
            }
            let parent = match validate_feature_id(&parent_id).and_then(|_| self.load_feature(&parent_id)) {
                Ok(Some(parent)) => parent,
                Ok(None) => break AncestorTermination::Unresolved,
                Err(e) => {
                    tracing::warn!(feature = %id, parent = %parent_id, error = %e, "unreadable parent feature");
                    break AncestorTermination::Unresolved;
                }
            };
            ancestors.push(parent.clone());
            current = parent;
        };

        tracing::debug!(feature = %id, depth = ancestors.len(), ?termination, "resolved ancestors");
        Ok(AncestorChain {
            ancestors,
            termination,
        })
    }

    /// Save a conversation under an active feature. Conversations are never
    /// rewritten once saved.
    pub fn save_conversation(
        &self,
        feature_id: &str,
        new: NewConversation,
    ) -> StoreResult<Conversation> {
        validate_feature_id(feature_id)?;
        let _guard = self.write_guard()?;

        let dir = match self.locate(feature_id) {
            Some(Location::Active(dir)) => dir,
            Some(Location::Archived(_)) => {
                return Err(StoreError::FeatureArchived(feature_id.into()))
            }
            None => return Err(StoreError::FeatureNotFound(feature_id.into())),
        };

        let conversation = Conversation {
            id: new_id(CONVERSATION_PREFIX),
            feature: feature_id.to_string(),
            summary: new.summary,
            key_points: new.key_points,
            files_discussed: new.files_discussed,
            created_at: now(),
        };
        let path = conversations_dir(&dir).join(format!("{}.json", conversation.id));
        atomic::write_json(&path, &conversation)?;

        tracing::info!(id = %conversation.id, feature = %feature_id, "conversation saved");
        Ok(conversation)
    }

    /// Conversations of a feature in either location, oldest first.
    pub fn conversations(&self, feature_id: &str) -> StoreResult<Vec<Conversation>> {
        validate_feature_id(feature_id)?;
        let _guard = self.read_guard()?;

        let dir = match self.locate(feature_id) {
            Some(Location::Active(dir)) | Some(Location::Archived(dir)) => conversations_dir(&dir),
            None => return Err(StoreError::FeatureNotFound(feature_id.into())),
        };

        let mut conversations: Vec<Conversation> = Vec::new();
        for path in json_files_in(&dir)? {
            if let Some(conversation) = atomic::read_json_opt(&path)? {
                conversations.push(conversation);
            }
        }
        sort_conversations(&mut conversations);
        Ok(conversations)
    }

    /// Active then archived features. An unreadable `meta.json` is skipped
    /// and reported rather than failing the listing.
    pub(crate) fn salvage_features(&self) -> StoreResult<Salvaged<Feature>> {
        let _guard = self.read_guard()?;
        let mut salvaged = Salvaged::default();
        for root in [self.layout.features_dir(), self.layout.archive_dir()] {
            for dir in feature_dirs_in(&root)? {
                match atomic::read_json_opt::<Feature>(&meta_path(&dir)) {
                    Ok(Some(feature)) => salvaged.items.push(feature),
                    Ok(None) => {}
                    Err(e) => salvaged.skipped.push(e.to_string()),
                }
            }
        }
        Ok(salvaged)
    }

    /// Conversations of every feature, grouped by feature in the order of
    /// [`Self::salvage_features`], oldest first within a feature.
    pub(crate) fn salvage_conversations(&self) -> StoreResult<Salvaged<Conversation>> {
        let _guard = self.read_guard()?;
        let mut salvaged = Salvaged::default();
        for root in [self.layout.features_dir(), self.layout.archive_dir()] {
            for dir in feature_dirs_in(&root)? {
                if !meta_path(&dir).is_file() {
                    continue;
                }
                let mut conversations: Vec<Conversation> = Vec::new();
                for path in json_files_in(&conversations_dir(&dir))? {
                    match atomic::read_json_opt(&path) {
                        Ok(Some(conversation)) => conversations.push(conversation),
                        Ok(None) => {}
                        Err(e) => salvaged.skipped.push(e.to_string()),
                    }
                }
                sort_conversations(&mut conversations);
                salvaged.items.extend(conversations);
            }
        }
        Ok(salvaged)
    }

    // ── Internal helpers (callers hold the lock) ──────────────────────────────

    fn locate(&self, id: &str) -> Option<Location> {
        let active = self.layout.feature_dir(id);
        if meta_path(&active).is_file() {
            return Some(Location::Active(active));
        }
        let archived = self.layout.archived_feature_dir(id);
        if meta_path(&archived).is_file() {
            return Some(Location::Archived(archived));
        }
        None
    }

    fn load_feature(&self, id: &str) -> StoreResult<Option<Feature>> {
        match self.locate(id) {
            Some(Location::Active(dir)) | Some(Location::Archived(dir)) => {
                atomic::read_json_opt(&meta_path(&dir))
            }
            None => Ok(None),
        }
    }

    fn modify_active(&self, id: &str, apply: impl FnOnce(&mut Feature)) -> StoreResult<Feature> {
        validate_feature_id(id)?;
        let _guard = self.write_guard()?;

        let dir = match self.locate(id) {
            Some(Location::Active(dir)) => dir,
            Some(Location::Archived(_)) => return Err(StoreError::FeatureArchived(id.into())),
            None => return Err(StoreError::FeatureNotFound(id.into())),
        };
        let path = meta_path(&dir);
        let mut feature: Feature = atomic::read_json_opt(&path)?
            .ok_or_else(|| StoreError::FeatureNotFound(id.into()))?;
        apply(&mut feature);
        atomic::write_json(&path, &feature)?;
        Ok(feature)
    }

    /// Rename `from` to `to`, then rewrite the metadata at its new home.
    /// Any failure leaves the feature where it started.
    fn relocate(
        &self,
        id: &str,
        from: &Path,
        to: &Path,
        apply: impl FnOnce(&mut Feature),
    ) -> StoreResult<Feature> {
        let mut feature: Feature = atomic::read_json_opt(&meta_path(from))?
            .ok_or_else(|| StoreError::FeatureNotFound(id.into()))?;

        if to.exists() {
            // Stale directory without metadata; the id is still unique.
            return Err(StoreError::io(
                to,
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, "destination exists"),
            ));
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        fs::rename(from, to).map_err(|e| StoreError::io(from, e))?;

        apply(&mut feature);
        if let Err(e) = atomic::write_json(&meta_path(to), &feature) {
            if let Err(rollback) = fs::rename(to, from) {
                tracing::error!(id = %id, error = %rollback, "failed to roll back feature move");
            }
            return Err(e);
        }
        Ok(feature)
    }
}

/// Feature ids become directory names, so they must be a single plain
/// path component.
fn validate_feature_id(id: &str) -> StoreResult<()> {
    let valid = !id.trim().is_empty()
        && !id.starts_with('.')
        && !id.contains(['/', '\\'])
        && id != layout::CONVERSATIONS_DIR;
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.into()))
    }
}

fn load_features_in(root: &Path) -> StoreResult<Vec<Feature>> {
    let mut features = Vec::new();
    for dir in feature_dirs_in(root)? {
        if let Some(feature) = atomic::read_json_opt::<Feature>(&meta_path(&dir))? {
            features.push(feature);
        }
    }
    features.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(features)
}

/// Subdirectories of `root`, sorted by name.
fn feature_dirs_in(root: &Path) -> StoreResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(root, e)),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| StoreError::io(root, e))?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn sort_conversations(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| (&a.created_at, &a.id).cmp(&(&b.created_at, &b.id)));
}

fn json_files_in(dir: &Path) -> StoreResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(dir, e)),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| StoreError::io(dir, e))?.path();
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        if path.is_file() && is_json && !atomic::is_temp_file(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
