//! Conflict classification and the take-remote-then-union merge heuristic.
//!
//! Conflicts inside the knowledge subtree resolve to the remote version;
//! local-only entries come back when the shelved local files are restored
//! through [`merge_json`]. An entry edited on both sides keeps the remote
//! edit and loses the local one.

use serde_json::{Map, Value};

use crate::store::layout::{
    APPEND_ONLY_COLLECTIONS, ARCHIVE_DIR, FEATURES_DIR, INDEX_DIR, KNOWLEDGE_DIR,
};

/// How a conflicted path is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// `config.toml`, `knowledge/project.json`, `index/*.json`.
    Singleton,
    /// Append-only logs, feature metadata and conversations.
    Collection,
    /// Anything else under the knowledge directory.
    Other,
    /// Outside the knowledge directory; never resolved automatically.
    Outside,
}

impl ConflictKind {
    pub fn is_resolvable(&self) -> bool {
        !matches!(self, Self::Outside)
    }
}

/// `path` relative to `subtree`, the knowledge directory relative to the
/// repository root (`"."` when they coincide). `None` outside the subtree.
fn relative<'a>(path: &'a str, subtree: &str) -> Option<&'a str> {
    if subtree == "." {
        return Some(path);
    }
    path.strip_prefix(subtree)?.strip_prefix('/')
}

pub fn classify(path: &str, subtree: &str) -> ConflictKind {
    let Some(rel) = relative(path, subtree) else {
        return ConflictKind::Outside;
    };
    let parts: Vec<&str> = rel.split('/').collect();
    match parts.as_slice() {
        ["config.toml"] => ConflictKind::Singleton,
        [dir, "project.json"] if *dir == KNOWLEDGE_DIR => ConflictKind::Singleton,
        [dir, file] if *dir == INDEX_DIR && file.ends_with(".json") => ConflictKind::Singleton,
        [dir, file] if *dir == KNOWLEDGE_DIR && APPEND_ONLY_COLLECTIONS.contains(file) => {
            ConflictKind::Collection
        }
        [dir, ..] if *dir == FEATURES_DIR || *dir == ARCHIVE_DIR => ConflictKind::Collection,
        _ => ConflictKind::Other,
    }
}

/// Identity of an array element: its `id`, or the edge key for graph edges.
fn identity(value: &Value) -> Option<String> {
    if let Some(id) = value.get("id").and_then(Value::as_str) {
        return Some(format!("id:{id}"));
    }
    let field = |name: &str| value.get(name).and_then(Value::as_str);
    match (
        field("from_type"),
        field("from_id"),
        field("to_type"),
        field("to_id"),
        field("relation"),
    ) {
        (Some(ft), Some(fi), Some(tt), Some(ti), Some(rel)) => {
            Some(format!("edge:{ft}\u{1f}{fi}\u{1f}{tt}\u{1f}{ti}\u{1f}{rel}"))
        }
        _ => None,
    }
}

fn merge_arrays(remote: Vec<Value>, local: Vec<Value>) -> Vec<Value> {
    let mut merged = remote;
    for item in local {
        let present = match identity(&item) {
            Some(key) => merged.iter().any(|m| identity(m).as_deref() == Some(key.as_str())),
            None => merged.contains(&item),
        };
        if !present {
            merged.push(item);
        }
    }
    merged
}

fn merge_objects(mut remote: Map<String, Value>, local: Map<String, Value>) -> Map<String, Value> {
    for (key, local_value) in local {
        match remote.remove(&key) {
            None => {
                remote.insert(key, local_value);
            }
            Some(remote_value) => {
                remote.insert(key, merge_nested(remote_value, local_value));
            }
        }
    }
    remote
}

/// Nested values only union collections; scalars and records take the remote side.
fn merge_nested(remote: Value, local: Value) -> Value {
    match (remote, local) {
        (Value::Array(r), Value::Array(l)) => Value::Array(merge_arrays(r, l)),
        (remote, _) => remote,
    }
}

/// Union of two versions of one JSON document, remote first.
///
/// Arrays keep every remote element and append local elements whose identity
/// (`id`, edge key, or whole value) is not already present. Objects keep
/// remote keys and gain local-only keys; a value present on both sides is
/// unioned only if both are arrays. Anything else is the remote value.
pub fn merge_json(remote: Value, local: Value) -> Value {
    match (remote, local) {
        (Value::Array(r), Value::Array(l)) => Value::Array(merge_arrays(r, l)),
        (Value::Object(r), Value::Object(l)) => Value::Object(merge_objects(r, l)),
        (remote, _) => remote,
    }
}
