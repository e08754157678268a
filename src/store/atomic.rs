//! Whole-document JSON persistence with temp-file-then-rename writes.
//!
//! A reader either sees the previous complete file or the new complete file.
//! [`PendingWrite`] exposes the two phases separately so a crash between
//! them can be simulated.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::Salvaged;
use crate::error::{StoreError, StoreResult};

/// Suffix of staged files. Directory scans must skip anything ending in it.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Read a JSON document, treating a missing file as `T::default()`.
pub fn read_json<T: DeserializeOwned + Default>(path: &Path) -> StoreResult<T> {
    Ok(read_json_opt(path)?.unwrap_or_default())
}

/// Read a JSON document, returning `None` if the file does not exist.
pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Read a JSON list (or a map keyed by id or path) one record at a time.
///
/// Records that fail to decode are reported in [`Salvaged::skipped`] instead
/// of failing the whole document. A missing file is empty; a document that
/// is neither a list nor a map is a decode error.
pub fn read_json_records<T: DeserializeOwned>(path: &Path) -> StoreResult<Salvaged<T>> {
    let Some(document) = read_json_opt::<serde_json::Value>(path)? else {
        return Ok(Salvaged::default());
    };
    let entries: Vec<(String, serde_json::Value)> = match document {
        serde_json::Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, value)| (format!("[{i}]"), value))
            .collect(),
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| (format!("[{key:?}]"), value))
            .collect(),
        other => {
            return serde_json::from_value(other)
                .map(Salvaged::complete)
                .map_err(|source| StoreError::Decode {
                    path: path.to_path_buf(),
                    source,
                })
        }
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut salvaged = Salvaged::default();
    for (position, value) in entries {
        let id = value
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map(|id| format!(" ({id})"))
            .unwrap_or_default();
        match serde_json::from_value(value) {
            Ok(item) => salvaged.items.push(item),
            Err(e) => salvaged.skipped.push(format!("{file_name}{position}{id}: {e}")),
        }
    }
    Ok(salvaged)
}

/// Serialize `value` and atomically replace `path` with it.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    stage_json(path, value)?.commit()
}

/// Phase one: write the full document to a sibling temp file and fsync it.
pub fn stage_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<PendingWrite> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;

    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];
    let tmp = parent.join(format!(".{file_name}.{suffix}{TEMP_SUFFIX}"));

    let mut file = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
    file.write_all(&bytes).map_err(|e| StoreError::io(&tmp, e))?;
    file.sync_all().map_err(|e| StoreError::io(&tmp, e))?;

    Ok(PendingWrite {
        tmp,
        target: path.to_path_buf(),
        committed: false,
    })
}

/// A fully written temp file waiting to be renamed over its target.
///
/// Dropping an uncommitted write removes the temp file.
#[derive(Debug)]
pub struct PendingWrite {
    tmp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl PendingWrite {
    pub fn temp_path(&self) -> &Path {
        &self.tmp
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Phase two: rename the temp file into place.
    pub fn commit(mut self) -> StoreResult<()> {
        fs::rename(&self.tmp, &self.target).map_err(|e| StoreError::io(&self.target, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PendingWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().ends_with(TEMP_SUFFIX))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_reads_as_default() {
        let tmp = TempDir::new().unwrap();
        let items: Vec<String> = read_json(&tmp.path().join("absent.json")).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn write_then_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("items.json");
        write_json(&path, &vec!["a", "b"]).unwrap();
        let items: Vec<String> = read_json(&path).unwrap();
        assert_eq!(items, vec!["a", "b"]);
    }

    #[test]
    fn malformed_file_is_a_decode_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, b"[{\"id\": ").unwrap();
        let err = read_json::<Vec<String>>(&path).unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Entry {
        id: String,
        n: u32,
    }

    #[test]
    fn bad_records_are_skipped_individually() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("entries.json");
        std::fs::write(
            &path,
            r#"[{"id": "a", "n": 1}, {"id": "bad"}, {"id": "c", "n": 3}]"#,
        )
        .unwrap();

        let salvaged: Salvaged<Entry> = read_json_records(&path).unwrap();
        let ids: Vec<&str> = salvaged.items.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(salvaged.skipped.len(), 1);
        assert!(salvaged.skipped[0].starts_with("entries.json[1] (bad): "));
    }

    #[test]
    fn records_read_from_map_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("map.json");
        std::fs::write(&path, r#"{"x": {"id": "x", "n": 1}, "y": 7}"#).unwrap();

        let salvaged: Salvaged<Entry> = read_json_records(&path).unwrap();
        assert_eq!(salvaged.items, vec![Entry { id: "x".into(), n: 1 }]);
        assert!(salvaged.skipped[0].starts_with("map.json[\"y\"]"));

        assert!(read_json_records::<Entry>(&tmp.path().join("absent.json"))
            .unwrap()
            .is_empty());
        std::fs::write(&path, "42").unwrap();
        assert!(matches!(
            read_json_records::<Entry>(&path),
            Err(StoreError::Decode { .. })
        ));
    }

    #[test]
    fn crash_before_rename_leaves_previous_snapshot() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("items.json");
        write_json(&path, &vec!["old"]).unwrap();

        let pending = stage_json(&path, &vec!["old", "new"]).unwrap();
        let staged = pending.temp_path().to_path_buf();
        assert!(staged.exists());
        // Simulated crash: the process dies before commit, nothing cleans up.
        std::mem::forget(pending);

        let items: Vec<String> = read_json(&path).unwrap();
        assert_eq!(items, vec!["old"]);
        assert!(is_temp_file(&staged));
    }

    #[test]
    fn torn_temp_file_never_reaches_target() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("items.json");
        write_json(&path, &vec!["complete"]).unwrap();

        // A half-written staging file from some crashed writer.
        std::fs::write(tmp.path().join(".items.json.deadbeef.tmp"), b"[\"compl").unwrap();

        let items: Vec<String> = read_json(&path).unwrap();
        assert_eq!(items, vec!["complete"]);
    }

    #[test]
    fn dropped_pending_write_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("items.json");
        let pending = stage_json(&path, &vec!["x"]).unwrap();
        let staged = pending.temp_path().to_path_buf();
        drop(pending);
        assert!(!staged.exists());
        assert!(!path.exists());
    }
}
