//! Local knowledge changes set aside while a pull runs.
//!
//! The dirty files are held in memory and also stashed with git, so nothing
//! is lost if restoring fails. After the pull, files the pull did not touch
//! get their local bytes back verbatim; files it did touch are JSON-unioned
//! with the local version.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use super::git::Git;
use super::resolve::merge_json;
use super::SyncResult;

const STASH_MESSAGE: &str = "lore sync: local knowledge changes";

pub(crate) struct Shelf {
    /// Repository-relative path and local contents; `None` for a local deletion.
    entries: Vec<(String, Option<Vec<u8>>)>,
}

impl Shelf {
    /// Capture and stash the dirty files under `subtree`. Returns `None` if
    /// the subtree is clean.
    pub fn stash(git: &Git, subtree: &str) -> SyncResult<Option<Self>> {
        let dirty = git.dirty_paths(subtree)?;
        if dirty.is_empty() {
            return Ok(None);
        }

        let mut entries = Vec::with_capacity(dirty.len());
        for path in dirty {
            let abs = git.repo().join(&path);
            let contents = match fs::read(&abs) {
                Ok(bytes) => Some(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            };
            entries.push((path, contents));
        }

        git.run_ok(&[
            "stash",
            "push",
            "--include-untracked",
            "-m",
            STASH_MESSAGE,
            "--",
            subtree,
        ])?;
        tracing::info!(files = entries.len(), "local knowledge changes shelved");
        Ok(Some(Self { entries }))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Put the shelved changes back on top of whatever the pull produced.
    /// `changed` lists repository-relative paths the pull modified.
    /// On success the stash entry is dropped; on failure it is kept and a
    /// warning is returned.
    pub fn restore(self, git: &Git, changed: &HashSet<String>) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut failed = false;

        for (path, local) in &self.entries {
            let abs = git.repo().join(path);
            let result = if changed.contains(path) {
                restore_over_remote(&abs, path, local.as_deref(), &mut warnings)
            } else {
                restore_verbatim(&abs, local.as_deref())
            };
            if let Err(e) = result {
                failed = true;
                warnings.push(format!("could not restore {path}: {e}"));
            }
        }

        if failed {
            warnings.push(
                "local knowledge changes are kept in the git stash; recover with `git stash pop`"
                    .to_string(),
            );
        } else if let Err(e) = git.run_ok(&["stash", "drop"]) {
            warnings.push(format!("restored local changes but could not drop stash: {e}"));
        }

        for warning in &warnings {
            tracing::warn!("{warning}");
        }
        warnings
    }
}

fn restore_verbatim(abs: &Path, local: Option<&[u8]>) -> std::io::Result<()> {
    match local {
        Some(bytes) => {
            if let Some(parent) = abs.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(abs, bytes)
        }
        None => match fs::remove_file(abs) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        },
    }
}

/// The pull rewrote this file: union the local version into it, or keep the
/// remote version if either side is not JSON.
fn restore_over_remote(
    abs: &Path,
    path: &str,
    local: Option<&[u8]>,
    warnings: &mut Vec<String>,
) -> std::io::Result<()> {
    let Some(local) = local else {
        warnings.push(format!("{path} was deleted locally but changed remotely; kept remote"));
        return Ok(());
    };

    let remote = match fs::read(abs) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return restore_verbatim(abs, Some(local)),
        Err(e) => return Err(e),
    };

    let parsed = (
        serde_json::from_slice::<serde_json::Value>(&remote),
        serde_json::from_slice::<serde_json::Value>(local),
    );
    match parsed {
        (Ok(remote), Ok(local)) => {
            let merged = merge_json(remote, local);
            let mut text = serde_json::to_string_pretty(&merged)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            text.push('\n');
            fs::write(abs, text)
        }
        _ => {
            warnings.push(format!("{path} changed on both sides and is not JSON; kept remote"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn verbatim_restore_writes_and_deletes() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("dir").join("a.json");
        restore_verbatim(&file, Some(b"[]".as_slice())).unwrap();
        assert_eq!(fs::read(&file).unwrap(), b"[]");
        restore_verbatim(&file, None).unwrap();
        assert!(!file.exists());
        restore_verbatim(&file, None).unwrap();
    }

    #[test]
    fn remote_changes_are_unioned_with_local() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("decisions.json");
        fs::write(&file, r#"[{"id":"remote"}]"#).unwrap();

        let mut warnings = Vec::new();
        restore_over_remote(&file, "decisions.json", Some(br#"[{"id":"local"}]"#.as_slice()), &mut warnings)
            .unwrap();
        let merged: serde_json::Value = serde_json::from_slice(&fs::read(&file).unwrap()).unwrap();
        assert_eq!(merged, serde_json::json!([{"id": "remote"}, {"id": "local"}]));
        assert!(warnings.is_empty());
    }

    #[test]
    fn non_json_keeps_remote() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("config.toml");
        fs::write(&file, "remote = true\n").unwrap();

        let mut warnings = Vec::new();
        restore_over_remote(&file, "config.toml", Some(b"local = true\n".as_slice()), &mut warnings).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "remote = true\n");
        assert_eq!(warnings.len(), 1);
    }
}
