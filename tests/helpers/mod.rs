#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use lore::config::LoreConfig;
use lore::store::types::{NewDecision, NewWarning};
use lore::store::KnowledgeStore;
use tempfile::TempDir;

/// Initialize a fresh knowledge directory under a temp dir.
pub fn test_store() -> (TempDir, KnowledgeStore) {
    let tmp = TempDir::new().unwrap();
    let store = KnowledgeStore::init(tmp.path().join(".lore"), &LoreConfig::default())
        .unwrap()
        .with_author("tester");
    (tmp, store)
}

pub fn decision(content: &str, feature: Option<&str>) -> NewDecision {
    NewDecision {
        content: content.into(),
        reason: "because".into(),
        feature: feature.map(String::from),
        ..Default::default()
    }
}

pub fn warning(content: &str) -> NewWarning {
    NewWarning {
        content: content.into(),
        reason: "seen in production".into(),
        ..Default::default()
    }
}

/// Sync tests drive a real `git`; they return early when it is missing.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir`, panicking on failure. Returns trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn configure_identity(dir: &Path) {
    git(dir, &["config", "user.name", "Lore Test"]);
    git(dir, &["config", "user.email", "lore@example.com"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

/// `git init` on branch `main` with a local identity.
pub fn init_repo(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "--quiet"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    configure_identity(dir);
}

pub fn commit_all(dir: &Path, message: &str) {
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "--quiet", "-m", message]);
}

/// A bare remote plus two clones of it, each with an initialized
/// `.lore/` and a tracked `README.md`.
pub struct SharedRepo {
    _tmp: TempDir,
    pub remote: PathBuf,
    pub alice: PathBuf,
    pub bob: PathBuf,
}

impl SharedRepo {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let remote = tmp.path().join("remote.git");
        let alice = tmp.path().join("alice");
        let bob = tmp.path().join("bob");

        std::fs::create_dir_all(&remote).unwrap();
        git(&remote, &["init", "--quiet", "--bare"]);
        git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        init_repo(&alice);
        std::fs::write(alice.join("README.md"), "# project\n").unwrap();
        KnowledgeStore::init(alice.join(".lore"), &LoreConfig::default()).unwrap();
        commit_all(&alice, "initial");
        git(&alice, &["remote", "add", "origin", remote.to_str().unwrap()]);
        git(&alice, &["push", "--quiet", "origin", "main"]);

        git(
            tmp.path(),
            &["clone", "--quiet", remote.to_str().unwrap(), bob.to_str().unwrap()],
        );
        configure_identity(&bob);

        Self {
            _tmp: tmp,
            remote,
            alice,
            bob,
        }
    }

    pub fn store(&self, repo: &Path, author: &str) -> KnowledgeStore {
        KnowledgeStore::open(repo.join(".lore")).with_author(author)
    }
}
