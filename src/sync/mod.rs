//! Share the knowledge directory between collaborators through git.
//!
//! Only the knowledge subtree is committed, shelved or resolved; the rest of
//! the working tree is never touched except by the merge itself, and a merge
//! that conflicts outside the subtree is aborted. Pull and push fail
//! independently: a failure in one is recorded in the report and the other
//! still runs. The derived index is not synced; callers rebuild it when
//! [`SyncReport::needs_reindex`] is set.

mod git;
pub mod resolve;
mod shelf;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::SyncConfig;
use git::Git;
use resolve::{classify, ConflictKind};
use shelf::Shelf;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{} is not inside a git repository", .0.display())]
    NotARepository(PathBuf),

    #[error("git is not available: {0}")]
    GitUnavailable(String),

    #[error("`{command}` failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub pull: bool,
    pub push: bool,
    pub remote: String,
    /// Defaults to the current branch.
    pub branch: Option<String>,
    /// Commit message for local changes; generated when unset.
    pub message: Option<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            pull: true,
            push: true,
            remote: "origin".into(),
            branch: None,
            message: None,
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            remote: config.remote.clone(),
            branch: config.branch.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    Skipped,
    NoRemote,
    /// Remote knowledge subtree matches the local one.
    UpToDate,
    Merged,
    /// Merged after taking the remote side of these knowledge paths.
    Resolved { paths: Vec<String> },
    /// Conflicts outside the knowledge directory; the merge was aborted.
    Aborted { paths: Vec<String> },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Skipped,
    Pushed { committed: bool },
    /// No remote configured; local changes (if any) were committed.
    CommittedLocally { committed: bool },
    /// The push failed; a commit made beforehand is kept.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub pull: PullOutcome,
    pub push: PushOutcome,
    /// The pull moved HEAD; the local derived index is stale.
    pub needs_reindex: bool,
    pub warnings: Vec<String>,
}

/// Run one sync of `knowledge_dir` within the repository at `repo_root`.
///
/// Only a missing git binary or a directory outside any repository is an
/// error; everything else is reported through the outcomes and warnings.
pub fn sync(repo_root: &Path, knowledge_dir: &Path, opts: &SyncOptions) -> SyncResult<SyncReport> {
    Git::check_available()?;
    let session = Session::open(repo_root, knowledge_dir, opts)?;
    let mut report = SyncReport {
        pull: PullOutcome::Skipped,
        push: PushOutcome::Skipped,
        needs_reindex: false,
        warnings: Vec::new(),
    };

    if opts.pull {
        let pull = session.pull(&mut report);
        let problem = match &pull {
            PullOutcome::Failed(reason) => Some(format!("pull failed: {reason}")),
            PullOutcome::Aborted { paths } => Some(format!(
                "pull aborted: conflicts outside the knowledge directory: {}",
                paths.join(", ")
            )),
            PullOutcome::NoRemote => Some(format!("pull skipped: no remote named {:?}", session.remote)),
            _ => None,
        };
        report.pull = pull;
        if let Some(message) = problem {
            report.warn(message);
        }
    }

    if opts.push {
        let push = session.push();
        if let PushOutcome::Failed(reason) = &push {
            report.warn(format!("push failed: {reason}"));
        }
        report.push = push;
    }

    tracing::info!(
        pull = ?report.pull,
        push = ?report.push,
        needs_reindex = report.needs_reindex,
        "sync finished"
    );
    Ok(report)
}

impl SyncReport {
    fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }
}

/// Resolved repository facts for one invocation.
struct Session<'a> {
    git: Git,
    /// Knowledge directory relative to the repository root, `/`-separated.
    subtree: String,
    remote: &'a str,
    branch: Option<&'a str>,
    message: Option<&'a str>,
}

impl<'a> Session<'a> {
    fn open(repo_root: &Path, knowledge_dir: &Path, opts: &'a SyncOptions) -> SyncResult<Self> {
        let probe = Git::new(repo_root);
        let top = probe
            .run_ok(&["rev-parse", "--show-toplevel"])
            .map_err(|_| SyncError::NotARepository(repo_root.to_path_buf()))?;
        let top = PathBuf::from(top).canonicalize()?;

        let knowledge = knowledge_dir
            .canonicalize()
            .map_err(|_| SyncError::NotARepository(knowledge_dir.to_path_buf()))?;
        let rel = knowledge
            .strip_prefix(&top)
            .map_err(|_| SyncError::NotARepository(knowledge_dir.to_path_buf()))?;

        let subtree = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let subtree = if subtree.is_empty() { ".".to_string() } else { subtree };

        Ok(Self {
            git: Git::new(top),
            subtree,
            remote: &opts.remote,
            branch: opts.branch.as_deref(),
            message: opts.message.as_deref(),
        })
    }

    fn branch(&self) -> SyncResult<String> {
        if let Some(branch) = self.branch {
            return Ok(branch.to_string());
        }
        let current = self.git.current_branch()?;
        if current == "HEAD" {
            return Err(SyncError::Git {
                command: "git rev-parse --abbrev-ref HEAD".into(),
                stderr: "detached HEAD; pass a branch explicitly".into(),
            });
        }
        Ok(current)
    }

    fn pull(&self, report: &mut SyncReport) -> PullOutcome {
        match self.git.has_remote(self.remote) {
            Ok(true) => {}
            Ok(false) => return PullOutcome::NoRemote,
            Err(e) => return PullOutcome::Failed(e.to_string()),
        }

        let before = match self.git.head() {
            Ok(head) => head,
            Err(e) => return PullOutcome::Failed(e.to_string()),
        };
        let shelf = match Shelf::stash(&self.git, &self.subtree) {
            Ok(shelf) => shelf,
            Err(e) => return PullOutcome::Failed(format!("could not shelve local changes: {e}")),
        };

        let outcome = self
            .fetch_and_merge()
            .unwrap_or_else(|e| PullOutcome::Failed(e.to_string()));

        let after = self.git.head().unwrap_or_else(|_| before.clone());
        report.needs_reindex = after != before;

        if let Some(shelf) = shelf {
            let changed = self.changed_between(&before, &after);
            tracing::debug!(files = shelf.len(), changed = changed.len(), "restoring shelf");
            report.warnings.extend(shelf.restore(&self.git, &changed));
        }
        outcome
    }

    fn fetch_and_merge(&self) -> SyncResult<PullOutcome> {
        let branch = self.branch()?;
        self.git.run_ok(&["fetch", self.remote, &branch])?;
        let upstream = format!("{}/{}", self.remote, branch);

        let diff = self
            .git
            .run(&["diff", "--quiet", "HEAD", &upstream, "--", &self.subtree])?;
        match diff.code {
            Some(0) => return Ok(PullOutcome::UpToDate),
            Some(1) => {}
            _ => {
                return Err(SyncError::Git {
                    command: format!("git diff --quiet HEAD {upstream}"),
                    stderr: diff.stderr.trim().to_string(),
                })
            }
        }

        let merge = self.git.run(&["merge", "--no-edit", &upstream])?;
        if merge.success() {
            tracing::info!(upstream = %upstream, "merged remote knowledge");
            return Ok(PullOutcome::Merged);
        }

        let conflicts = self
            .git
            .lines(&["diff", "--name-only", "--diff-filter=U"])?;
        if conflicts.is_empty() {
            let _ = self.git.run(&["merge", "--abort"]);
            return Ok(PullOutcome::Failed(format!(
                "merge failed: {}",
                merge.stderr.trim()
            )));
        }
        self.resolve(conflicts)
    }

    /// Take the remote side of every conflict, unless any lies outside the
    /// knowledge directory, in which case the whole merge is abandoned.
    fn resolve(&self, conflicts: Vec<String>) -> SyncResult<PullOutcome> {
        let outside: Vec<String> = conflicts
            .iter()
            .filter(|p| !classify(p, &self.subtree).is_resolvable())
            .cloned()
            .collect();
        if !outside.is_empty() {
            self.git.run_ok(&["merge", "--abort"])?;
            return Ok(PullOutcome::Aborted { paths: outside });
        }

        for path in &conflicts {
            let kind: ConflictKind = classify(path, &self.subtree);
            tracing::info!(path = %path, kind = ?kind, "taking remote version");
            if self.git.succeeds(&["checkout", "--theirs", "--", path])? {
                self.git.run_ok(&["add", "--", path])?;
            } else {
                // Deleted on the remote side.
                self.git.run_ok(&["rm", "--quiet", "--", path])?;
            }
        }
        self.git.run_ok(&["commit", "--no-edit"])?;
        Ok(PullOutcome::Resolved { paths: conflicts })
    }

    fn changed_between(&self, before: &str, after: &str) -> HashSet<String> {
        if before == after {
            return HashSet::new();
        }
        self.git
            .lines(&["diff", "--name-only", before, after, "--", &self.subtree])
            .map(|lines| lines.into_iter().collect())
            .unwrap_or_default()
    }

    fn push(&self) -> PushOutcome {
        let committed = match self.commit_local() {
            Ok(committed) => committed,
            Err(e) => return PushOutcome::Failed(format!("could not commit local changes: {e}")),
        };

        match self.git.has_remote(self.remote) {
            Ok(true) => {}
            Ok(false) => return PushOutcome::CommittedLocally { committed },
            Err(e) => return PushOutcome::Failed(e.to_string()),
        }

        let result = self
            .branch()
            .and_then(|branch| self.git.run_ok(&["push", self.remote, &branch]));
        match result {
            Ok(_) => {
                tracing::info!(remote = %self.remote, committed, "knowledge pushed");
                PushOutcome::Pushed { committed }
            }
            Err(e) => PushOutcome::Failed(e.to_string()),
        }
    }

    /// Commit the knowledge subtree only. Returns `false` if it was clean.
    fn commit_local(&self) -> SyncResult<bool> {
        let dirty = self.git.dirty_paths(&self.subtree)?;
        if dirty.is_empty() {
            return Ok(false);
        }
        let message = match self.message {
            Some(m) => m.to_string(),
            None => format!("lore: update knowledge ({} files)", dirty.len()),
        };
        self.git.run_ok(&["add", "-A", "--", &self.subtree])?;
        self.git
            .run_ok(&["commit", "--quiet", "-m", &message, "--", &self.subtree])?;
        tracing::info!(files = dirty.len(), "knowledge changes committed");
        Ok(true)
    }
}
