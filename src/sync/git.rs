//! Thin wrapper over the `git` command line.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{SyncError, SyncResult};

/// Captured result of one git invocation.
#[derive(Debug)]
pub(crate) struct GitOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs git against one working tree, never prompting for credentials.
pub(crate) struct Git {
    repo: PathBuf,
}

impl Git {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// Fails with [`SyncError::GitUnavailable`] if the binary cannot be spawned.
    pub fn check_available() -> SyncResult<()> {
        match Command::new("git").arg("--version").output() {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => Err(SyncError::GitUnavailable(
                String::from_utf8_lossy(&out.stderr).trim().to_string(),
            )),
            Err(e) => Err(SyncError::GitUnavailable(e.to_string())),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(&self.repo)
            .args(["-c", "core.quotePath=false"])
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    /// Run and capture, whatever the exit status.
    pub fn run(&self, args: &[&str]) -> SyncResult<GitOutput> {
        tracing::debug!(args = ?args, "git");
        let output = self.command(args).output().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SyncError::GitUnavailable(e.to_string()),
            _ => SyncError::Io(e),
        })?;
        Ok(GitOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run and require exit status 0. Returns trimmed stdout.
    pub fn run_ok(&self, args: &[&str]) -> SyncResult<String> {
        let out = self.run(args)?;
        if !out.success() {
            return Err(SyncError::Git {
                command: format!("git {}", args.join(" ")),
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(out.stdout.trim().to_string())
    }

    /// Exit status 0 → `true`, anything else → `false`.
    pub fn succeeds(&self, args: &[&str]) -> SyncResult<bool> {
        Ok(self.run(args)?.success())
    }

    /// Non-empty lines of a successful command's stdout.
    pub fn lines(&self, args: &[&str]) -> SyncResult<Vec<String>> {
        Ok(self
            .run_ok(args)?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    pub fn head(&self) -> SyncResult<String> {
        self.run_ok(&["rev-parse", "HEAD"])
    }

    pub fn current_branch(&self) -> SyncResult<String> {
        self.run_ok(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn has_remote(&self, remote: &str) -> SyncResult<bool> {
        self.succeeds(&["remote", "get-url", remote])
    }

    /// Paths under `pathspec` with uncommitted changes (tracked or untracked),
    /// relative to the repository root.
    pub fn dirty_paths(&self, pathspec: &str) -> SyncResult<Vec<String>> {
        let args = [
            "status",
            "--porcelain",
            "-z",
            "--untracked-files=all",
            "--",
            pathspec,
        ];
        // Untrimmed: the leading status column can be a space.
        let out = self.run(&args)?;
        if !out.success() {
            return Err(SyncError::Git {
                command: format!("git {}", args.join(" ")),
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(parse_porcelain_z(&out.stdout))
    }
}

/// Parse `git status --porcelain -z`. Renames and copies carry their source
/// path as an extra NUL-separated field, which is skipped.
fn parse_porcelain_z(raw: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut fields = raw.split('\0');
    while let Some(entry) = fields.next() {
        if entry.len() < 4 {
            continue;
        }
        let status = &entry[..2];
        paths.push(entry[3..].to_string());
        if status.starts_with('R') || status.starts_with('C') {
            fields.next();
        }
    }
    paths
}
