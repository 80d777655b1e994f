mod repo;

pub use repo::GitRepo;

use crate::error::Result;
use crate::model::CommitRecord;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::process::Command;

/// Read access to version-control history.
///
/// The pipeline only ever talks to history through this trait so analysis can
/// be driven by scripted commits in tests.
pub trait HistorySource: Send + Sync {
    /// Commits reachable from HEAD authored at or after `since`.
    fn commits_since(&self, repo: &Path, since: DateTime<Utc>) -> Result<Vec<CommitRecord>>;

    /// URL of the preferred remote, `origin` first.
    fn remote_url(&self, repo: &Path) -> Option<String>;

    /// The operator's configured `user.email`.
    fn identity_email(&self) -> Option<String>;
}

/// [`HistorySource`] backed by gix for history and the `git` binary for identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalGit;

impl HistorySource for LocalGit {
    fn commits_since(&self, repo: &Path, since: DateTime<Utc>) -> Result<Vec<CommitRecord>> {
        GitRepo::open(repo)?.commits_since(since)
    }

    fn remote_url(&self, repo: &Path) -> Option<String> {
        match GitRepo::open(repo) {
            Ok(repo) => repo.remote_url(),
            Err(e) => {
                tracing::debug!(path = %repo.display(), error = %e, "cannot read remotes");
                None
            }
        }
    }

    fn identity_email(&self) -> Option<String> {
        let output = Command::new("git")
            .args(["config", "--get", "user.email"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let email = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!email.is_empty()).then_some(email)
    }
}
