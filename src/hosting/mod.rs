//! Access to the code-hosting service (GitHub through the `gh` CLI).

mod gh;
pub mod process;

pub use gh::GhCli;

use crate::cancel::CancellationToken;
use crate::model::PullRequestRecord;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

static GITHUB_REMOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:git@github\.com:|ssh://git@github\.com/|https?://(?:[^@/]+@)?github\.com/)([^/]+)/([^/]+?)(?:\.git)?/?$",
    )
    .expect("static regex")
});

/// `owner/name` of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    /// Recognizes GitHub SSH and HTTPS remote URLs.
    pub fn from_remote_url(url: &str) -> Option<Self> {
        let caps = GITHUB_REMOTE.captures(url.trim())?;
        Some(Self {
            owner: caps.get(1)?.as_str().to_string(),
            name: caps.get(2)?.as_str().to_string(),
        })
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Whether the listing tool can be used at all on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Ready,
    Missing,
    Unauthenticated,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListError {
    #[error("timed out")]
    Timeout,
    #[error("{0}")]
    Failed(String),
    #[error("interrupted")]
    Cancelled,
}

/// Lists pull requests authored by the operator.
pub trait HostingClient: Send + Sync {
    /// Detects a missing or unauthenticated tool. Called at most once per run.
    fn probe(&self, timeout: Duration, cancel: &CancellationToken) -> ToolStatus;

    fn list_authored(
        &self,
        repo: &RepoSlug,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<PullRequestRecord>, ListError>;
}
