//! Pull-request facts per repository, with soft degradation when `gh` cannot be used.

use crate::cancel::CancellationToken;
use crate::hosting::{HostingClient, ListError, RepoSlug, ToolStatus};
use crate::model::{
    PullRequestCounts, PullRequestFact, PullRequestRecord, RepositoryRef, TimeWindow, Unavailable,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

/// Collects run-level warnings, at most one per category.
#[derive(Debug, Default)]
pub struct RunWarnings {
    seen: Mutex<BTreeSet<&'static str>>,
}

impl RunWarnings {
    /// Records `reason`'s warning. Returns `true` the first time a category is seen.
    pub fn note(&self, reason: &Unavailable) -> bool {
        let Some(message) = reason.warning() else {
            return false;
        };
        let first = match self.seen.lock() {
            Ok(mut seen) => seen.insert(message),
            Err(poisoned) => poisoned.into_inner().insert(message),
        };
        // Shown to the operator through the report, not the log.
        if first {
            tracing::info!("{message}");
        }
        first
    }

    /// Sorted so the report does not depend on which worker hit a problem first.
    pub fn messages(&self) -> Vec<String> {
        let seen = match self.seen.lock() {
            Ok(seen) => seen,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.iter().map(|m| m.to_string()).collect()
    }
}

pub struct PullRequestFetcher<'a> {
    client: &'a dyn HostingClient,
    timeout: Duration,
    cancel: CancellationToken,
    enabled: bool,
    tool: OnceLock<ToolStatus>,
    warnings: RunWarnings,
}

impl<'a> PullRequestFetcher<'a> {
    pub fn new(client: &'a dyn HostingClient, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            client,
            timeout,
            cancel,
            enabled: true,
            tool: OnceLock::new(),
            warnings: RunWarnings::default(),
        }
    }

    /// Every fact becomes `unavailable(Disabled)` and the tool is never invoked.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.messages()
    }

    pub fn fetch(&self, repo: &RepositoryRef, window: TimeWindow, now: DateTime<Utc>) -> PullRequestFact {
        self.fetch_windows(repo, &[window], now)
            .pop()
            .unwrap_or_else(|| PullRequestFact::unavailable(repo.clone(), window, Unavailable::Disabled))
    }

    /// Lists once and partitions the result for each window.
    pub fn fetch_windows(
        &self,
        repo: &RepositoryRef,
        windows: &[TimeWindow],
        now: DateTime<Utc>,
    ) -> Vec<PullRequestFact> {
        match self.list(repo) {
            Ok(prs) => windows
                .iter()
                .map(|&window| PullRequestFact {
                    repository: repo.clone(),
                    window,
                    counts: count_in_window(&prs, window, now),
                })
                .collect(),
            Err(reason) => {
                if !self.cancel.is_cancelled() {
                    self.warnings.note(&reason);
                }
                windows
                    .iter()
                    .map(|&window| PullRequestFact::unavailable(repo.clone(), window, reason.clone()))
                    .collect()
            }
        }
    }

    fn list(&self, repo: &RepositoryRef) -> Result<Vec<PullRequestRecord>, Unavailable> {
        if !self.enabled {
            return Err(Unavailable::Disabled);
        }
        let slug = repo
            .remote_url
            .as_deref()
            .and_then(RepoSlug::from_remote_url)
            .ok_or(Unavailable::NoRemote)?;

        match self.tool_status() {
            ToolStatus::Ready => {}
            ToolStatus::Missing => return Err(Unavailable::ToolMissing),
            ToolStatus::Unauthenticated => return Err(Unavailable::Unauthenticated),
            ToolStatus::TimedOut => return Err(Unavailable::ToolTimeout),
        }

        tracing::debug!(repo = %slug, "listing pull requests");
        self.client
            .list_authored(&slug, self.timeout, &self.cancel)
            .map_err(|e| match e {
                ListError::Timeout => Unavailable::ToolTimeout,
                ListError::Failed(msg) => Unavailable::QueryFailed(msg),
                ListError::Cancelled => Unavailable::QueryFailed("interrupted".to_string()),
            })
    }

    /// Probed by the first worker that needs it; everyone else waits for and reuses the answer.
    fn tool_status(&self) -> ToolStatus {
        *self
            .tool
            .get_or_init(|| self.client.probe(self.timeout, &self.cancel))
    }
}

fn count_in_window(prs: &[PullRequestRecord], window: TimeWindow, now: DateTime<Utc>) -> PullRequestCounts {
    let opened = prs
        .iter()
        .filter(|pr| window.contains(now, pr.created_at))
        .count() as u64;
    let merged = prs
        .iter()
        .filter(|pr| pr.merged_at.is_some_and(|at| window.contains(now, at)))
        .count() as u64;
    PullRequestCounts::Available { opened, merged }
}
