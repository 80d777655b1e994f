//! Author-filtered commit and diff facts for one repository.

use crate::config::normalize_email;
use crate::error::GitQueryError;
use crate::git::HistorySource;
use crate::model::{CommitFact, CommitRecord, RepositoryRef, TimeWindow};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};

/// Commit facts for a single window.
pub fn analyze(
    source: &dyn HistorySource,
    repo: &RepositoryRef,
    window: TimeWindow,
    author_emails: &BTreeSet<String>,
    now: DateTime<Utc>,
) -> Result<CommitFact, GitQueryError> {
    let commits = read_history(source, repo, window.start(now))?;
    Ok(summarize(repo, window, &commits, author_emails, now))
}

/// Commit facts for every window in `windows`, from a single history read.
pub fn analyze_windows(
    source: &dyn HistorySource,
    repo: &RepositoryRef,
    windows: &[TimeWindow],
    author_emails: &BTreeSet<String>,
    now: DateTime<Utc>,
) -> Result<Vec<CommitFact>, GitQueryError> {
    let Some(widest) = TimeWindow::widest(windows) else {
        return Ok(Vec::new());
    };
    let commits = read_history(source, repo, widest.start(now))?;
    Ok(windows
        .iter()
        .map(|&window| summarize(repo, window, &commits, author_emails, now))
        .collect())
}

fn read_history(
    source: &dyn HistorySource,
    repo: &RepositoryRef,
    since: DateTime<Utc>,
) -> Result<Vec<CommitRecord>, GitQueryError> {
    source
        .commits_since(repo.path(), since)
        .map_err(|source| GitQueryError {
            path: repo.path.clone(),
            source,
        })
}

/// Reduces raw commits to the window's totals. `author_emails` must already be normalized.
pub fn summarize(
    repo: &RepositoryRef,
    window: TimeWindow,
    commits: &[CommitRecord],
    author_emails: &BTreeSet<String>,
    now: DateTime<Utc>,
) -> CommitFact {
    let mut fact = CommitFact::zero(repo.clone(), window);
    let mut touched: HashSet<&str> = HashSet::new();

    for commit in commits {
        if !window.contains(now, commit.authored_at) {
            continue;
        }
        if !author_emails.contains(&normalize_email(&commit.author_email)) {
            continue;
        }

        fact.count += 1;
        for file in &commit.files {
            fact.lines_added += file.added_lines;
            fact.lines_removed += file.removed_lines;
            touched.insert(file.path.as_str());
        }
    }

    fact.files_changed = touched.len() as u64;
    fact
}
