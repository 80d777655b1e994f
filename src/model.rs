use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 1;

/// A discovered repository. Identity is the canonical path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub path: PathBuf,
    pub name: String,
    pub remote_url: Option<String>,
}

impl RepositoryRef {
    pub fn new(path: PathBuf, remote_url: Option<String>) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            path,
            name,
            remote_url,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Day,
    Week,
    Month,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 3] = [TimeWindow::Day, TimeWindow::Week, TimeWindow::Month];

    pub fn duration(self) -> Duration {
        match self {
            TimeWindow::Day => Duration::hours(24),
            TimeWindow::Week => Duration::days(7),
            TimeWindow::Month => Duration::days(30),
        }
    }

    /// First instant that still belongs to the window ending at `now`.
    pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }

    /// Inclusive on both ends.
    pub fn contains(self, now: DateTime<Utc>, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start(now) && timestamp <= now
    }

    pub fn title(self) -> &'static str {
        match self {
            TimeWindow::Day => "Last 24 Hours",
            TimeWindow::Week => "Last 7 Days",
            TimeWindow::Month => "Last 30 Days",
        }
    }

    /// The widest of `windows`, if any.
    pub fn widest(windows: &[TimeWindow]) -> Option<TimeWindow> {
        windows.iter().copied().max_by_key(|w| w.duration())
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeWindow::Day => "daily",
            TimeWindow::Week => "weekly",
            TimeWindow::Month => "monthly",
        };
        f.write_str(s)
    }
}

/// One commit as read from history, already reduced to what the analyzer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub id: String,
    pub author_email: String,
    pub authored_at: DateTime<Utc>,
    pub files: Vec<FileDelta>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDelta {
    pub path: String,
    pub added_lines: u64,
    pub removed_lines: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFact {
    pub repository: RepositoryRef,
    pub window: TimeWindow,
    pub count: u64,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub files_changed: u64,
}

impl CommitFact {
    pub fn zero(repository: RepositoryRef, window: TimeWindow) -> Self {
        Self {
            repository,
            window,
            count: 0,
            lines_added: 0,
            lines_removed: 0,
            files_changed: 0,
        }
    }
}

/// Commit facts for one (repository, window), or the reason history was unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommitOutcome {
    Counted(CommitFact),
    Errored { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum Unavailable {
    NoRemote,
    ToolMissing,
    Unauthenticated,
    ToolTimeout,
    QueryFailed(String),
    Disabled,
}

impl Unavailable {
    /// Warning shown once per run for this category, if it warrants one.
    pub fn warning(&self) -> Option<&'static str> {
        match self {
            Unavailable::NoRemote | Unavailable::Disabled => None,
            Unavailable::ToolMissing => Some("gh CLI not installed - PR stats will be skipped"),
            Unavailable::Unauthenticated => {
                Some("gh CLI not authenticated - PR stats will be skipped (run `gh auth login`)")
            }
            Unavailable::ToolTimeout => Some("gh CLI timed out - PR stats incomplete for some repositories"),
            Unavailable::QueryFailed(_) => Some("gh CLI query failed - PR stats incomplete for some repositories"),
        }
    }
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::NoRemote => f.write_str("no GitHub remote"),
            Unavailable::ToolMissing => f.write_str("gh not installed"),
            Unavailable::Unauthenticated => f.write_str("gh not authenticated"),
            Unavailable::ToolTimeout => f.write_str("gh timed out"),
            Unavailable::QueryFailed(msg) => write!(f, "gh error: {msg}"),
            Unavailable::Disabled => f.write_str("disabled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PullRequestCounts {
    Available { opened: u64, merged: u64 },
    Unavailable(Unavailable),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestFact {
    pub repository: RepositoryRef,
    pub window: TimeWindow,
    pub counts: PullRequestCounts,
}

impl PullRequestFact {
    pub fn unavailable(repository: RepositoryRef, window: TimeWindow, reason: Unavailable) -> Self {
        Self {
            repository,
            window,
            counts: PullRequestCounts::Unavailable(reason),
        }
    }

    pub fn unavailable_reason(&self) -> Option<&Unavailable> {
        match &self.counts {
            PullRequestCounts::Unavailable(reason) => Some(reason),
            PullRequestCounts::Available { .. } => None,
        }
    }
}

/// A pull request as listed by the hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRecord {
    pub number: u64,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

/// Everything learned about one repository for one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFacts {
    pub repository: RepositoryRef,
    pub window: TimeWindow,
    pub commits: CommitOutcome,
    pub pull_requests: PullRequestFact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownRow {
    pub name: String,
    pub path: PathBuf,
    pub commits: u64,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub files_changed: u64,
    pub prs_opened: u64,
    pub prs_merged: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_unavailable: Option<Unavailable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub window: TimeWindow,
    pub commits: u64,
    pub repos_with_commits: u64,
    pub prs_opened: u64,
    pub prs_merged: u64,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub files_changed: u64,
    pub breakdown: Vec<BreakdownRow>,
}

impl WindowSummary {
    pub fn is_idle(&self) -> bool {
        self.commits == 0 && self.prs_opened == 0 && self.prs_merged == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub root: PathBuf,
    pub repositories_scanned: usize,
    pub warnings: Vec<String>,
    pub windows: Vec<WindowSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_bounds_are_inclusive() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let start = TimeWindow::Day.start(now);
        assert!(TimeWindow::Day.contains(now, start));
        assert!(TimeWindow::Day.contains(now, now));
        assert!(!TimeWindow::Day.contains(now, start - Duration::nanoseconds(1)));
        assert!(!TimeWindow::Day.contains(now, now + Duration::nanoseconds(1)));
    }

    #[test]
    fn widest_window_is_month() {
        assert_eq!(TimeWindow::widest(&TimeWindow::ALL), Some(TimeWindow::Month));
        assert_eq!(TimeWindow::widest(&[TimeWindow::Day]), Some(TimeWindow::Day));
        assert_eq!(TimeWindow::widest(&[]), None);
    }

    #[test]
    fn repository_name_is_last_component() {
        let repo = RepositoryRef::new(PathBuf::from("/home/me/work/api"), None);
        assert_eq!(repo.name, "api");
    }
}
