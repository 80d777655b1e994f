use super::process::{run_bounded, RunError};
use super::{HostingClient, ListError, RepoSlug, ToolStatus};
use crate::cancel::CancellationToken;
use crate::error::{DevReportError, Result};
use crate::model::PullRequestRecord;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

const LIST_LIMIT: u32 = 100;

/// [`HostingClient`] that shells out to the GitHub CLI.
#[derive(Debug, Clone)]
pub struct GhCli {
    program: PathBuf,
}

impl Default for GhCli {
    fn default() -> Self {
        Self::new("gh")
    }
}

impl GhCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.program)
    }
}

impl HostingClient for GhCli {
    fn probe(&self, timeout: Duration, cancel: &CancellationToken) -> ToolStatus {
        if which::which(&self.program).is_err() {
            return ToolStatus::Missing;
        }

        let mut cmd = self.command();
        cmd.args(["auth", "status"]);
        match run_bounded(cmd, timeout, cancel) {
            Ok(out) if out.status.success() => ToolStatus::Ready,
            Ok(out) => {
                tracing::debug!(stderr = %String::from_utf8_lossy(&out.stderr).trim(), "gh auth status failed");
                ToolStatus::Unauthenticated
            }
            Err(RunError::Spawn(e)) if e.kind() == std::io::ErrorKind::NotFound => ToolStatus::Missing,
            Err(RunError::Timeout(_)) => ToolStatus::TimedOut,
            Err(e) => {
                tracing::debug!(error = %e, "gh auth status could not run");
                ToolStatus::Unauthenticated
            }
        }
    }

    fn list_authored(
        &self,
        repo: &RepoSlug,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<PullRequestRecord>, ListError> {
        let mut cmd = self.command();
        cmd.args(["pr", "list", "--repo"])
            .arg(repo.to_string())
            .args(["--author", "@me", "--state", "all"])
            .args(["--json", "number,createdAt,mergedAt"])
            .args(["--limit", &LIST_LIMIT.to_string()]);

        let out = run_bounded(cmd, timeout, cancel).map_err(|e| match e {
            RunError::Timeout(_) => ListError::Timeout,
            RunError::Cancelled => ListError::Cancelled,
            other => ListError::Failed(other.to_string()),
        })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            return Err(ListError::Failed(stderr));
        }

        parse_pr_list(&out.stdout).map_err(|e| ListError::Failed(format!("Failed to parse gh output: {e}")))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhPullRequest {
    number: u64,
    created_at: String,
    #[serde(default)]
    merged_at: Option<String>,
}

/// Parses `gh pr list --json number,createdAt,mergedAt` output.
pub(crate) fn parse_pr_list(stdout: &[u8]) -> Result<Vec<PullRequestRecord>> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let raw: Vec<GhPullRequest> = serde_json::from_slice(stdout)?;
    raw.into_iter()
        .map(|pr| -> Result<PullRequestRecord> {
            Ok(PullRequestRecord {
                number: pr.number,
                created_at: parse_timestamp(&pr.created_at)?
                    .ok_or_else(|| DevReportError::InvalidDate(format!("PR #{} has no createdAt", pr.number)))?,
                merged_at: match pr.merged_at.as_deref() {
                    Some(s) => parse_timestamp(s)?,
                    None => None,
                },
            })
        })
        .collect()
}

/// Empty strings mean "not set".
fn parse_timestamp(s: &str) -> Result<Option<DateTime<Utc>>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|e| DevReportError::InvalidDate(format!("{s}: {e}")))
}
