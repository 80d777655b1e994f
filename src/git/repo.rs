use crate::error::{DevReportError, Result};
use crate::model::{CommitRecord, FileDelta};
use chrono::{DateTime, Utc};
use gix::object::tree::diff::ChangeDetached;
use gix::{ObjectId, Repository};
use similar::{ChangeTag, TextDiff};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

const BINARY_PROBE_BYTES: usize = 8192;

pub struct GitRepo {
    repo: Repository,
    path: PathBuf,
}

impl GitRepo {
    pub fn open(path: &Path) -> Result<Self> {
        let repo = gix::open(path)?;
        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
        Ok(Self { repo, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remote_url(&self) -> Option<String> {
        let names = self.repo.remote_names();
        let name = names
            .iter()
            .find(|n| n.to_string() == "origin")
            .or_else(|| names.iter().next())?;
        let remote = self.repo.find_remote(&**name).ok()?;
        remote
            .url(gix::remote::Direction::Fetch)
            .map(|url| url.to_bstring().to_string())
    }

    /// Walks history from HEAD, keeping commits authored at or after `since`.
    ///
    /// Parents of a commit whose committer time is already before `since` are
    /// not visited.
    pub fn commits_since(&self, since: DateTime<Utc>) -> Result<Vec<CommitRecord>> {
        let mut head = self.repo.head()?;
        if head.is_unborn() {
            return Ok(Vec::new());
        }
        let head_commit = head.peel_to_commit_in_place()?;

        let mut commits = Vec::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut stack: VecDeque<ObjectId> = VecDeque::from([head_commit.id]);

        while let Some(commit_id) = stack.pop_back() {
            if !seen.insert(commit_id) {
                continue;
            }

            let commit = self.repo.find_commit(commit_id)?;
            let committed_at = to_utc(commit.time()?.seconds)?;
            // Parents missing from the object database mark a shallow boundary.
            let parents: Vec<ObjectId> = commit
                .parent_ids()
                .map(|id| id.detach())
                .filter(|id| self.repo.has_object(id))
                .collect();

            let author = commit.author()?;
            let authored_secs = author
                .time()
                .map_err(|e| DevReportError::GitRepo(format!("Bad author time in {commit_id}: {e}")))?
                .seconds;
            let authored_at = to_utc(authored_secs)?;

            if authored_at >= since {
                let files = match parents.first() {
                    Some(parent_id) => self.diff_against_parent(commit_id, *parent_id)?,
                    None => self.diff_root(commit_id)?,
                };
                commits.push(CommitRecord {
                    id: commit_id.to_string(),
                    author_email: author.email.to_string(),
                    authored_at,
                    files,
                });
            }

            if committed_at >= since {
                stack.extend(parents);
            }
        }

        Ok(commits)
    }

    fn diff_against_parent(&self, commit_id: ObjectId, parent_id: ObjectId) -> Result<Vec<FileDelta>> {
        let commit_tree = self.repo.find_commit(commit_id)?.tree()?;
        let parent_tree = self.repo.find_commit(parent_id)?.tree()?;
        let changes: Vec<ChangeDetached> =
            self.repo
                .diff_tree_to_tree(Some(&parent_tree), Some(&commit_tree), None)?;
        Ok(self.collect_deltas(changes))
    }

    fn diff_root(&self, commit_id: ObjectId) -> Result<Vec<FileDelta>> {
        let commit_tree = self.repo.find_commit(commit_id)?.tree()?;
        let changes: Vec<ChangeDetached> = self.repo.diff_tree_to_tree(None, Some(&commit_tree), None)?;
        Ok(self.collect_deltas(changes))
    }

    fn collect_deltas(&self, changes: Vec<ChangeDetached>) -> Vec<FileDelta> {
        changes
            .into_iter()
            .filter_map(|change| self.delta_for(change))
            .collect()
    }

    /// Objects that cannot be loaded (submodule commits, missing blobs) are skipped.
    fn delta_for(&self, change: ChangeDetached) -> Option<FileDelta> {
        match change {
            ChangeDetached::Addition {
                id,
                location,
                entry_mode,
                ..
            } => {
                if entry_mode.is_tree() {
                    return None;
                }
                let obj = self.repo.find_object(id).ok()?;
                Some(FileDelta {
                    path: location.to_string(),
                    added_lines: count_lines(obj.data.as_slice()),
                    removed_lines: 0,
                })
            }
            ChangeDetached::Deletion {
                id,
                location,
                entry_mode,
                ..
            } => {
                if entry_mode.is_tree() {
                    return None;
                }
                let obj = self.repo.find_object(id).ok()?;
                Some(FileDelta {
                    path: location.to_string(),
                    added_lines: 0,
                    removed_lines: count_lines(obj.data.as_slice()),
                })
            }
            ChangeDetached::Modification {
                previous_id,
                id,
                location,
                entry_mode,
                ..
            } => {
                if entry_mode.is_tree() {
                    return None;
                }
                let old_obj = self.repo.find_object(previous_id).ok()?;
                let new_obj = self.repo.find_object(id).ok()?;
                let (added, removed) = line_diff(old_obj.data.as_slice(), new_obj.data.as_slice());
                Some(FileDelta {
                    path: location.to_string(),
                    added_lines: added,
                    removed_lines: removed,
                })
            }
            ChangeDetached::Rewrite {
                source_id,
                id,
                location,
                entry_mode,
                copy,
                ..
            } => {
                if entry_mode.is_tree() {
                    return None;
                }
                let new_obj = self.repo.find_object(id).ok()?;
                let (added, removed) = if copy {
                    (count_lines(new_obj.data.as_slice()), 0)
                } else {
                    let old_obj = self.repo.find_object(source_id).ok()?;
                    line_diff(old_obj.data.as_slice(), new_obj.data.as_slice())
                };
                Some(FileDelta {
                    path: location.to_string(),
                    added_lines: added,
                    removed_lines: removed,
                })
            }
        }
    }
}

fn to_utc(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| DevReportError::InvalidDate(format!("Invalid timestamp: {secs}")))
}

pub(crate) fn is_binary(data: &[u8]) -> bool {
    data.iter().take(BINARY_PROBE_BYTES).any(|&b| b == 0)
}

/// Binary and non-UTF-8 blobs count as zero lines.
pub(crate) fn count_lines(data: &[u8]) -> u64 {
    if is_binary(data) {
        return 0;
    }
    std::str::from_utf8(data)
        .map(|t| t.lines().count() as u64)
        .unwrap_or(0)
}

/// Lines added and removed going from `old` to `new`.
pub(crate) fn line_diff(old: &[u8], new: &[u8]) -> (u64, u64) {
    if is_binary(old) || is_binary(new) {
        return (0, 0);
    }
    let (Ok(old_text), Ok(new_text)) = (std::str::from_utf8(old), std::str::from_utf8(new)) else {
        return (0, 0);
    };

    let diff = TextDiff::from_lines(old_text, new_text);
    let mut added = 0u64;
    let mut removed = 0u64;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }
    (added, removed)
}
