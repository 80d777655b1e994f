//! Discovery, parallel per-repository analysis and aggregation into a [`Report`].

use crate::aggregate::aggregate;
use crate::analyze::analyze_windows;
use crate::cancel::CancellationToken;
use crate::config::{Config, ConfigFile};
use crate::discovery::{canonical_root, discover};
use crate::error::PipelineError;
use crate::git::HistorySource;
use crate::hosting::HostingClient;
use crate::model::{CommitOutcome, Report, RepositoryRef, TimeWindow, WindowFacts, SCHEMA_VERSION};
use crate::pulls::PullRequestFetcher;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Everything a run needs, already validated by the front-end.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub root: PathBuf,
    pub windows: Vec<TimeWindow>,
    pub config: ConfigFile,
    /// Fixed "now" for reproducible runs; the wall clock otherwise.
    pub now: Option<DateTime<Utc>>,
    pub jobs: Option<usize>,
    pub pr_timeout: Option<Duration>,
    pub fetch_prs: bool,
    pub progress: bool,
}

impl RunRequest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            windows: TimeWindow::ALL.to_vec(),
            config: ConfigFile::default(),
            now: None,
            jobs: None,
            pr_timeout: None,
            fetch_prs: true,
            progress: false,
        }
    }
}

pub struct Pipeline<'a> {
    history: &'a dyn HistorySource,
    hosting: &'a dyn HostingClient,
    cancel: CancellationToken,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        history: &'a dyn HistorySource,
        hosting: &'a dyn HostingClient,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            history,
            hosting,
            cancel,
        }
    }

    pub fn run(&self, request: RunRequest) -> Result<Report, PipelineError> {
        let now = request.now.unwrap_or_else(Utc::now);
        let windows = normalize_windows(&request.windows);

        let identity = self.history.identity_email();
        let mut config = Config::from_file(request.config, identity.as_deref())?;
        if let Some(timeout) = request.pr_timeout {
            config.pr_timeout = timeout;
        }

        let root = canonical_root(&request.root)?;
        let repos = discover(&root, &config, self.history)?;
        tracing::info!(root = %root.display(), count = repos.len(), "discovered repositories");
        self.bail_if_cancelled()?;

        let mut fetcher = PullRequestFetcher::new(self.hosting, config.pr_timeout, self.cancel.clone());
        if !request.fetch_prs {
            fetcher = fetcher.disabled();
        }

        let jobs = request
            .jobs
            .filter(|&n| n > 0)
            .unwrap_or_else(default_parallelism);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("dev-report-{i}"))
            .build()?;

        let progress = progress_bar(repos.len() as u64, request.progress);
        let (tx, rx) = crossbeam_channel::unbounded::<(PathBuf, Vec<WindowFacts>)>();

        pool.scope(|scope| {
            for repo in &repos {
                let tx = tx.clone();
                let progress = progress.clone();
                let (config, fetcher, windows) = (&config, &fetcher, &windows);
                scope.spawn(move |_| {
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    progress.set_message(repo.name.clone());
                    let facts = self.analyze_repository(repo, windows, config, fetcher, now);
                    let _ = tx.send((repo.path.clone(), facts));
                    progress.inc(1);
                });
            }
        });
        drop(tx);
        progress.finish_and_clear();

        let mut results: HashMap<PathBuf, Vec<WindowFacts>> = rx.try_iter().collect();
        self.bail_if_cancelled()?;
        if results.len() != repos.len() {
            return Err(PipelineError::Cancelled);
        }

        let facts: Vec<WindowFacts> = repos
            .iter()
            .filter_map(|repo| results.remove(&repo.path))
            .flatten()
            .collect();

        Ok(Report {
            version: SCHEMA_VERSION,
            generated_at: now,
            root,
            repositories_scanned: repos.len(),
            warnings: fetcher.warnings(),
            windows: aggregate(&windows, &facts),
        })
    }

    fn analyze_repository(
        &self,
        repo: &RepositoryRef,
        windows: &[TimeWindow],
        config: &Config,
        fetcher: &PullRequestFetcher<'_>,
        now: DateTime<Utc>,
    ) -> Vec<WindowFacts> {
        let commits: Vec<CommitOutcome> =
            match analyze_windows(self.history, repo, windows, &config.author_emails, now) {
                Ok(facts) => facts.into_iter().map(CommitOutcome::Counted).collect(),
                Err(e) => {
                    tracing::debug!(error = %e, "cannot read history");
                    let reason = e.source.to_string();
                    windows
                        .iter()
                        .map(|_| CommitOutcome::Errored {
                            reason: reason.clone(),
                        })
                        .collect()
                }
            };
        let pull_requests = fetcher.fetch_windows(repo, windows, now);

        windows
            .iter()
            .zip(commits)
            .zip(pull_requests)
            .map(|((&window, commits), pull_requests)| WindowFacts {
                repository: repo.clone(),
                window,
                commits,
                pull_requests,
            })
            .collect()
    }

    fn bail_if_cancelled(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Ordered Day, Week, Month with duplicates removed.
fn normalize_windows(windows: &[TimeWindow]) -> Vec<TimeWindow> {
    let mut windows = windows.to_vec();
    windows.sort();
    windows.dedup();
    windows
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} Analyzing repos [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}
