use crate::model::{
    BreakdownRow, CommitOutcome, PullRequestCounts, TimeWindow, WindowFacts, WindowSummary,
};
use std::collections::BTreeMap;

/// Folds per-repository facts into one summary per window in `windows`.
///
/// The result does not depend on the order of `facts`: rows are sorted by
/// repository name (then path) and every requested window gets a summary even
/// when no facts mention it.
pub fn aggregate(windows: &[TimeWindow], facts: &[WindowFacts]) -> Vec<WindowSummary> {
    let mut by_window: BTreeMap<TimeWindow, Vec<&WindowFacts>> = BTreeMap::new();
    for fact in facts {
        by_window.entry(fact.window).or_default().push(fact);
    }

    windows
        .iter()
        .map(|&window| {
            let rows = by_window.get(&window).map(Vec::as_slice).unwrap_or_default();
            summarize_window(window, rows)
        })
        .collect()
}

fn summarize_window(window: TimeWindow, facts: &[&WindowFacts]) -> WindowSummary {
    let mut summary = WindowSummary {
        window,
        commits: 0,
        repos_with_commits: 0,
        prs_opened: 0,
        prs_merged: 0,
        lines_added: 0,
        lines_removed: 0,
        files_changed: 0,
        breakdown: Vec::with_capacity(facts.len()),
    };

    for fact in facts {
        let mut row = BreakdownRow {
            name: fact.repository.name.clone(),
            path: fact.repository.path.clone(),
            commits: 0,
            lines_added: 0,
            lines_removed: 0,
            files_changed: 0,
            prs_opened: 0,
            prs_merged: 0,
            error: None,
            pr_unavailable: None,
        };

        match &fact.commits {
            CommitOutcome::Counted(c) => {
                row.commits = c.count;
                row.lines_added = c.lines_added;
                row.lines_removed = c.lines_removed;
                row.files_changed = c.files_changed;

                summary.commits += c.count;
                summary.lines_added += c.lines_added;
                summary.lines_removed += c.lines_removed;
                summary.files_changed += c.files_changed;
                if c.count > 0 {
                    summary.repos_with_commits += 1;
                }
            }
            CommitOutcome::Errored { reason } => row.error = Some(reason.clone()),
        }

        match &fact.pull_requests.counts {
            PullRequestCounts::Available { opened, merged } => {
                row.prs_opened = *opened;
                row.prs_merged = *merged;
                summary.prs_opened += opened;
                summary.prs_merged += merged;
            }
            PullRequestCounts::Unavailable(reason) => row.pr_unavailable = Some(reason.clone()),
        }

        summary.breakdown.push(row);
    }

    summary
        .breakdown
        .sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommitFact, PullRequestFact, RepositoryRef, Unavailable};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn repo(name: &str) -> RepositoryRef {
        RepositoryRef::new(PathBuf::from(format!("/src/{name}")), None)
    }

    fn counted(name: &str, window: TimeWindow, count: u64, added: u64, removed: u64, files: u64) -> CommitOutcome {
        CommitOutcome::Counted(CommitFact {
            repository: repo(name),
            window,
            count,
            lines_added: added,
            lines_removed: removed,
            files_changed: files,
        })
    }

    fn facts(name: &str, window: TimeWindow, commits: CommitOutcome, prs: PullRequestCounts) -> WindowFacts {
        WindowFacts {
            repository: repo(name),
            window,
            commits,
            pull_requests: PullRequestFact {
                repository: repo(name),
                window,
                counts: prs,
            },
        }
    }

    fn missing_tool() -> PullRequestCounts {
        PullRequestCounts::Unavailable(Unavailable::ToolMissing)
    }

    #[test]
    fn scenario_active_and_idle_repository() {
        let input = vec![
            facts("b", TimeWindow::Day, counted("b", TimeWindow::Day, 0, 0, 0, 0), missing_tool()),
            facts("a", TimeWindow::Day, counted("a", TimeWindow::Day, 3, 50, 10, 2), missing_tool()),
        ];
        let summaries = aggregate(&[TimeWindow::Day], &input);
        assert_eq!(summaries.len(), 1);
        let day = &summaries[0];
        assert_eq!(day.commits, 3);
        assert_eq!((day.lines_added, day.lines_removed), (50, 10));
        assert_eq!(day.files_changed, 2);
        assert_eq!((day.prs_opened, day.prs_merged), (0, 0));
        assert_eq!(day.repos_with_commits, 1);

        let rows: Vec<_> = day
            .breakdown
            .iter()
            .map(|r| (r.name.as_str(), r.commits, r.lines_added, r.lines_removed))
            .collect();
        assert_eq!(rows, vec![("a", 3, 50, 10), ("b", 0, 0, 0)]);
    }

    #[test]
    fn unavailable_prs_do_not_block_commit_totals() {
        let input = vec![
            facts(
                "a",
                TimeWindow::Week,
                counted("a", TimeWindow::Week, 2, 4, 1, 1),
                PullRequestCounts::Available { opened: 2, merged: 1 },
            ),
            facts("b", TimeWindow::Week, counted("b", TimeWindow::Week, 5, 9, 9, 3), missing_tool()),
        ];
        let week = &aggregate(&[TimeWindow::Week], &input)[0];
        assert_eq!(week.commits, 7);
        assert_eq!((week.prs_opened, week.prs_merged), (2, 1));
        assert_eq!(week.breakdown[1].pr_unavailable, Some(Unavailable::ToolMissing));
        assert_eq!(week.breakdown[1].commits, 5);
    }

    #[test]
    fn errored_repository_is_listed_but_not_counted() {
        let input = vec![
            facts(
                "broken",
                TimeWindow::Day,
                CommitOutcome::Errored {
                    reason: "corrupt".into(),
                },
                PullRequestCounts::Available { opened: 1, merged: 0 },
            ),
            facts("ok", TimeWindow::Day, counted("ok", TimeWindow::Day, 1, 1, 0, 1), missing_tool()),
        ];
        let day = &aggregate(&[TimeWindow::Day], &input)[0];
        assert_eq!(day.commits, 1);
        assert_eq!(day.prs_opened, 1);
        assert_eq!(day.breakdown[0].name, "broken");
        assert_eq!(day.breakdown[0].error.as_deref(), Some("corrupt"));
        assert_eq!(day.breakdown[0].prs_opened, 1);
    }

    #[test]
    fn files_summed_across_repositories() {
        let input = vec![
            facts("a", TimeWindow::Month, counted("a", TimeWindow::Month, 1, 1, 0, 4), missing_tool()),
            facts("b", TimeWindow::Month, counted("b", TimeWindow::Month, 1, 1, 0, 4), missing_tool()),
        ];
        assert_eq!(aggregate(&[TimeWindow::Month], &input)[0].files_changed, 8);
    }

    #[test]
    fn every_requested_window_is_summarized() {
        let summaries = aggregate(&TimeWindow::ALL, &[]);
        let windows: Vec<_> = summaries.iter().map(|s| s.window).collect();
        assert_eq!(windows, TimeWindow::ALL.to_vec());
        assert!(summaries.iter().all(|s| s.breakdown.is_empty() && s.is_idle()));
    }

    #[test]
    fn same_name_sorted_by_path() {
        let mut a = facts("x", TimeWindow::Day, counted("x", TimeWindow::Day, 1, 0, 0, 0), missing_tool());
        a.repository = RepositoryRef::new(PathBuf::from("/z/x"), None);
        let b = facts("x", TimeWindow::Day, counted("x", TimeWindow::Day, 2, 0, 0, 0), missing_tool());
        let day = &aggregate(&[TimeWindow::Day], &[a, b])[0];
        let paths: Vec<_> = day.breakdown.iter().map(|r| r.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("/src/x"), PathBuf::from("/z/x")]);
    }

    fn arb_facts() -> impl Strategy<Value = Vec<WindowFacts>> {
        let window = prop_oneof![
            Just(TimeWindow::Day),
            Just(TimeWindow::Week),
            Just(TimeWindow::Month)
        ];
        prop::collection::vec(
            ("[a-e]{1,3}", window, 0u64..20, 0u64..500, 0u64..500, 0u64..10, prop::option::of((0u64..5, 0u64..5))),
            0..24,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (name, window, count, added, removed, files, prs))| {
                    let mut f = facts(
                        &name,
                        window,
                        counted(&name, window, count, added, removed, files),
                        match prs {
                            Some((opened, merged)) => PullRequestCounts::Available { opened, merged },
                            None => missing_tool(),
                        },
                    );
                    f.repository = RepositoryRef::new(PathBuf::from(format!("/src/{i}/{name}")), None);
                    f
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn output_is_independent_of_input_order(input in arb_facts(), seed in any::<u64>()) {
            let mut shuffled = input.clone();
            // Deterministic Fisher-Yates driven by the generated seed.
            let mut state = seed | 1;
            for i in (1..shuffled.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let j = (state % (i as u64 + 1)) as usize;
                shuffled.swap(i, j);
            }
            prop_assert_eq!(
                aggregate(&TimeWindow::ALL, &input),
                aggregate(&TimeWindow::ALL, &shuffled)
            );
        }
    }
}
