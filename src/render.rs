use crate::model::{BreakdownRow, Report, WindowSummary};
use console::style;
use std::io::{self, Write};

const RULE_WIDTH: usize = 60;

pub fn render_json<W: Write>(report: &Report, out: &mut W) -> anyhow::Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(report)?)?;
    Ok(())
}

pub fn render_text<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "{} - Generated {}",
        style("Dev Report").magenta().bold(),
        style(report.generated_at.format("%Y-%m-%d %H:%M UTC")).dim()
    )?;
    writeln!(
        out,
        "{}",
        style(format!(
            "Scanned {} repositories under {}",
            fmt_count(report.repositories_scanned as u64),
            report.root.display()
        ))
        .dim()
    )?;

    for warning in &report.warnings {
        writeln!(out, "{} {}", style("Warning:").yellow(), warning)?;
    }

    for summary in &report.windows {
        render_window(summary, out)?;
    }
    writeln!(out)?;
    Ok(())
}

fn render_window<W: Write>(summary: &WindowSummary, out: &mut W) -> io::Result<()> {
    let title = format!(" {} ", summary.window.title());
    let side = RULE_WIDTH.saturating_sub(title.len()) / 2;
    writeln!(out)?;
    writeln!(
        out,
        "{}{}{}",
        style("─".repeat(side)).cyan(),
        style(title).cyan().bold(),
        style("─".repeat(side)).cyan()
    )?;
    writeln!(out)?;

    let errored: Vec<&BreakdownRow> = summary.breakdown.iter().filter(|r| r.error.is_some()).collect();
    if summary.is_idle() && errored.is_empty() {
        writeln!(out, "{}", style("No activity").dim())?;
        return Ok(());
    }

    let mut line = format!("{} {}", style("Commits:").bold(), fmt_count(summary.commits));
    if summary.repos_with_commits > 0 {
        line.push_str(&format!(" across {} repo(s)", summary.repos_with_commits));
    }
    line.push_str(&format!(
        "  |  {} {}  |  {} {}",
        style("PRs Opened:").bold(),
        fmt_count(summary.prs_opened),
        style("PRs Merged:").bold(),
        fmt_count(summary.prs_merged)
    ));
    writeln!(out, "{line}")?;

    if summary.lines_added > 0 || summary.lines_removed > 0 {
        writeln!(
            out,
            "{} {}  |  {} {}",
            style("Lines:").bold(),
            fmt_lines(summary.lines_added, summary.lines_removed, 0),
            style("Files:").bold(),
            fmt_count(summary.files_changed)
        )?;
    }

    let active: Vec<&BreakdownRow> = summary
        .breakdown
        .iter()
        .filter(|r| r.error.is_none() && has_activity(r))
        .collect();
    if !active.is_empty() || !errored.is_empty() {
        writeln!(out)?;
    }

    let name_width = active
        .iter()
        .chain(errored.iter())
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0);
    let lines_width = active
        .iter()
        .map(|r| plain_lines(r.lines_added, r.lines_removed).len())
        .max()
        .unwrap_or(0);

    for row in &active {
        writeln!(
            out,
            "{}  {:>8}  {}",
            style(format!("{:<name_width$}", row.name)).cyan(),
            format!("{} commits", fmt_count(row.commits)),
            fmt_lines(row.lines_added, row.lines_removed, lines_width)
        )?;
    }
    for row in &errored {
        writeln!(
            out,
            "{}  {} {}",
            style(format!("{:<name_width$}", row.name)).cyan(),
            style("error:").red(),
            row.error.as_deref().unwrap_or_default()
        )?;
    }

    let idle = summary
        .breakdown
        .iter()
        .filter(|r| r.error.is_none() && !has_activity(r))
        .count();
    if idle > 0 {
        writeln!(out, "{}", style(format!("{idle} repo(s) with no activity")).dim())?;
    }
    Ok(())
}

fn has_activity(row: &BreakdownRow) -> bool {
    row.commits > 0 || row.prs_opened > 0 || row.prs_merged > 0
}

/// `1234567` → `1,234,567`.
pub fn fmt_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn plain_lines(added: u64, removed: u64) -> String {
    format!("+{} / -{}", fmt_count(added), fmt_count(removed))
}

/// Right-aligned to `width` visible characters.
fn fmt_lines(added: u64, removed: u64, width: usize) -> String {
    let pad = width.saturating_sub(plain_lines(added, removed).len());
    format!(
        "{}{} / {}",
        " ".repeat(pad),
        style(format!("+{}", fmt_count(added))).green(),
        style(format!("-{}", fmt_count(removed))).red()
    )
}
