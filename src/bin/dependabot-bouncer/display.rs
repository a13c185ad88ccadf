use std::io::{self, IsTerminal, Write};

use anyhow::Result;
use chrono::{DateTime, Utc};
use dependabot_bouncer::{
    BatchSummary, CiState, ClassifiedPr, CloseReport, DisplayMode, RepoReport, describe_duration,
    format_age,
};

const TABLE_HEADERS: &[&str] = &["PR", "CI", "MERGE", "PACKAGE", "POLICY", "TITLE"];
const TITLE_COLUMN_INDEX: usize = TABLE_HEADERS.len() - 1;
const COLUMN_SEPARATOR: &str = "  ";
const TITLE_TRUNCATION_SUFFIX: &str = "...";
const MIN_TITLE_WIDTH_FOR_TRUNCATION: usize = 3;

fn get_terminal_width(mode: DisplayMode) -> usize {
    if mode == DisplayMode::NoWrap || !io::stdout().is_terminal() {
        return usize::MAX;
    }

    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(usize::MAX)
}

fn width_of(cell: &str) -> usize {
    cell.chars().count()
}

fn format_ci_state(state: CiState) -> String {
    let icon = match state {
        CiState::Success => "✓",
        CiState::Failure => "✗",
        CiState::Pending => "…",
    };
    format!("{icon} {state}")
}

fn format_policy(pr: &ClassifiedPr) -> String {
    match &pr.deny_reason {
        Some(_) => format!("SKIPPED ({})", pr.skip_reason()),
        None => "allowed".to_string(),
    }
}

fn pr_to_table_row(pr: &ClassifiedPr) -> Vec<String> {
    let package = if pr.identity.is_empty() {
        "-".to_string()
    } else {
        pr.identity.package_name.clone()
    };

    vec![
        format!("#{}", pr.pr.number),
        format_ci_state(pr.ci_state),
        pr.pr.merge_state.to_string(),
        package,
        format_policy(pr),
        pr.pr.title.clone(),
    ]
}

fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| width_of(h)).collect();

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(width_of(cell));
            }
        }
    }

    widths
}

fn apply_title_truncation(rows: &mut [Vec<String>], widths: &mut [usize], terminal_width: usize) {
    if terminal_width == usize::MAX {
        return;
    }

    let separator_width = COLUMN_SEPARATOR.len() * (widths.len() - 1);
    let non_title_width: usize =
        widths[..TITLE_COLUMN_INDEX].iter().sum::<usize>() + separator_width;

    if non_title_width >= terminal_width {
        return;
    }

    let available_title_width = terminal_width - non_title_width;
    if widths[TITLE_COLUMN_INDEX] <= available_title_width
        || available_title_width <= MIN_TITLE_WIDTH_FOR_TRUNCATION
    {
        return;
    }

    widths[TITLE_COLUMN_INDEX] = available_title_width;
    let keep = available_title_width - TITLE_TRUNCATION_SUFFIX.len();

    for row in rows {
        if let Some(title) = row.get_mut(TITLE_COLUMN_INDEX)
            && width_of(title) > available_title_width
        {
            let truncated: String = title.chars().take(keep).collect();
            *title = format!("{truncated}{TITLE_TRUNCATION_SUFFIX}");
        }
    }
}

fn render_row<W: Write, S: AsRef<str>>(
    cells: &[S],
    widths: &[usize],
    writer: &mut W,
) -> Result<()> {
    for (i, cell) in cells.iter().enumerate() {
        let cell = cell.as_ref();
        if i < cells.len() - 1 {
            let padding = widths[i].saturating_sub(width_of(cell));
            write!(writer, "{cell}{}{COLUMN_SEPARATOR}", " ".repeat(padding))?;
        } else {
            write!(writer, "{cell}")?;
        }
    }
    writeln!(writer)?;
    Ok(())
}

fn render_table_separator<W: Write>(widths: &[usize], writer: &mut W) -> Result<()> {
    let dashes: Vec<String> = widths.iter().map(|&width| "-".repeat(width)).collect();
    writeln!(writer, "{}", dashes.join(COLUMN_SEPARATOR))?;
    Ok(())
}

fn display_repository_header<W: Write>(repo_name: &str, writer: &mut W) -> Result<()> {
    writeln!(writer, "Repository: {repo_name}")?;
    writeln!(writer, "=====================================")?;
    Ok(())
}

fn display_report_table<W: Write>(
    report: &RepoReport,
    terminal_width: usize,
    writer: &mut W,
) -> Result<()> {
    display_repository_header(&report.repo.to_string(), writer)?;

    if report.prs.is_empty() {
        writeln!(writer, "No open update PRs")?;
        return Ok(());
    }

    let mut rows: Vec<Vec<String>> = report.prs.iter().map(pr_to_table_row).collect();
    let mut widths = calculate_column_widths(TABLE_HEADERS, &rows);

    apply_title_truncation(&mut rows, &mut widths, terminal_width);

    render_row(TABLE_HEADERS, &widths, writer)?;
    render_table_separator(&widths, writer)?;
    for row in &rows {
        render_row(row.as_slice(), &widths, writer)?;
    }

    let skipped = report.skipped();
    writeln!(
        writer,
        "\n{} PR(s), {} allowed, {} skipped by policy",
        report.prs.len(),
        report.prs.len() - skipped,
        skipped
    )?;
    Ok(())
}

fn display_check_report_with_width<W: Write>(
    reports: &[RepoReport],
    mode: DisplayMode,
    terminal_width: usize,
    writer: &mut W,
) -> Result<()> {
    if mode == DisplayMode::Quiet {
        for report in reports {
            for pr in &report.prs {
                writeln!(writer, "{}", pr.pr.number)?;
            }
        }
        return Ok(());
    }

    for (i, report) in reports.iter().enumerate() {
        if i > 0 {
            writeln!(writer)?;
        }
        display_report_table(report, terminal_width, writer)?;
    }
    Ok(())
}

/// Prints the check report: one table per repository, or bare PR numbers in
/// quiet mode.
pub fn display_check_report<W: Write>(
    reports: &[RepoReport],
    mode: DisplayMode,
    writer: &mut W,
) -> Result<()> {
    display_check_report_with_width(reports, mode, get_terminal_width(mode), writer)
}

fn display_failures<W: Write>(summary: &BatchSummary, writer: &mut W) -> Result<()> {
    for failure in summary.failures() {
        if let Err(e) = &failure.result {
            writeln!(
                writer,
                "  failed: #{} {} ({}): {:#}",
                failure.number, failure.action, failure.title, e
            )?;
        }
    }
    Ok(())
}

/// Prints what an approve or recreate run did in one repository.
pub fn display_batch_summary<W: Write>(report: &RepoReport, writer: &mut W) -> Result<()> {
    let summary = &report.summary;
    writeln!(
        writer,
        "{}: {} action(s) succeeded, {} failed, {} PR(s) skipped by policy",
        report.repo,
        summary.succeeded(),
        summary.failed(),
        report.skipped()
    )?;
    display_failures(summary, writer)
}

/// Prints the stale PRs found in one repository and the outcome of closing
/// them.
pub fn display_close_report<W: Write>(
    report: &CloseReport,
    dry_run: bool,
    now: DateTime<Utc>,
    writer: &mut W,
) -> Result<()> {
    let older_than = describe_duration(report.older_than);

    if report.stale.is_empty() {
        writeln!(
            writer,
            "{}: no PRs found with label '{}' older than {}",
            report.repo, report.label, older_than
        )?;
        return Ok(());
    }

    writeln!(
        writer,
        "{}: found {} PR(s) with label '{}' older than {}:\n",
        report.repo,
        report.stale.len(),
        report.label,
        older_than
    )?;
    for pr in &report.stale {
        writeln!(writer, "  #{}: {}", pr.number, pr.title)?;
        writeln!(
            writer,
            "       Created: {} (age: {})",
            pr.created_at.format("%Y-%m-%d"),
            format_age(pr.created_at, now)
        )?;
        writeln!(writer, "       {}\n", pr.url)?;
    }

    if dry_run {
        writeln!(writer, "Dry run mode - no PRs were closed")?;
        return Ok(());
    }

    writeln!(
        writer,
        "Closed {} of {} PR(s)",
        report.summary.succeeded(),
        report.stale.len()
    )?;
    display_failures(&report.summary, writer)
}
