//! Markdown and JSON reports for runs, comparisons and repeated runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::checks::truncate_chars;
use crate::compare::{ComparisonResult, ExperimentConsistency};
use crate::domain::result::{EvalRunResult, FixtureResult, SuiteResult};
use crate::repeated::{Consistency, RepeatedRunResult};

/// Agent output longer than this is truncated in run reports.
pub const MAX_AGENT_OUTPUT_CHARS: usize = 5000;

/// Fatal errors longer than this are truncated in repeated-run reports.
pub const MAX_ERROR_CHARS: usize = 200;

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn format_date_for_filename(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d-%H%M%S").to_string()
}

fn escape(text: &str) -> String {
    text.replace('|', "\\|")
}

fn percent(rate: f64) -> String {
    format!("{}%", (rate * 100.0).round() as i64)
}

fn render_fixture(out: &mut String, fixture: &FixtureResult) {
    let status = if fixture.passed { "✅" } else { "❌" };
    out.push_str(&format!("### {} {}\n", status, fixture.name));
    out.push_str(&format!("**Fixture**: `{}`\n", fixture.fixture_dir.display()));
    out.push_str(&format!("**Prompt**: {}\n\n", escape(&fixture.prompt)));

    let skill_status = if fixture.skill_check_passed { "✓" } else { "✗" };
    if !fixture.expected_skills.is_empty() {
        out.push_str(&format!(
            "- **Expected Skills**: {} {}\n",
            fixture.expected_skills.join(", "),
            skill_status
        ));
    }
    if fixture.skills_invoked.is_empty() {
        out.push_str("- **Skills Invoked**: (none detected)\n");
    } else {
        out.push_str(&format!("- **Skills Invoked**: {}\n", fixture.skills_invoked.join(", ")));
    }
    out.push('\n');

    if !fixture.checks.is_empty() {
        out.push_str("- **Checks**:\n");
        out.push_str("  | Check | Status | Details |\n");
        out.push_str("  |-------|--------|---------|\n");
        for check in &fixture.checks {
            out.push_str(&format!(
                "  | {} | {} | {} |\n",
                escape(&check.name),
                if check.passed { "✅" } else { "❌" },
                escape(check.details.as_deref().unwrap_or(""))
            ));
        }
        out.push('\n');
    }

    if let Some(error) = &fixture.error {
        out.push_str(&format!("> **Error**: {}\n\n", escape(error)));
    }

    out.push_str("<details>\n<summary>Agent Output</summary>\n\n```\n");
    out.push_str(&truncate_chars(&fixture.agent_output, MAX_AGENT_OUTPUT_CHARS));
    out.push('\n');
    if fixture.agent_output.chars().count() > MAX_AGENT_OUTPUT_CHARS {
        out.push_str("... (truncated)\n");
    }
    out.push_str("```\n</details>\n\n");
}

fn render_suite(out: &mut String, suite: &SuiteResult) {
    out.push_str(&format!("## {} Suite\n\n", suite.name));
    for fixture in &suite.fixtures {
        render_fixture(out, fixture);
    }
}

/// Render markdown for one eval run.
pub fn render_run_md(result: &EvalRunResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Eval Run: {}\n", result.name));
    out.push_str(&format!("**Date**: {}\n", format_date(&result.date)));
    out.push_str(&format!("**Agent**: {}\n", result.agent));
    out.push_str(&format!("**Fixtures**: {}\n\n", result.total()));

    out.push_str("## Summary\n");
    out.push_str("| Status | Count |\n|--------|-------|\n");
    out.push_str(&format!("| ✅ Passed | {} |\n", result.total_passed));
    out.push_str(&format!("| ❌ Failed | {} |\n\n", result.total_failed));

    for suite in &result.suites {
        render_suite(&mut out, suite);
    }
    out
}

fn render_experiment_details(out: &mut String, run: &EvalRunResult) {
    out.push_str(&format!(
        "<details>\n<summary>{} ({}/{})</summary>\n\n",
        run.name,
        run.total_passed,
        run.total()
    ));
    for suite in &run.suites {
        out.push_str(&format!("### {}\n\n", suite.name));
        for fixture in &suite.fixtures {
            let status = if fixture.passed { "✅" } else { "❌" };
            out.push_str(&format!(
                "- {} **{}**: {}\n",
                status,
                fixture.name,
                escape(&fixture.description)
            ));
            if fixture.passed {
                continue;
            }
            for check in fixture.checks.iter().filter(|c| !c.passed) {
                out.push_str(&format!(
                    "  - ❌ {}: {}\n",
                    escape(&check.name),
                    escape(check.details.as_deref().unwrap_or(""))
                ));
            }
            if let Some(error) = &fixture.error {
                out.push_str(&format!("  - Error: {}\n", escape(error)));
            }
            if !fixture.skill_check_passed {
                let got = if fixture.skills_invoked.is_empty() {
                    "(none)".to_string()
                } else {
                    fixture.skills_invoked.join(", ")
                };
                out.push_str(&format!(
                    "  - Skills: expected {}, got {}\n",
                    fixture.expected_skills.join(", "),
                    got
                ));
            }
        }
        out.push('\n');
    }
    out.push_str("</details>\n\n");
}

/// Render markdown for one comparison: summary, matrix, inconsistent
/// prompts and per-experiment details.
pub fn render_comparison_md(result: &ComparisonResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Experiment Comparison: {}\n", result.name));
    out.push_str(&format!("**Date**: {}\n", format_date(&result.date)));
    out.push_str(&format!("**Agent**: {}\n", result.agent));
    out.push_str(&format!(
        "**Experiments**: {} | **Fixtures**: {}\n\n",
        result.experiments.len(),
        result.fixtures.len()
    ));

    out.push_str("## Summary\n");
    out.push_str("| Experiment | Passed | Failed | Pass Rate |\n");
    out.push_str("|------------|--------|--------|-----------|\n");
    let best = result.summary.best_experiment.as_deref();
    for (name, tally) in result.ranked() {
        let label = if Some(name) == best {
            format!("**{name}**")
        } else {
            name.to_string()
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            label,
            tally.passed,
            tally.failed,
            percent(tally.pass_rate())
        ));
    }
    out.push('\n');

    out.push_str("## Comparison Matrix\n");
    let mut header = vec!["Fixture".to_string()];
    header.extend(result.experiments.iter().cloned());
    out.push_str(&format!("| {} |\n", header.join(" | ")));
    out.push_str(&format!("|{}|\n", vec!["---"; header.len()].join("|")));
    for fixture in &result.fixtures {
        let mut cells = vec![fixture.clone()];
        for experiment in &result.experiments {
            let cell = match result.passed(experiment, fixture) {
                Some(true) => "✅",
                Some(false) => "❌",
                None => "-",
            };
            cells.push(cell.to_string());
        }
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out.push('\n');

    let inconsistent: Vec<_> = result
        .summary
        .by_fixture
        .iter()
        .filter(|(_, b)| !b.passed_experiments.is_empty() && !b.failed_experiments.is_empty())
        .collect();
    if !inconsistent.is_empty() {
        out.push_str("## Inconsistent Results\n\n");
        for (fixture, breakdown) in inconsistent {
            out.push_str(&format!(
                "- **{}**: Passed in {}, Failed in {}\n",
                fixture,
                breakdown.passed_experiments.join(", "),
                breakdown.failed_experiments.join(", ")
            ));
        }
        out.push('\n');
    }

    out.push_str("## Detailed Results\n\n");
    for run in &result.experiment_results {
        render_experiment_details(&mut out, run);
    }
    out
}

/// Render the cross-repetition consistency table.
pub fn render_consistency_md(stats: &[ExperimentConsistency]) -> String {
    let mut out = String::new();
    out.push_str("## Consistency Across Runs\n");
    out.push_str("| Experiment | Perfect Runs | Avg Pass Rate | Pass Rates |\n");
    out.push_str("|------------|--------------|---------------|------------|\n");
    for s in stats {
        let rates: Vec<String> = s.pass_rates.iter().map(|r| format!("{}%", r.round() as i64)).collect();
        out.push_str(&format!(
            "| {} | {} | {}% | {} |\n",
            s.experiment,
            s.consistency(),
            s.avg_pass_rate.round() as i64,
            rates.join(", ")
        ));
    }
    out.push('\n');
    out
}

/// Render markdown for a repeated run.
pub fn render_repeated_md(result: &RepeatedRunResult) -> String {
    let runs = result.runs.len();
    let mut out = String::new();
    out.push_str(&format!("# Eval Report: {} Runs Per Prompt\n", runs));
    out.push_str(&format!("**Date**: {}\n", format_date(&result.date)));
    out.push_str(&format!("**Agent**: {}\n", result.agent));
    out.push_str(&format!("**Runs per prompt**: {}\n", runs));
    out.push_str(&format!("**Total prompts**: {}\n\n", result.prompts.len()));

    out.push_str("## Summary\n\n");
    out.push_str("| Category | Count |\n|----------|-------|\n");
    out.push_str(&format!(
        "| Always pass ({runs}/{runs}) | {} |\n",
        result.count(Consistency::AlwaysPass)
    ));
    out.push_str(&format!("| Flaky (some pass) | {} |\n", result.count(Consistency::Flaky)));
    out.push_str(&format!(
        "| Always fail (0/{runs}) | {} |\n",
        result.count(Consistency::AlwaysFail)
    ));
    out.push_str(&format!("| **Total** | **{}** |\n\n", result.prompts.len()));

    out.push_str("## Pass Rates\n\n");
    out.push_str("| Prompt | Pass Rate | Passed | Failed | Skill Check |\n");
    out.push_str("|--------|-----------|--------|--------|-------------|\n");
    for stats in &result.prompts {
        let marker = match stats.consistency() {
            Consistency::AlwaysPass => "🟢",
            Consistency::Flaky => "🟡",
            Consistency::AlwaysFail => "🔴",
        };
        let skill = if stats.skill_check.total > 0 {
            format!("{}/{}", stats.skill_check.passed, stats.skill_check.total)
        } else {
            "-".to_string()
        };
        out.push_str(&format!(
            "| {} {} | {} | {}/{} | {}/{} | {} |\n",
            marker,
            stats.name,
            percent(stats.pass_rate),
            stats.passed,
            stats.runs,
            stats.failed,
            stats.runs,
            skill
        ));
    }
    out.push('\n');

    let imperfect: Vec<_> = result
        .prompts
        .iter()
        .filter(|p| p.consistency() != Consistency::AlwaysPass)
        .collect();
    if !imperfect.is_empty() {
        out.push_str("## Check-Level Details (Non-Perfect Prompts)\n\n");
        for stats in imperfect {
            out.push_str(&format!("### {} ({}/{} passed)\n\n", stats.name, stats.passed, stats.runs));
            if !stats.check_results.is_empty() {
                out.push_str("| Check | Pass Rate |\n|-------|-----------|\n");
                for (name, tally) in &stats.check_results {
                    let mark = if tally.is_perfect() { "✅" } else { "❌" };
                    out.push_str(&format!("| {} {} | {}/{} |\n", mark, escape(name), tally.passed, tally.total));
                }
                out.push('\n');
            }
            if !stats.errors.is_empty() {
                out.push_str("**Errors:**\n");
                for error in &stats.errors {
                    out.push_str(&format!("- {}\n", truncate_chars(error, MAX_ERROR_CHARS)));
                }
                out.push('\n');
            }
        }
    }

    out.push_str("## Per-Run Results\n\n");
    for (i, run) in result.runs.iter().enumerate() {
        out.push_str(&format!(
            "- **Run {}**: {} passed, {} failed\n",
            i + 1,
            run.total_passed,
            run.total_failed
        ));
    }
    out.push('\n');
    out
}

/// Write `<stem>.md` and `<stem>.json` into `output_dir` and point
/// `latest` at the markdown file. Returns the markdown path.
fn write_report<T: Serialize>(
    output_dir: &Path,
    stem: &str,
    markdown: &str,
    data: &T,
    latest: &str,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).with_context(|| format!("create {:?}", output_dir))?;

    let md_name = format!("{stem}.md");
    let md_path = output_dir.join(&md_name);
    std::fs::write(&md_path, markdown).with_context(|| format!("write {:?}", md_path))?;

    let json_path = output_dir.join(format!("{stem}.json"));
    let content = serde_json::to_string_pretty(data).context("serialize report data")?;
    std::fs::write(&json_path, content).with_context(|| format!("write {:?}", json_path))?;

    link_latest(output_dir, &md_name, latest)?;
    Ok(md_path)
}

#[cfg(unix)]
fn link_latest(output_dir: &Path, target: &str, latest: &str) -> Result<()> {
    let link = output_dir.join(latest);
    if link.symlink_metadata().is_ok() {
        std::fs::remove_file(&link).with_context(|| format!("remove {:?}", link))?;
    }
    std::os::unix::fs::symlink(target, &link).with_context(|| format!("symlink {:?}", link))?;
    Ok(())
}

#[cfg(not(unix))]
fn link_latest(_output_dir: &Path, _target: &str, _latest: &str) -> Result<()> {
    Ok(())
}

/// Write the run report; `latest.md` links to it.
pub fn write_run_report(result: &EvalRunResult, output_dir: &Path) -> Result<PathBuf> {
    let stem = format!("run-{}-{}", format_date_for_filename(&result.date), result.name);
    write_report(output_dir, &stem, &render_run_md(result), result, "latest.md")
}

/// Write a comparison report; `latest-comparison.md` links to it.
pub fn write_comparison_report(result: &ComparisonResult, output_dir: &Path) -> Result<PathBuf> {
    let stem = format!("comparison-{}-{}", format_date_for_filename(&result.date), result.name);
    write_report(
        output_dir,
        &stem,
        &render_comparison_md(result),
        result,
        "latest-comparison.md",
    )
}

/// Write a repeated-run report; `latest-repeated.md` links to it.
pub fn write_repeated_report(result: &RepeatedRunResult, output_dir: &Path) -> Result<PathBuf> {
    let stem = format!(
        "repeated-{}-{}runs",
        format_date_for_filename(&result.date),
        result.runs.len()
    );
    write_report(
        output_dir,
        &stem,
        &render_repeated_md(result),
        result,
        "latest-repeated.md",
    )
}
