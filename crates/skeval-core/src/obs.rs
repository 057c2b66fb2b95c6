//! Structured lifecycle events for eval runs.
//!
//! This module provides:
//! - Run-scoped tracing spans via the `RunSpan` RAII guard
//! - Emission functions for run, fixture, experiment and repeat milestones
//!
//! Events are emitted at `info!` level (`warn!` for cleanup failures) with an
//! `event` field naming the milestone, so JSON log lines can be filtered on it.

use std::path::Path;

use tracing::{info, warn};

use crate::domain::result::FixtureResult;

/// RAII guard that enters a run-scoped tracing span for the duration of a run.
///
/// ```ignore
/// let _span = RunSpan::enter("baseline");
/// // every event below is tagged with run = "baseline"
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run: &str) -> Self {
        let span = tracing::info_span!("skeval.run", run = %run);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a run is about to schedule `units` fixture prompts.
pub fn emit_run_started(run: &str, agent: &str, units: usize, concurrency: usize) {
    info!(
        event = "eval.run.started",
        run = %run,
        agent = %agent,
        units = units,
        concurrency = concurrency,
    );
}

/// Emit event: one fixture prompt finished.
pub fn emit_fixture_finished(result: &FixtureResult) {
    info!(
        event = "eval.fixture.finished",
        fixture = %result.name,
        suite = %result.suite,
        passed = result.passed,
        skill_check_passed = result.skill_check_passed,
        checks = result.checks.len(),
        duration_ms = result.duration_ms,
        error = result.error.as_deref().unwrap_or(""),
    );
}

/// Emit event: a run finished with its totals.
pub fn emit_run_finished(run: &str, passed: usize, failed: usize, duration_ms: u64) {
    info!(
        event = "eval.run.finished",
        run = %run,
        passed = passed,
        failed = failed,
        duration_ms = duration_ms,
    );
}

/// Emit event: an experiment overlay is about to run.
pub fn emit_experiment_started(experiment: &str, repetition: usize, contents: &[String]) {
    info!(
        event = "eval.experiment.started",
        experiment = %experiment,
        repetition = repetition,
        contents = %contents.join(", "),
    );
}

/// Emit event: a comparison finished and picked its best experiment.
pub fn emit_comparison_finished(name: &str, experiments: usize, best: &str) {
    info!(
        event = "eval.comparison.finished",
        comparison = %name,
        experiments = experiments,
        best = %best,
    );
}

/// Emit event: a repeated run finished with its consistency tally.
pub fn emit_repeat_finished(name: &str, runs: usize, always_pass: usize, flaky: usize, always_fail: usize) {
    info!(
        event = "eval.repeat.finished",
        name = %name,
        runs = runs,
        always_pass = always_pass,
        flaky = flaky,
        always_fail = always_fail,
    );
}

/// Emit event: a scratch directory could not be removed (warning level).
pub fn emit_cleanup_failed(path: &Path, error: &dyn std::fmt::Display) {
    warn!(event = "eval.cleanup_failed", path = %path.display(), error = %error);
}
