//! Experiment comparison.
//!
//! Runs the full fixture set once per experiment overlay, builds an
//! `experiment → prompt → passed` matrix and picks the best experiment.
//! Across repetitions, [`aggregate_repetitions`] ranks experiments by
//! consistency.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::agent::CodingAgent;
use crate::checks::CheckRegistry;
use crate::config::CompareOptions;
use crate::domain::error::Result;
use crate::domain::result::EvalRunResult;
use crate::experiments::{select_experiments, Experiment};
use crate::obs;
use crate::runner::run_evals;

/// Pass/fail totals of one experiment.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExperimentTally {
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl ExperimentTally {
    /// Fraction of passing prompts; 0.0 when nothing ran.
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }
}

/// Which experiments passed or failed one prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixtureBreakdown {
    pub passed_experiments: Vec<String>,
    pub failed_experiments: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComparisonSummary {
    pub by_experiment: BTreeMap<String, ExperimentTally>,
    pub by_fixture: BTreeMap<String, FixtureBreakdown>,
    /// Highest pass rate; ties go to the first experiment in run order.
    pub best_experiment: Option<String>,
}

/// One named comparison across experiments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonResult {
    pub comparison_id: Uuid,
    pub name: String,
    pub date: DateTime<Utc>,
    pub agent: String,
    /// Experiment names in run order.
    pub experiments: Vec<String>,
    /// Sorted unique prompt names seen in any experiment.
    pub fixtures: Vec<String>,
    pub matrix: BTreeMap<String, BTreeMap<String, bool>>,
    pub experiment_results: Vec<EvalRunResult>,
    pub summary: ComparisonSummary,
}

impl ComparisonResult {
    /// Assemble a comparison from per-experiment runs (named after their
    /// experiment), in run order.
    pub fn from_runs(name: impl Into<String>, agent: impl Into<String>, runs: Vec<EvalRunResult>) -> Self {
        let experiments: Vec<String> = runs.iter().map(|r| r.name.clone()).collect();

        let mut matrix: BTreeMap<String, BTreeMap<String, bool>> = BTreeMap::new();
        let mut fixtures = BTreeSet::new();
        for run in &runs {
            let row = matrix.entry(run.name.clone()).or_default();
            for fixture in run.fixtures() {
                row.insert(fixture.name.clone(), fixture.passed);
                fixtures.insert(fixture.name.clone());
            }
        }
        let fixtures: Vec<String> = fixtures.into_iter().collect();
        let summary = build_summary(&runs, &fixtures, &matrix);

        Self {
            comparison_id: Uuid::new_v4(),
            name: name.into(),
            date: Utc::now(),
            agent: agent.into(),
            experiments,
            fixtures,
            matrix,
            experiment_results: runs,
            summary,
        }
    }

    /// Matrix cell; `None` when the experiment never ran that prompt.
    pub fn passed(&self, experiment: &str, fixture: &str) -> Option<bool> {
        self.matrix.get(experiment)?.get(fixture).copied()
    }

    /// True when the best experiment still had failing prompts.
    pub fn best_has_failures(&self) -> bool {
        self.summary
            .best_experiment
            .as_ref()
            .and_then(|best| self.summary.by_experiment.get(best))
            .is_some_and(|tally| tally.failed > 0)
    }

    /// Experiment names ordered by pass rate, highest first, run order on ties.
    pub fn ranked(&self) -> Vec<(&str, ExperimentTally)> {
        let mut ranked: Vec<(&str, ExperimentTally)> = self
            .experiments
            .iter()
            .filter_map(|e| self.summary.by_experiment.get(e).map(|t| (e.as_str(), *t)))
            .collect();
        ranked.sort_by(|a, b| b.1.pass_rate().total_cmp(&a.1.pass_rate()));
        ranked
    }
}

/// Per-experiment tallies, per-prompt breakdown and best-experiment pick.
///
/// Tallies come from each run's own totals so prompts sharing a name are
/// all counted; the matrix only drives the per-prompt breakdown. Run order
/// fixes iteration order; the best experiment is the first one reaching
/// the strictly highest pass rate.
pub fn build_summary(
    runs: &[EvalRunResult],
    fixtures: &[String],
    matrix: &BTreeMap<String, BTreeMap<String, bool>>,
) -> ComparisonSummary {
    let mut summary = ComparisonSummary::default();
    let mut best: Option<(&str, f64)> = None;

    for run in runs {
        let tally = ExperimentTally {
            passed: run.total_passed,
            failed: run.total_failed,
            total: run.total(),
        };
        let rate = tally.pass_rate();
        if best.map_or(true, |(_, top)| rate > top) {
            best = Some((run.name.as_str(), rate));
        }
        summary.by_experiment.insert(run.name.clone(), tally);
    }

    for fixture in fixtures {
        let mut breakdown = FixtureBreakdown::default();
        for run in runs {
            match matrix.get(&run.name).and_then(|r| r.get(fixture)) {
                Some(true) => breakdown.passed_experiments.push(run.name.clone()),
                Some(false) => breakdown.failed_experiments.push(run.name.clone()),
                None => {}
            }
        }
        summary.by_fixture.insert(fixture.clone(), breakdown);
    }

    summary.best_experiment = best.map(|(name, _)| name.to_string());
    summary
}

/// Run one comparison over every selected experiment.
pub async fn run_comparison(
    agent: Arc<dyn CodingAgent>,
    registry: Arc<CheckRegistry>,
    options: &CompareOptions,
) -> Result<ComparisonResult> {
    let experiments = select_experiments(&options.experiments_dir, options.experiment_filter.as_deref())?;
    compare_once(agent, registry, options, &options.name, &experiments, 1).await
}

/// Run the comparison `options.repetitions` times, back to back.
///
/// With more than one repetition each result is named `<name>-run<n>`, so
/// their reports never share a file name.
pub async fn run_comparisons(
    agent: Arc<dyn CodingAgent>,
    registry: Arc<CheckRegistry>,
    options: &CompareOptions,
) -> Result<Vec<ComparisonResult>> {
    let experiments = select_experiments(&options.experiments_dir, options.experiment_filter.as_deref())?;
    let repetitions = options.repetitions.max(1);
    let mut comparisons = Vec::with_capacity(repetitions);
    for repetition in 1..=repetitions {
        let name = if repetitions > 1 {
            format!("{}-run{}", options.name, repetition)
        } else {
            options.name.clone()
        };
        comparisons.push(
            compare_once(
                Arc::clone(&agent),
                Arc::clone(&registry),
                options,
                &name,
                &experiments,
                repetition,
            )
            .await?,
        );
    }
    Ok(comparisons)
}

#[instrument(skip_all, fields(comparison = %name, repetition = repetition))]
async fn compare_once(
    agent: Arc<dyn CodingAgent>,
    registry: Arc<CheckRegistry>,
    options: &CompareOptions,
    name: &str,
    experiments: &[Experiment],
    repetition: usize,
) -> Result<ComparisonResult> {
    let mut runs = Vec::with_capacity(experiments.len());
    for experiment in experiments {
        obs::emit_experiment_started(&experiment.name, repetition, &experiment.contents());
        let eval = options
            .eval
            .clone()
            .with_name(experiment.name.clone())
            .with_experiment(experiment.clone());
        runs.push(run_evals(Arc::clone(&agent), Arc::clone(&registry), &eval).await?);
    }

    let comparison = ComparisonResult::from_runs(name, agent.name(), runs);
    obs::emit_comparison_finished(
        &comparison.name,
        comparison.experiments.len(),
        comparison.summary.best_experiment.as_deref().unwrap_or(""),
    );
    Ok(comparison)
}

/// Consistency of one experiment across comparison repetitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentConsistency {
    pub experiment: String,
    pub runs: usize,
    pub total_passed: usize,
    pub total_failed: usize,
    /// Repetitions with zero failures.
    pub perfect_runs: usize,
    /// Per-repetition pass rate in percent.
    pub pass_rates: Vec<f64>,
    pub avg_pass_rate: f64,
}

impl ExperimentConsistency {
    /// `perfect/runs`, e.g. `2/3`.
    pub fn consistency(&self) -> String {
        format!("{}/{}", self.perfect_runs, self.runs)
    }
}

/// Rank experiments across repetitions: most perfect runs first, then
/// highest average pass rate. Equal entries keep first-seen order.
pub fn aggregate_repetitions(comparisons: &[ComparisonResult]) -> Vec<ExperimentConsistency> {
    let mut stats: Vec<ExperimentConsistency> = Vec::new();
    for comparison in comparisons {
        for experiment in &comparison.experiments {
            let Some(tally) = comparison.summary.by_experiment.get(experiment) else {
                continue;
            };
            let idx = match stats.iter().position(|s| &s.experiment == experiment) {
                Some(idx) => idx,
                None => {
                    stats.push(ExperimentConsistency {
                        experiment: experiment.clone(),
                        runs: 0,
                        total_passed: 0,
                        total_failed: 0,
                        perfect_runs: 0,
                        pass_rates: Vec::new(),
                        avg_pass_rate: 0.0,
                    });
                    stats.len() - 1
                }
            };
            let entry = &mut stats[idx];
            entry.runs += 1;
            entry.total_passed += tally.passed;
            entry.total_failed += tally.failed;
            if tally.failed == 0 {
                entry.perfect_runs += 1;
            }
            entry.pass_rates.push(tally.pass_rate() * 100.0);
        }
    }

    for entry in &mut stats {
        entry.avg_pass_rate = if entry.pass_rates.is_empty() {
            0.0
        } else {
            entry.pass_rates.iter().sum::<f64>() / entry.pass_rates.len() as f64
        };
    }

    stats.sort_by(|a, b| {
        b.perfect_runs
            .cmp(&a.perfect_runs)
            .then_with(|| b.avg_pass_rate.total_cmp(&a.avg_pass_rate))
    });
    stats
}
