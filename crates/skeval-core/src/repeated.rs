//! Repeated runs and per-prompt consistency statistics.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::CodingAgent;
use crate::checks::CheckRegistry;
use crate::config::EvalOptions;
use crate::domain::error::Result;
use crate::domain::result::EvalRunResult;
use crate::obs;
use crate::runner::run_evals;

/// Default number of repetitions for `repeat`.
pub const DEFAULT_RUNS: usize = 3;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tally {
    pub passed: usize,
    pub total: usize,
}

impl Tally {
    fn record(&mut self, passed: bool) {
        self.total += 1;
        if passed {
            self.passed += 1;
        }
    }

    pub fn is_perfect(&self) -> bool {
        self.passed == self.total
    }
}

/// How a prompt behaved across repetitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Consistency {
    AlwaysPass,
    Flaky,
    AlwaysFail,
}

/// Per-prompt statistics across repetitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptStats {
    pub name: String,
    pub description: String,
    pub runs: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    /// Per-check tallies in first-seen order.
    pub check_results: Vec<(String, Tally)>,
    pub skill_check: Tally,
    pub errors: Vec<String>,
}

impl PromptStats {
    fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            runs: 0,
            passed: 0,
            failed: 0,
            pass_rate: 0.0,
            check_results: Vec::new(),
            skill_check: Tally::default(),
            errors: Vec::new(),
        }
    }

    pub fn consistency(&self) -> Consistency {
        if self.runs > 0 && self.passed == self.runs {
            Consistency::AlwaysPass
        } else if self.passed == 0 {
            Consistency::AlwaysFail
        } else {
            Consistency::Flaky
        }
    }

    fn check_tally(&mut self, name: &str) -> &mut Tally {
        let idx = match self.check_results.iter().position(|(n, _)| n == name) {
            Some(idx) => idx,
            None => {
                self.check_results.push((name.to_string(), Tally::default()));
                self.check_results.len() - 1
            }
        };
        &mut self.check_results[idx].1
    }
}

/// The same fixture set run several times.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepeatedRunResult {
    pub repeat_id: Uuid,
    pub name: String,
    pub date: DateTime<Utc>,
    pub agent: String,
    pub runs: Vec<EvalRunResult>,
    /// Sorted by prompt name.
    pub prompts: Vec<PromptStats>,
}

impl RepeatedRunResult {
    pub fn from_runs(name: impl Into<String>, agent: impl Into<String>, runs: Vec<EvalRunResult>) -> Self {
        let prompts = prompt_stats(&runs);
        Self {
            repeat_id: Uuid::new_v4(),
            name: name.into(),
            date: Utc::now(),
            agent: agent.into(),
            runs,
            prompts,
        }
    }

    pub fn count(&self, consistency: Consistency) -> usize {
        self.prompts
            .iter()
            .filter(|p| p.consistency() == consistency)
            .count()
    }

    /// True when the last repetition had failing prompts.
    pub fn final_has_failures(&self) -> bool {
        self.runs.last().is_some_and(EvalRunResult::has_failures)
    }
}

/// Fold runs into per-prompt statistics keyed by prompt name.
pub fn prompt_stats(runs: &[EvalRunResult]) -> Vec<PromptStats> {
    let mut stats: BTreeMap<String, PromptStats> = BTreeMap::new();
    for run in runs {
        for fixture in run.fixtures() {
            let entry = stats
                .entry(fixture.name.clone())
                .or_insert_with(|| PromptStats::new(&fixture.name, &fixture.description));
            entry.runs += 1;
            if fixture.passed {
                entry.passed += 1;
            } else {
                entry.failed += 1;
            }
            for check in &fixture.checks {
                entry.check_tally(&check.name).record(check.passed);
            }
            entry.skill_check.record(fixture.skill_check_passed);
            if let Some(error) = &fixture.error {
                entry.errors.push(error.clone());
            }
        }
    }

    stats
        .into_values()
        .map(|mut s| {
            s.pass_rate = if s.runs > 0 {
                s.passed as f64 / s.runs as f64
            } else {
                0.0
            };
            s
        })
        .collect()
}

/// Run the fixture set `runs` times in sequence (`run-1`, `run-2`, ...).
pub async fn run_repeated(
    agent: Arc<dyn CodingAgent>,
    registry: Arc<CheckRegistry>,
    options: &EvalOptions,
    runs: usize,
) -> Result<RepeatedRunResult> {
    let runs = runs.max(1);
    let mut results = Vec::with_capacity(runs);
    for run in 1..=runs {
        let eval = options.clone().with_name(format!("run-{run}"));
        results.push(run_evals(Arc::clone(&agent), Arc::clone(&registry), &eval).await?);
    }

    let repeated = RepeatedRunResult::from_runs(&options.name, agent.name(), results);
    obs::emit_repeat_finished(
        &repeated.name,
        runs,
        repeated.count(Consistency::AlwaysPass),
        repeated.count(Consistency::Flaky),
        repeated.count(Consistency::AlwaysFail),
    );
    Ok(repeated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::{CheckResult, FixtureResult, SuiteResult};
    use std::path::Path;

    fn fixture(name: &str, passed: bool, checks: Vec<CheckResult>) -> FixtureResult {
        let mut r = FixtureResult::invalid_config(Path::new(name), "suite", "boom");
        r.error = None;
        r.passed = passed;
        r.skill_check_passed = passed;
        r.checks = checks;
        r
    }

    fn run(fixtures: Vec<FixtureResult>) -> EvalRunResult {
        EvalRunResult::new("run", "mock", vec![SuiteResult::new("suite", fixtures)])
    }

    #[test]
    fn test_prompt_stats_classify() {
        let runs = vec![
            run(vec![
                fixture("steady", true, vec![]),
                fixture("wobbly", true, vec![CheckResult::pass("exists", "ok")]),
                fixture("broken", false, vec![]),
            ]),
            run(vec![
                fixture("steady", true, vec![]),
                fixture("wobbly", false, vec![CheckResult::fail("exists", "missing")]),
                fixture("broken", false, vec![]),
            ]),
        ];
        let repeated = RepeatedRunResult::from_runs("r", "mock", runs);

        let names: Vec<_> = repeated.prompts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["broken", "steady", "wobbly"]);
        assert_eq!(repeated.count(Consistency::AlwaysPass), 1);
        assert_eq!(repeated.count(Consistency::Flaky), 1);
        assert_eq!(repeated.count(Consistency::AlwaysFail), 1);

        let wobbly = &repeated.prompts[2];
        assert_eq!(wobbly.runs, 2);
        assert!((wobbly.pass_rate - 0.5).abs() < 1e-9);
        assert_eq!(wobbly.check_results, vec![("exists".to_string(), Tally { passed: 1, total: 2 })]);
        assert_eq!(wobbly.skill_check, Tally { passed: 1, total: 2 });
        assert!(repeated.final_has_failures());
    }

    #[test]
    fn test_check_tallies_keep_first_seen_order() {
        let runs = vec![run(vec![fixture(
            "p",
            true,
            vec![CheckResult::pass("zeta", "ok"), CheckResult::pass("alpha", "ok")],
        )])];
        let stats = prompt_stats(&runs);
        let order: Vec<_> = stats[0].check_results.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_errors_are_collected() {
        let mut errored = fixture("p", false, vec![]);
        errored.error = Some("agent crashed".to_string());
        let stats = prompt_stats(&[run(vec![errored.clone()]), run(vec![errored])]);
        assert_eq!(stats[0].errors, vec!["agent crashed", "agent crashed"]);
        assert_eq!(stats[0].consistency(), Consistency::AlwaysFail);
    }

    #[test]
    fn test_final_run_decides_failure() {
        let repeated = RepeatedRunResult::from_runs(
            "r",
            "mock",
            vec![run(vec![fixture("p", false, vec![])]), run(vec![fixture("p", true, vec![])])],
        );
        assert!(!repeated.final_has_failures());
        assert_eq!(repeated.count(Consistency::Flaky), 1);
    }
}
