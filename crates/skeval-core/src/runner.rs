//! Eval run aggregation: one bounded pass over a fixture set.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::instrument;

use crate::agent::CodingAgent;
use crate::checks::CheckRegistry;
use crate::config::EvalOptions;
use crate::discovery::{discover_fixtures, expand_fixtures, FixtureUnit};
use crate::domain::error::{EvalError, Result};
use crate::domain::result::{EvalRunResult, FixtureResult, SuiteResult};
use crate::experiments::Experiment;
use crate::obs;
use crate::sandbox::run_fixture;
use crate::scheduler::run_bounded;

/// Discover, expand and run every fixture prompt under `options`.
///
/// Per-fixture failures become failed results. Only an unreadable fixtures
/// tree, an uncreatable scratch root or a worker join failure abort the run.
#[instrument(skip_all, fields(run = %options.name))]
pub async fn run_evals(
    agent: Arc<dyn CodingAgent>,
    registry: Arc<CheckRegistry>,
    options: &EvalOptions,
) -> Result<EvalRunResult> {
    let start = Instant::now();

    tokio::fs::create_dir_all(&options.scratch_root)
        .await
        .map_err(|source| EvalError::Scratch {
            root: options.scratch_root.clone(),
            source,
        })?;

    let root = options.fixtures_dir.clone();
    let filter = options.filter.clone();
    let units = tokio::task::spawn_blocking(move || -> Result<Vec<FixtureUnit>> {
        let fixture_dirs = discover_fixtures(&root)?;
        Ok(expand_fixtures(&root, &fixture_dirs, &filter))
    })
    .await
    .map_err(|e| EvalError::TaskJoin(e.to_string()))??;
    let limit = options.concurrency_limit();
    obs::emit_run_started(&options.name, agent.name(), units.len(), limit);

    let scratch_root = Arc::new(options.scratch_root.clone());
    let overlay = Arc::new(options.experiment.clone());
    let worker_agent = Arc::clone(&agent);
    let results = run_bounded(units, limit, move |unit| {
        let agent = Arc::clone(&worker_agent);
        let registry = Arc::clone(&registry);
        let scratch_root: Arc<PathBuf> = Arc::clone(&scratch_root);
        let overlay: Arc<Option<Experiment>> = Arc::clone(&overlay);
        async move {
            match unit {
                FixtureUnit::Prompt(fixture) => {
                    run_fixture(
                        agent.as_ref(),
                        &registry,
                        &fixture,
                        &scratch_root,
                        overlay.as_ref().as_ref(),
                    )
                    .await
                }
                FixtureUnit::Invalid {
                    fixture_dir,
                    suite,
                    error,
                } => {
                    let result = FixtureResult::invalid_config(&fixture_dir, &suite, error);
                    obs::emit_fixture_finished(&result);
                    result
                }
            }
        }
    })
    .await?;

    let run = EvalRunResult::new(&options.name, agent.name(), group_into_suites(results));
    obs::emit_run_finished(
        &run.name,
        run.total_passed,
        run.total_failed,
        start.elapsed().as_millis() as u64,
    );
    Ok(run)
}

/// Group results by suite key, keeping the first-seen suite order and the
/// input order within each suite.
pub fn group_into_suites(results: Vec<FixtureResult>) -> Vec<SuiteResult> {
    let mut groups: Vec<(String, Vec<FixtureResult>)> = Vec::new();
    for result in results {
        match groups.iter_mut().find(|(suite, _)| *suite == result.suite) {
            Some((_, fixtures)) => fixtures.push(result),
            None => groups.push((result.suite.clone(), vec![result])),
        }
    }
    groups
        .into_iter()
        .map(|(name, fixtures)| SuiteResult::new(name, fixtures))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn result(name: &str, suite: &str, passed: bool) -> FixtureResult {
        let mut r = FixtureResult::invalid_config(Path::new(name), suite, "x");
        r.passed = passed;
        r
    }

    #[test]
    fn test_group_into_suites_keeps_first_seen_order() {
        let suites = group_into_suites(vec![
            result("a", "sdk", true),
            result("b", "cli", false),
            result("c", "sdk", false),
            result("d", "cli", true),
        ]);
        let names: Vec<_> = suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["sdk", "cli"]);
        let sdk: Vec<_> = suites[0].fixtures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(sdk, vec!["a", "c"]);
        assert_eq!((suites[0].passed, suites[0].failed), (1, 1));
        assert_eq!((suites[1].passed, suites[1].failed), (1, 1));
    }

    #[test]
    fn test_group_into_suites_empty() {
        assert!(group_into_suites(Vec::new()).is_empty());
    }
}
