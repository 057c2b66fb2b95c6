//! Run configuration.

use std::path::{Path, PathBuf};

use crate::discovery::FixtureFilter;
use crate::experiments::Experiment;

/// Default number of fixture prompts in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Options for one eval pass over a fixture set.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOptions {
    /// Run name recorded in the result (experiment name in comparisons).
    pub name: String,
    pub fixtures_dir: PathBuf,
    pub filter: FixtureFilter,
    /// Maximum in-flight fixture prompts; values below 1 are treated as 1.
    pub concurrency: usize,
    /// Parent directory for per-fixture scratch copies.
    pub scratch_root: PathBuf,
    /// Overlay applied to every sandbox copy.
    pub experiment: Option<Experiment>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            fixtures_dir: PathBuf::from("fixtures"),
            filter: FixtureFilter::default(),
            concurrency: DEFAULT_CONCURRENCY,
            scratch_root: std::env::temp_dir(),
            experiment: None,
        }
    }
}

impl EvalOptions {
    pub fn new(fixtures_dir: impl AsRef<Path>) -> Self {
        Self {
            fixtures_dir: fixtures_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_filter_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.filter.pattern = Some(pattern.into());
        self
    }

    pub fn with_fixture_names(mut self, names: Vec<String>) -> Self {
        self.filter.names = names;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_scratch_root(mut self, root: impl AsRef<Path>) -> Self {
        self.scratch_root = root.as_ref().to_path_buf();
        self
    }

    pub fn with_experiment(mut self, experiment: Experiment) -> Self {
        self.experiment = Some(experiment);
        self
    }

    /// Effective concurrency limit.
    pub fn concurrency_limit(&self) -> usize {
        self.concurrency.max(1)
    }
}

/// Options for comparing experiment overlays.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareOptions {
    /// Comparison name.
    pub name: String,
    /// Base options; `name` and `experiment` are set per experiment.
    pub eval: EvalOptions,
    pub experiments_dir: PathBuf,
    /// Case-insensitive substring on experiment names.
    pub experiment_filter: Option<String>,
    /// Full comparison repetitions; at least 1.
    pub repetitions: usize,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            name: "comparison".to_string(),
            eval: EvalOptions::default(),
            experiments_dir: PathBuf::from("experiments"),
            experiment_filter: None,
            repetitions: 1,
        }
    }
}

impl CompareOptions {
    pub fn new(eval: EvalOptions, experiments_dir: impl AsRef<Path>) -> Self {
        Self {
            eval,
            experiments_dir: experiments_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_experiment_filter(mut self, pattern: impl Into<String>) -> Self {
        self.experiment_filter = Some(pattern.into());
        self
    }

    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_options_defaults() {
        let opts = EvalOptions::default();
        assert_eq!(opts.name, "default");
        assert_eq!(opts.fixtures_dir, PathBuf::from("fixtures"));
        assert_eq!(opts.concurrency, DEFAULT_CONCURRENCY);
        assert!(opts.experiment.is_none());
        assert!(opts.filter.is_empty());
    }

    #[test]
    fn test_concurrency_is_clamped() {
        assert_eq!(EvalOptions::default().with_concurrency(0).concurrency, 1);
        let raw = EvalOptions {
            concurrency: 0,
            ..Default::default()
        };
        assert_eq!(raw.concurrency_limit(), 1);
    }

    #[test]
    fn test_builder_sets_filter() {
        let opts = EvalOptions::new("fx")
            .with_filter_pattern("sdk")
            .with_fixture_names(vec!["todo".to_string()]);
        assert_eq!(opts.filter.pattern.as_deref(), Some("sdk"));
        assert_eq!(opts.filter.names, vec!["todo"]);
    }

    #[test]
    fn test_compare_options_repetitions_at_least_one() {
        let opts = CompareOptions::default().with_repetitions(0);
        assert_eq!(opts.repetitions, 1);
        assert_eq!(opts.experiments_dir, PathBuf::from("experiments"));
    }
}
