//! Skill Eval core library
//!
//! Runs scenario fixtures against a coding agent in disposable sandboxes,
//! scores them with checks, and aggregates runs, experiment comparisons and
//! repeated runs.

pub mod agent;
pub mod checks;
pub mod compare;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod experiments;
pub mod obs;
pub mod repeated;
pub mod reporting;
pub mod runner;
pub mod sandbox;
pub mod scheduler;
pub mod telemetry;

pub use agent::{create_agent, AgentError, AgentResponse, CliAgent, CliAgentConfig, CodingAgent, MockAgent};

pub use checks::{
    Check, CheckConfig, CheckContext, CheckError, CheckKind, CheckRegistry, CheckTarget,
};

pub use domain::{
    CheckResult, EvalConfig, EvalError, EvalRunResult, ExpandedFixture, FixtureResult,
    PromptConfig, Result, SuiteResult, EVAL_CONFIG_FILE,
};

pub use config::{CompareOptions, EvalOptions, DEFAULT_CONCURRENCY};
pub use discovery::{discover_fixtures, expand_fixtures, load_eval_config, FixtureFilter, FixtureUnit};
pub use experiments::{discover_experiments, select_experiments, Experiment};
pub use sandbox::{run_fixture, Sandbox};
pub use scheduler::run_bounded;
pub use runner::run_evals;
pub use compare::{
    aggregate_repetitions, run_comparison, run_comparisons, ComparisonResult, ExperimentConsistency,
};
pub use repeated::{run_repeated, Consistency, PromptStats, RepeatedRunResult, DEFAULT_RUNS};
pub use reporting::{
    render_comparison_md, render_consistency_md, render_repeated_md, render_run_md,
    write_comparison_report, write_repeated_report, write_run_report,
};

pub use obs::RunSpan;
pub use telemetry::init_tracing;

/// skeval version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
