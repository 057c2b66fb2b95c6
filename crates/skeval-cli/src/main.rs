//! Skill Eval CLI
//!
//! The `skeval` command runs scenario fixtures against a coding agent.
//!
//! ## Commands
//!
//! - `run`: Run every fixture prompt once and write a report
//! - `compare`: Run the fixtures under each experiment overlay
//! - `repeat`: Run the fixtures several times and classify flakiness
//! - `list`: Show the discovered fixture prompts

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, Level};

use skeval_core::discovery::{discover_fixtures, expand_fixtures, FixtureUnit};
use skeval_core::{
    aggregate_repetitions, create_agent, render_consistency_md, run_comparisons, run_evals,
    run_repeated, write_comparison_report, write_repeated_report, write_run_report, CheckRegistry,
    CodingAgent, CompareOptions, Consistency, EvalOptions, EvalRunResult, RunSpan,
    DEFAULT_CONCURRENCY, DEFAULT_RUNS,
};

#[derive(Parser)]
#[command(name = "skeval")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate coding agents against scenario fixtures", long_about = None)]
struct Cli {
    /// Enable verbose output (agent output, skills, sandbox paths)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct FixtureArgs {
    /// Fixtures root directory
    #[arg(long, env = "SKEVAL_FIXTURES_DIR", default_value = "fixtures")]
    fixtures: PathBuf,

    /// Case-insensitive substring over fixture path or prompt name
    #[arg(long, visible_alias = "filter-fixtures")]
    filter: Option<String>,

    /// Maximum fixture prompts in flight
    #[arg(short, long, env = "SKEVAL_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Parent directory for sandbox copies (default: OS temp dir)
    #[arg(long, env = "SKEVAL_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct AgentArgs {
    /// Agent adapter: claude-code or mock
    #[arg(short, long, env = "SKEVAL_AGENT", default_value = "claude-code")]
    agent: String,

    /// Command line for the CLI adapter (prompt is appended)
    #[arg(long, env = "SKEVAL_AGENT_COMMAND")]
    agent_command: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every fixture prompt once
    Run {
        /// Only fixtures or prompts whose name contains one of these
        names: Vec<String>,

        #[command(flatten)]
        fixtures: FixtureArgs,

        #[command(flatten)]
        agent: AgentArgs,

        /// Report output directory
        #[arg(short, long, env = "SKEVAL_OUTPUT_DIR", default_value = "results")]
        output: PathBuf,

        /// Run name used in the report file name
        #[arg(short, long, default_value = "default")]
        name: String,
    },

    /// Compare experiment overlays on the same fixtures
    Compare {
        #[command(flatten)]
        fixtures: FixtureArgs,

        #[command(flatten)]
        agent: AgentArgs,

        /// Experiments directory
        #[arg(long, env = "SKEVAL_EXPERIMENTS_DIR", default_value = "experiments")]
        experiments: PathBuf,

        /// Case-insensitive substring on experiment names
        #[arg(long)]
        filter_experiments: Option<String>,

        /// Number of full comparison repetitions
        #[arg(short, long, default_value_t = 1)]
        runs: usize,

        /// Report output directory
        #[arg(short, long, env = "SKEVAL_OUTPUT_DIR", default_value = "results")]
        output: PathBuf,

        /// Comparison name
        #[arg(short, long, default_value = "comparison")]
        name: String,
    },

    /// Run the fixtures several times and report per-prompt consistency
    Repeat {
        /// Only fixtures or prompts whose name contains one of these
        names: Vec<String>,

        #[command(flatten)]
        fixtures: FixtureArgs,

        #[command(flatten)]
        agent: AgentArgs,

        /// Number of runs
        #[arg(short, long, default_value_t = DEFAULT_RUNS)]
        runs: usize,

        /// Report output directory
        #[arg(short, long, env = "SKEVAL_OUTPUT_DIR", default_value = "results")]
        output: PathBuf,

        /// Name recorded in the report
        #[arg(short, long, default_value = "repeated")]
        name: String,
    },

    /// List discovered fixture prompts per suite
    List {
        /// Only fixtures or prompts whose name contains one of these
        names: Vec<String>,

        /// Fixtures root directory
        #[arg(long, env = "SKEVAL_FIXTURES_DIR", default_value = "fixtures")]
        fixtures: PathBuf,

        /// Case-insensitive substring over fixture path or prompt name
        #[arg(long)]
        filter: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    skeval_core::init_tracing(cli.json, level);

    match dispatch(cli.command).await {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{e:#}"), "skeval failed");
            ExitCode::FAILURE
        }
    }
}

/// Run a command; `Ok(true)` means it finished with failing fixtures.
async fn dispatch(command: Commands) -> Result<bool> {
    match command {
        Commands::Run {
            names,
            fixtures,
            agent,
            output,
            name,
        } => {
            let options = eval_options(&fixtures, names).with_name(name);
            cmd_run(build_agent(&agent)?, &options, &output).await
        }
        Commands::Compare {
            fixtures,
            agent,
            experiments,
            filter_experiments,
            runs,
            output,
            name,
        } => {
            let mut options = CompareOptions::new(eval_options(&fixtures, Vec::new()), experiments)
                .with_name(name)
                .with_repetitions(runs);
            if let Some(pattern) = filter_experiments {
                options = options.with_experiment_filter(pattern);
            }
            cmd_compare(build_agent(&agent)?, &options, &output).await
        }
        Commands::Repeat {
            names,
            fixtures,
            agent,
            runs,
            output,
            name,
        } => {
            let options = eval_options(&fixtures, names).with_name(name);
            cmd_repeat(build_agent(&agent)?, &options, runs, &output).await
        }
        Commands::List {
            names,
            fixtures,
            filter,
        } => {
            let mut options = EvalOptions::new(fixtures).with_fixture_names(names);
            if let Some(pattern) = filter {
                options = options.with_filter_pattern(pattern);
            }
            cmd_list(&options).map(|_| false)
        }
    }
}

fn eval_options(args: &FixtureArgs, names: Vec<String>) -> EvalOptions {
    let mut options = EvalOptions::new(&args.fixtures)
        .with_fixture_names(names)
        .with_concurrency(args.concurrency);
    if let Some(pattern) = &args.filter {
        options = options.with_filter_pattern(pattern.clone());
    }
    if let Some(dir) = &args.scratch_dir {
        options = options.with_scratch_root(dir);
    }
    options
}

fn build_agent(args: &AgentArgs) -> Result<Arc<dyn CodingAgent>> {
    create_agent(&args.agent, args.agent_command.as_deref())
        .with_context(|| format!("Failed to create agent '{}'", args.agent))
}

fn print_run_summary(run: &EvalRunResult) {
    for suite in &run.suites {
        println!("{} ({}/{})", suite.name, suite.passed, suite.fixtures.len());
        for fixture in &suite.fixtures {
            let status = if fixture.passed { "✓" } else { "✗" };
            println!("  {} {} ({}ms)", status, fixture.name, fixture.duration_ms);
            if let Some(error) = &fixture.error {
                println!("      error: {}", error);
            }
            for check in fixture.checks.iter().filter(|c| !c.passed) {
                println!(
                    "      ✗ {}: {}",
                    check.name,
                    check.details.as_deref().unwrap_or("")
                );
            }
        }
    }
    println!();
    println!(
        "Summary: {}/{} passed ({:.0}%)",
        run.total_passed,
        run.total(),
        run.pass_rate() * 100.0
    );
}

async fn cmd_run(agent: Arc<dyn CodingAgent>, options: &EvalOptions, output: &Path) -> Result<bool> {
    let _span = RunSpan::enter(&options.name);
    info!(fixtures = %options.fixtures_dir.display(), agent = agent.name(), "starting run");

    let run = run_evals(agent, Arc::new(CheckRegistry::builtin()), options)
        .await
        .context("Eval run failed")?;

    print_run_summary(&run);
    let report = write_run_report(&run, output).context("Failed to write run report")?;
    println!("Report: {}", report.display());

    Ok(run.has_failures())
}

async fn cmd_compare(agent: Arc<dyn CodingAgent>, options: &CompareOptions, output: &Path) -> Result<bool> {
    let _span = RunSpan::enter(&options.name);

    let comparisons = run_comparisons(agent, Arc::new(CheckRegistry::builtin()), options)
        .await
        .context("Comparison failed")?;

    for (i, comparison) in comparisons.iter().enumerate() {
        if comparisons.len() > 1 {
            println!("Run {}/{}", i + 1, comparisons.len());
        }
        for (experiment, tally) in comparison.ranked() {
            let best = comparison.summary.best_experiment.as_deref() == Some(experiment);
            println!(
                "  {}{}: {}/{} passed ({:.0}%)",
                experiment,
                if best { " (best)" } else { "" },
                tally.passed,
                tally.total,
                tally.pass_rate() * 100.0
            );
        }
        let report = write_comparison_report(comparison, output).context("Failed to write comparison report")?;
        println!("Report: {}", report.display());
        println!();
    }

    if comparisons.len() > 1 {
        print!("{}", render_consistency_md(&aggregate_repetitions(&comparisons)));
    }

    Ok(comparisons.last().is_some_and(|c| c.best_has_failures()))
}

async fn cmd_repeat(
    agent: Arc<dyn CodingAgent>,
    options: &EvalOptions,
    runs: usize,
    output: &Path,
) -> Result<bool> {
    let _span = RunSpan::enter(&options.name);

    let repeated = run_repeated(agent, Arc::new(CheckRegistry::builtin()), options, runs)
        .await
        .context("Repeated run failed")?;

    let total = repeated.runs.len();
    println!("Total prompts: {}", repeated.prompts.len());
    println!(
        "Always pass ({}/{}): {}",
        total,
        total,
        repeated.count(Consistency::AlwaysPass)
    );
    println!("Flaky (some pass): {}", repeated.count(Consistency::Flaky));
    println!(
        "Always fail (0/{}): {}",
        total,
        repeated.count(Consistency::AlwaysFail)
    );
    let report = write_repeated_report(&repeated, output).context("Failed to write repeated report")?;
    println!("Report: {}", report.display());

    Ok(repeated.final_has_failures())
}

fn cmd_list(options: &EvalOptions) -> Result<()> {
    let dirs = discover_fixtures(&options.fixtures_dir)
        .with_context(|| format!("Failed to scan {:?}", options.fixtures_dir))?;
    let units = expand_fixtures(&options.fixtures_dir, &dirs, &options.filter);
    if units.is_empty() {
        println!("No fixtures found in {:?}", options.fixtures_dir);
        return Ok(());
    }

    let mut current: Option<&str> = None;
    for unit in &units {
        if current != Some(unit.suite()) {
            println!("{}", unit.suite());
            current = Some(unit.suite());
        }
        match unit {
            FixtureUnit::Prompt(fixture) => {
                let skills = if fixture.expected_skills.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", fixture.expected_skills.join(", "))
                };
                println!(
                    "  {} ({} checks){}",
                    fixture.name,
                    fixture.checks.len(),
                    skills
                );
            }
            FixtureUnit::Invalid { error, .. } => {
                println!("  {} (invalid: {})", unit.name(), error);
            }
        }
    }
    println!();
    println!("{} prompts", units.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "skeval",
            "-v",
            "run",
            "basic-entity",
            "--fixtures",
            "fx",
            "--filter",
            "sdk",
            "--concurrency",
            "2",
            "--agent",
            "mock",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                names,
                fixtures,
                agent,
                ..
            } => {
                assert_eq!(names, vec!["basic-entity"]);
                assert_eq!(fixtures.fixtures, PathBuf::from("fx"));
                assert_eq!(fixtures.filter.as_deref(), Some("sdk"));
                assert_eq!(fixtures.concurrency, 2);
                assert_eq!(agent.agent, "mock");
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_compare_accepts_filter_fixtures_alias() {
        let cli = Cli::try_parse_from([
            "skeval",
            "compare",
            "--filter-fixtures",
            "entity",
            "--filter-experiments",
            "terse",
            "--runs",
            "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Compare {
                fixtures,
                filter_experiments,
                runs,
                ..
            } => {
                assert_eq!(fixtures.filter.as_deref(), Some("entity"));
                assert_eq!(filter_experiments.as_deref(), Some("terse"));
                assert_eq!(runs, 3);
            }
            _ => panic!("expected compare"),
        }
    }

    #[tokio::test]
    async fn test_cmd_run_with_mock_agent_writes_report() {
        let fixtures = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write(
            fixtures.path(),
            "entities/mock-entity/eval.json",
            r#"{"name":"mock-entity","prompt":"Create a Todo entity","expectedSkills":["base44-cli"],
                "checks":[{"type":"contains","value":"entities push","description":"mentions push"}]}"#,
        );

        let options = EvalOptions::new(fixtures.path())
            .with_scratch_root(scratch.path())
            .with_name("smoke");
        let agent = create_agent("mock", None).unwrap();
        let has_failures = cmd_run(agent, &options, output.path()).await.unwrap();

        assert!(!has_failures);
        let reports: Vec<_> = std::fs::read_dir(output.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("run-") && n.ends_with("-smoke.md"))
            .collect();
        assert_eq!(reports.len(), 1);
    }

    #[test]
    fn test_cmd_list_handles_missing_dir() {
        let options = EvalOptions::new("/nonexistent/skeval/fixtures");
        cmd_list(&options).unwrap();
    }
}
