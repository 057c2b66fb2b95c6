//! Experiment comparison over real overlays.

mod common;

use std::path::Path;
use std::sync::Arc;

use common::{scratch_leftovers, write, ScriptedAgent};
use skeval_core::agent::AgentResult;
use skeval_core::{
    aggregate_repetitions, run_comparison, run_comparisons, write_comparison_report,
    AgentResponse, CheckRegistry, CodingAgent, CompareOptions, EvalError, EvalOptions,
};

const OVERLAY_FIXTURE: &str = r#"{
  "name": "overlay",
  "description": "Reacts to instruction files and skills",
  "prompts": [
    {
      "name": "follows-instructions",
      "prompt": "instructions",
      "checks": [
        {"type": "file-exists", "filePath": "base44/entities/todo.jsonc", "description": "todo entity file exists"}
      ]
    },
    {
      "name": "uses-skill",
      "prompt": "skill",
      "expectedSkills": ["entity-skill"]
    }
  ]
}"#;

/// Writes the entity only when instructions are present and reports the
/// entity skill only when it was installed into the project.
fn overlay_sensitive(prompt: &str, dir: &Path) -> AgentResult<AgentResponse> {
    let mut response = AgentResponse::new(format!("handled {prompt}"));
    if prompt == "instructions" && dir.join("CLAUDE.md").is_file() {
        let path = dir.join("base44/entities/todo.jsonc");
        std::fs::create_dir_all(path.parent().unwrap())?;
        std::fs::write(path, "{}")?;
    }
    if dir.join("skills/entity-skill/SKILL.md").is_file() {
        response = response.with_skill("entity-skill");
    }
    Ok(response)
}

struct Workspace {
    fixtures: tempfile::TempDir,
    experiments: tempfile::TempDir,
    scratch: tempfile::TempDir,
}

fn workspace() -> Workspace {
    let fixtures = tempfile::tempdir().unwrap();
    write(fixtures.path(), "entities/overlay/eval.json", OVERLAY_FIXTURE);
    write(fixtures.path(), "entities/overlay/project/CLAUDE.md", "stale instructions");

    let experiments = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(experiments.path().join("baseline")).unwrap();
    write(experiments.path(), "terse/CLAUDE.md", "Be terse.");
    write(experiments.path(), "skilled/skills/entity-skill/SKILL.md", "# entity skill");
    std::fs::create_dir_all(experiments.path().join(".hidden")).unwrap();

    Workspace {
        fixtures,
        experiments,
        scratch: tempfile::tempdir().unwrap(),
    }
}

fn compare_options(ws: &Workspace) -> CompareOptions {
    let eval = EvalOptions::new(ws.fixtures.path())
        .with_scratch_root(ws.scratch.path())
        .with_concurrency(2);
    CompareOptions::new(eval, ws.experiments.path()).with_name("overlays")
}

fn agent() -> Arc<dyn CodingAgent> {
    Arc::new(ScriptedAgent::new("scripted", overlay_sensitive))
}

#[tokio::test]
async fn test_comparison_builds_matrix_from_overlays() {
    let ws = workspace();
    let cmp = run_comparison(agent(), Arc::new(CheckRegistry::builtin()), &compare_options(&ws))
        .await
        .unwrap();

    assert_eq!(cmp.name, "overlays");
    assert_eq!(cmp.experiments, vec!["baseline", "skilled", "terse"]);
    assert_eq!(cmp.fixtures, vec!["follows-instructions", "uses-skill"]);

    assert_eq!(cmp.passed("baseline", "follows-instructions"), Some(false));
    assert_eq!(cmp.passed("terse", "follows-instructions"), Some(true));
    assert_eq!(cmp.passed("skilled", "follows-instructions"), Some(false));
    assert_eq!(cmp.passed("skilled", "uses-skill"), Some(true));
    assert_eq!(cmp.passed("terse", "uses-skill"), Some(false));

    let uses_skill = &cmp.summary.by_fixture["uses-skill"];
    assert_eq!(uses_skill.passed_experiments, vec!["skilled"]);
    assert_eq!(uses_skill.failed_experiments, vec!["baseline", "terse"]);

    // skilled and terse tie at 50%; the earlier experiment wins.
    assert_eq!(cmp.summary.best_experiment.as_deref(), Some("skilled"));
    assert!(cmp.best_has_failures());

    assert_eq!(
        std::fs::read_to_string(ws.fixtures.path().join("entities/overlay/project/CLAUDE.md")).unwrap(),
        "stale instructions"
    );
    assert!(scratch_leftovers(ws.scratch.path()).is_empty());
}

#[tokio::test]
async fn test_experiment_filter_narrows_the_comparison() {
    let ws = workspace();
    let options = compare_options(&ws).with_experiment_filter("TERSE");
    let cmp = run_comparison(agent(), Arc::new(CheckRegistry::builtin()), &options)
        .await
        .unwrap();
    assert_eq!(cmp.experiments, vec!["terse"]);
    assert_eq!(cmp.summary.best_experiment.as_deref(), Some("terse"));
}

#[tokio::test]
async fn test_repetitions_rank_experiments() {
    let ws = workspace();
    let options = compare_options(&ws).with_repetitions(2);
    let comparisons = run_comparisons(agent(), Arc::new(CheckRegistry::builtin()), &options)
        .await
        .unwrap();
    assert_eq!(comparisons.len(), 2);
    let names: Vec<_> = comparisons.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["overlays-run1", "overlays-run2"]);

    let ranking = aggregate_repetitions(&comparisons);
    let order: Vec<_> = ranking.iter().map(|s| s.experiment.as_str()).collect();
    assert_eq!(order, vec!["skilled", "terse", "baseline"]);
    assert_eq!(ranking[0].runs, 2);
    assert_eq!(ranking[0].pass_rates, vec![50.0, 50.0]);
    assert_eq!(ranking[2].perfect_runs, 0);
    assert_eq!(ranking[2].avg_pass_rate, 0.0);
}

#[tokio::test]
async fn test_missing_or_unmatched_experiments_are_errors() {
    let ws = workspace();
    let registry = Arc::new(CheckRegistry::builtin());

    let mut missing = compare_options(&ws);
    missing.experiments_dir = ws.experiments.path().join("does-not-exist");
    let err = run_comparison(agent(), Arc::clone(&registry), &missing).await.unwrap_err();
    assert!(matches!(err, EvalError::NoExperiments(_)));

    let unmatched = compare_options(&ws).with_experiment_filter("nothing-like-this");
    let err = run_comparison(agent(), registry, &unmatched).await.unwrap_err();
    assert!(matches!(err, EvalError::NoExperimentsMatch(p) if p == "nothing-like-this"));
}

#[tokio::test]
async fn test_each_repetition_writes_its_own_report() {
    let ws = workspace();
    let output = tempfile::tempdir().unwrap();
    let options = compare_options(&ws).with_repetitions(3);
    let comparisons = run_comparisons(agent(), Arc::new(CheckRegistry::builtin()), &options)
        .await
        .unwrap();

    let mut paths: Vec<_> = comparisons
        .iter()
        .map(|c| write_comparison_report(c, output.path()).unwrap())
        .collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 3);

    let reports = std::fs::read_dir(output.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("comparison-") && n.ends_with(".md"))
        .count();
    assert_eq!(reports, 3);
}

#[tokio::test]
async fn test_shared_prompt_names_still_count_every_failure() {
    let fixtures = tempfile::tempdir().unwrap();
    let experiments = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    write(
        fixtures.path(),
        "a/x/eval.json",
        r#"{"name":"dup","prompt":"fail","checks":[{"type":"contains","value":"ok","description":"says ok"}]}"#,
    );
    write(
        fixtures.path(),
        "b/x/eval.json",
        r#"{"name":"dup","prompt":"pass","checks":[{"type":"contains","value":"ok","description":"says ok"}]}"#,
    );
    std::fs::create_dir_all(experiments.path().join("only")).unwrap();

    let agent: Arc<dyn CodingAgent> = Arc::new(ScriptedAgent::new("scripted", |prompt: &str, _: &Path| {
        Ok(AgentResponse::new(if prompt == "pass" { "ok" } else { "nope" }))
    }));
    let eval = EvalOptions::new(fixtures.path()).with_scratch_root(scratch.path());
    let options = CompareOptions::new(eval, experiments.path());
    let cmp = run_comparison(agent, Arc::new(CheckRegistry::builtin()), &options)
        .await
        .unwrap();

    assert_eq!(cmp.fixtures, vec!["dup"]);
    let tally = cmp.summary.by_experiment["only"];
    assert_eq!((tally.passed, tally.failed, tally.total), (1, 1, 2));
    assert_eq!(cmp.summary.best_experiment.as_deref(), Some("only"));
    assert!(cmp.best_has_failures());
}
