//! The concurrency limit holds across a whole eval run.

mod common;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{scratch_leftovers, write};
use skeval_core::agent::AgentResult;
use skeval_core::{run_evals, AgentResponse, CheckRegistry, CodingAgent, EvalOptions};

/// Sleeps per prompt and records the peak number of overlapping runs.
#[derive(Default)]
struct SlowAgent {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl CodingAgent for SlowAgent {
    fn name(&self) -> &str {
        "slow"
    }

    async fn run(&self, prompt: &str, _working_dir: &Path) -> AgentResult<AgentResponse> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        // Earlier prompts sleep longer so completion order differs from input order.
        let idx: u64 = prompt.trim_start_matches("p").parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(40 - idx * 4)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(AgentResponse::new(prompt))
    }
}

#[tokio::test]
async fn test_run_never_exceeds_concurrency_and_keeps_order() {
    let fixtures = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    for i in 0..8 {
        write(
            fixtures.path(),
            &format!("load/f{i}/eval.json"),
            &format!(r#"{{"name":"f{i}","prompt":"p{i}"}}"#),
        );
    }

    let agent = Arc::new(SlowAgent::default());
    let options = EvalOptions::new(fixtures.path())
        .with_scratch_root(scratch.path())
        .with_concurrency(3);
    let run = run_evals(
        Arc::clone(&agent) as Arc<dyn CodingAgent>,
        Arc::new(CheckRegistry::builtin()),
        &options,
    )
    .await
    .unwrap();

    assert_eq!(agent.calls.load(Ordering::SeqCst), 8);
    assert!(agent.peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(agent.in_flight.load(Ordering::SeqCst), 0);

    let names: Vec<_> = run.fixtures().map(|f| f.name.clone()).collect();
    let expected: Vec<_> = (0..8).map(|i| format!("f{i}")).collect();
    assert_eq!(names, expected);
    assert_eq!(run.total_passed, 8);
    assert!(scratch_leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_uncreatable_scratch_root_aborts_the_run() {
    let fixtures = tempfile::tempdir().unwrap();
    write(fixtures.path(), "solo/eval.json", r#"{"name":"solo","prompt":"p"}"#);

    let blocker = tempfile::NamedTempFile::new().unwrap();
    let options = EvalOptions::new(fixtures.path()).with_scratch_root(blocker.path().join("nested"));
    let agent: Arc<dyn CodingAgent> = Arc::new(SlowAgent::default());
    let err = run_evals(agent, Arc::new(CheckRegistry::builtin()), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, skeval_core::EvalError::Scratch { .. }));
}

/// Panics on one prompt after the sandbox is materialized.
struct PanickingAgent;

#[async_trait]
impl CodingAgent for PanickingAgent {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn run(&self, prompt: &str, working_dir: &Path) -> AgentResult<AgentResponse> {
        assert!(working_dir.exists());
        if prompt == "explode" {
            panic!("agent crashed");
        }
        Ok(AgentResponse::new(prompt))
    }
}

#[tokio::test]
async fn test_panicking_agent_unwinds_and_cleans_scratch() {
    let fixtures = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    write(fixtures.path(), "mixed/calm/eval.json", r#"{"name":"calm","prompt":"calm"}"#);
    write(fixtures.path(), "mixed/boom/eval.json", r#"{"name":"boom","prompt":"explode"}"#);

    let options = EvalOptions::new(fixtures.path())
        .with_scratch_root(scratch.path())
        .with_concurrency(2);
    let agent: Arc<dyn CodingAgent> = Arc::new(PanickingAgent);
    let err = run_evals(agent, Arc::new(CheckRegistry::builtin()), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, skeval_core::EvalError::TaskJoin(_)));
    assert!(scratch_leftovers(scratch.path()).is_empty());
}
