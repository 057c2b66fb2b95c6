//! Run outcome types: check, fixture, suite and whole-run results.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::AgentResponse;
use crate::domain::fixture::ExpandedFixture;

/// Outcome of a single check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckResult {
    /// The check's configured description.
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            details: Some(details.into()),
        }
    }

    pub fn fail(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            details: Some(details.into()),
        }
    }

    /// Pass or fail depending on `passed`, with the same details.
    pub fn verdict(name: impl Into<String>, passed: bool, details: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            details: Some(details.into()),
        }
    }
}

/// Outcome of one expanded fixture prompt.
///
/// # Invariants
///
/// `passed == skill_check_passed && checks.iter().all(|c| c.passed)`, and
/// when `error` is set `passed` is false and `checks` is empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixtureResult {
    pub name: String,
    pub description: String,
    pub fixture_dir: PathBuf,
    pub suite: String,
    pub prompt: String,
    pub expected_skills: Vec<String>,
    pub skills_invoked: Vec<String>,
    pub skill_check_passed: bool,
    pub checks: Vec<CheckResult>,
    pub passed: bool,
    pub agent_output: String,
    #[serde(default)]
    pub agent_metadata: serde_json::Map<String, serde_json::Value>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FixtureResult {
    /// Build a result from a completed agent invocation and its checks.
    pub fn completed(
        fixture: &ExpandedFixture,
        response: AgentResponse,
        checks: Vec<CheckResult>,
        duration_ms: u64,
    ) -> Self {
        let skill_check_passed = response.has_all_skills(&fixture.expected_skills);
        let passed = skill_check_passed && checks.iter().all(|c| c.passed);
        Self {
            name: fixture.name.clone(),
            description: fixture.description.clone(),
            fixture_dir: fixture.fixture_dir.clone(),
            suite: fixture.suite.clone(),
            prompt: fixture.prompt.clone(),
            expected_skills: fixture.expected_skills.clone(),
            skills_invoked: response.skills_invoked.into_iter().collect(),
            skill_check_passed,
            checks,
            passed,
            agent_output: response.output,
            agent_metadata: response.metadata,
            duration_ms,
            error: None,
        }
    }

    /// Negative result for a fixture prompt whose execution failed.
    pub fn errored(fixture: &ExpandedFixture, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: fixture.name.clone(),
            description: fixture.description.clone(),
            fixture_dir: fixture.fixture_dir.clone(),
            suite: fixture.suite.clone(),
            prompt: fixture.prompt.clone(),
            expected_skills: fixture.expected_skills.clone(),
            skills_invoked: Vec::new(),
            skill_check_passed: false,
            checks: Vec::new(),
            passed: false,
            agent_output: String::new(),
            agent_metadata: serde_json::Map::new(),
            duration_ms,
            error: Some(error.into()),
        }
    }

    /// Negative result for a fixture whose `eval.json` could not be loaded.
    pub fn invalid_config(fixture_dir: &Path, suite: &str, error: impl Into<String>) -> Self {
        let name = fixture_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| fixture_dir.display().to_string());
        Self {
            name,
            description: String::new(),
            fixture_dir: fixture_dir.to_path_buf(),
            suite: suite.to_string(),
            prompt: String::new(),
            expected_skills: Vec::new(),
            skills_invoked: Vec::new(),
            skill_check_passed: false,
            checks: Vec::new(),
            passed: false,
            agent_output: String::new(),
            agent_metadata: serde_json::Map::new(),
            duration_ms: 0,
            error: Some(error.into()),
        }
    }
}

/// Fixture results grouped by suite key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuiteResult {
    pub name: String,
    pub fixtures: Vec<FixtureResult>,
    pub passed: usize,
    pub failed: usize,
}

impl SuiteResult {
    pub fn new(name: impl Into<String>, fixtures: Vec<FixtureResult>) -> Self {
        let passed = fixtures.iter().filter(|f| f.passed).count();
        let failed = fixtures.len() - passed;
        Self {
            name: name.into(),
            fixtures,
            passed,
            failed,
        }
    }
}

/// One full pass over a fixture set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalRunResult {
    pub run_id: Uuid,
    pub name: String,
    pub date: DateTime<Utc>,
    pub agent: String,
    pub suites: Vec<SuiteResult>,
    pub total_passed: usize,
    pub total_failed: usize,
}

impl EvalRunResult {
    pub fn new(name: impl Into<String>, agent: impl Into<String>, suites: Vec<SuiteResult>) -> Self {
        let total_passed = suites.iter().map(|s| s.passed).sum();
        let total_failed = suites.iter().map(|s| s.failed).sum();
        Self {
            run_id: Uuid::new_v4(),
            name: name.into(),
            date: Utc::now(),
            agent: agent.into(),
            suites,
            total_passed,
            total_failed,
        }
    }

    pub fn total(&self) -> usize {
        self.total_passed + self.total_failed
    }

    /// Fraction of passing fixtures; 0.0 for an empty run.
    pub fn pass_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.total_passed as f64 / self.total() as f64
        }
    }

    pub fn has_failures(&self) -> bool {
        self.total_failed > 0
    }

    /// All fixture results in suite order.
    pub fn fixtures(&self) -> impl Iterator<Item = &FixtureResult> {
        self.suites.iter().flat_map(|s| s.fixtures.iter())
    }
}
