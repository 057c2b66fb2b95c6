//! Coding-agent adapters.
//!
//! The engine only sees the [`CodingAgent`] trait: given a prompt and a
//! working directory, produce an [`AgentResponse`]. Concrete adapters:
//!
//! - [`mock`]   : canned, keyword-driven responses for harness smoke tests
//! - [`cli`]    : shells out to an agent CLI (default `claude -p`)
//! - [`markers`]: regex tables that detect invoked skills in output

pub mod cli;
pub mod error;
pub mod markers;
pub mod mock;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use cli::{CliAgent, CliAgentConfig};
pub use error::{AgentError, AgentResult};
pub use markers::SkillMarkers;
pub use mock::MockAgent;

/// What an agent produced for one prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentResponse {
    pub output: String,
    pub skills_invoked: BTreeSet<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl AgentResponse {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills_invoked.insert(skill.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Subset test: every expected skill was invoked. Empty expectations pass.
    pub fn has_all_skills(&self, expected: &[String]) -> bool {
        expected.iter().all(|s| self.skills_invoked.contains(s))
    }
}

/// An external program that edits files in `working_dir` in response to a
/// natural-language prompt.
#[async_trait]
pub trait CodingAgent: Send + Sync {
    /// Identity recorded in run results.
    fn name(&self) -> &str;

    /// Run the agent once. Must not fail for ordinary process failures.
    async fn run(&self, prompt: &str, working_dir: &Path) -> AgentResult<AgentResponse>;
}

/// Build an agent adapter by name (`mock`, `claude-code`).
///
/// `command` overrides the CLI adapter's command line.
pub fn create_agent(name: &str, command: Option<&str>) -> AgentResult<Arc<dyn CodingAgent>> {
    match name {
        "mock" => Ok(Arc::new(MockAgent::new())),
        "claude-code" => {
            let mut config = CliAgentConfig::default();
            if let Some(cmd) = command {
                config.command = cmd.split_whitespace().map(str::to_string).collect();
            }
            Ok(Arc::new(CliAgent::new(config)?))
        }
        other => Err(AgentError::UnknownAgent(other.to_string())),
    }
}
