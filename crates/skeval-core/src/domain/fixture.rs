//! Fixture configuration (`eval.json`) and prompt expansion.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::checks::CheckConfig;

/// Name of the file that marks a directory as a fixture root.
pub const EVAL_CONFIG_FILE: &str = "eval.json";

/// One named scenario inside a multi-prompt fixture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptConfig {
    pub name: String,

    /// Falls back to the fixture description when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub prompt: String,

    #[serde(default)]
    pub expected_skills: Vec<String>,

    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

/// Declarative fixture config.
///
/// Either the legacy single-prompt shape (`prompt` + `expectedSkills` +
/// `checks`) or an ordered `prompts` list. When both are present the list
/// wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvalConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_skills: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<CheckConfig>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Vec<PromptConfig>>,
}

impl EvalConfig {
    /// Expand into one [`ExpandedFixture`] per declared prompt.
    ///
    /// A config declaring neither `prompts` nor `prompt` yields nothing.
    pub fn expand(&self, fixture_dir: &Path, suite: &str) -> Vec<ExpandedFixture> {
        if let Some(prompts) = &self.prompts {
            return prompts
                .iter()
                .map(|p| ExpandedFixture {
                    name: p.name.clone(),
                    description: p
                        .description
                        .clone()
                        .unwrap_or_else(|| self.description.clone()),
                    fixture_dir: fixture_dir.to_path_buf(),
                    suite: suite.to_string(),
                    prompt: p.prompt.clone(),
                    expected_skills: p.expected_skills.clone(),
                    checks: p.checks.clone(),
                })
                .collect();
        }

        match &self.prompt {
            Some(prompt) => vec![ExpandedFixture {
                name: self.name.clone(),
                description: self.description.clone(),
                fixture_dir: fixture_dir.to_path_buf(),
                suite: suite.to_string(),
                prompt: prompt.clone(),
                expected_skills: self.expected_skills.clone().unwrap_or_default(),
                checks: self.checks.clone().unwrap_or_default(),
            }],
            None => Vec::new(),
        }
    }
}

/// A single runnable prompt of a fixture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpandedFixture {
    /// Prompt name (legacy fixtures use the fixture name).
    pub name: String,
    pub description: String,
    /// Fixture root the sandbox is copied from.
    pub fixture_dir: PathBuf,
    /// Suite key: first path segment beneath the fixtures root.
    pub suite: String,
    pub prompt: String,
    pub expected_skills: Vec<String>,
    pub checks: Vec<CheckConfig>,
}

impl ExpandedFixture {
    /// Base name of the fixture directory.
    pub fn fixture_name(&self) -> String {
        self.fixture_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
