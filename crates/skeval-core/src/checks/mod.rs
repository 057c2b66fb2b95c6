//! Checks: pass/fail assertions over agent output or the sandbox filesystem.
//!
//! A fixture declares checks as [`CheckConfig`] records tagged by `type`.
//! The tag is resolved to a closed [`CheckKind`] and dispatched through a
//! [`CheckRegistry`] built once at startup and passed to the runner.
//!
//! # Modules
//!
//! - [`output`]    : `contains`, `json-schema`
//! - [`file`]      : `file-exists`, `file-content`, `file-content-excluded`, `valid-json`
//! - [`definition`]: `entity-config`, `function-def`, `agent-config`
//! - [`command`]   : `command-passes`
//! - [`jsonc`]     : comment stripping and best-effort JSON extraction
//! - [`schema`]    : JSON Schema validation of definitions and schema subsets

pub mod command;
pub mod definition;
pub mod error;
pub mod file;
pub mod jsonc;
pub mod output;
pub mod schema;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::AgentResponse;
use crate::domain::result::CheckResult;

pub use error::CheckError;

/// The closed set of built-in check kinds, keyed by their `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    /// Case-insensitive substring in the agent output.
    Contains,
    /// Regex (preferred) or literal substring in a file.
    FileContent,
    /// Regex must not match a file.
    FileContentExcluded,
    /// File exists.
    FileExists,
    /// File parses as JSON after comment stripping.
    ValidJson,
    /// JSON extracted from output conforms to a JSON-Schema subset.
    JsonSchema,
    /// Entity definition conforms to the entity schema.
    EntityConfig,
    /// Function definition conforms to the function schema.
    FunctionDef,
    /// Agent definition conforms to the agent schema.
    AgentConfig,
    /// External command exits 0.
    CommandPasses,
}

impl CheckKind {
    pub const ALL: [CheckKind; 10] = [
        CheckKind::Contains,
        CheckKind::FileContent,
        CheckKind::FileContentExcluded,
        CheckKind::FileExists,
        CheckKind::ValidJson,
        CheckKind::JsonSchema,
        CheckKind::EntityConfig,
        CheckKind::FunctionDef,
        CheckKind::AgentConfig,
        CheckKind::CommandPasses,
    ];

    /// The `type` tag used in `eval.json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Contains => "contains",
            CheckKind::FileContent => "file-content",
            CheckKind::FileContentExcluded => "file-content-excluded",
            CheckKind::FileExists => "file-exists",
            CheckKind::ValidJson => "valid-json",
            CheckKind::JsonSchema => "json-schema",
            CheckKind::EntityConfig => "entity-config",
            CheckKind::FunctionDef => "function-def",
            CheckKind::AgentConfig => "agent-config",
            CheckKind::CommandPasses => "command-passes",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckKind {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CheckError::UnknownCheckType(s.to_string()))
    }
}

/// Where a definition check reads its JSON from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckTarget {
    Output,
    File,
}

/// A check as declared in `eval.json`.
///
/// The `type` tag stays a plain string here so that an unknown tag is a
/// construction-time error for that one fixture, not a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckConfig {
    #[serde(rename = "type")]
    pub check_type: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<CheckTarget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Definition checks only; defaults to `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_valid: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
}

impl CheckConfig {
    /// Minimal config of the given kind.
    pub fn new(kind: CheckKind, description: impl Into<String>) -> Self {
        Self {
            check_type: kind.as_str().to_string(),
            description: description.into(),
            target: None,
            file_path: None,
            expected_valid: None,
            value: None,
            pattern: None,
            command: None,
            schema: None,
        }
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_target(mut self, target: CheckTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_expected_valid(mut self, expected_valid: bool) -> Self {
        self.expected_valid = Some(expected_valid);
        self
    }
}

/// Everything a check may inspect.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub agent_response: &'a AgentResponse,
    /// Original fixture root (read-only).
    pub fixture_dir: &'a Path,
    /// Agent working directory inside the sandbox.
    pub project_dir: &'a Path,
    pub check_config: &'a CheckConfig,
}

/// A single check. Runs once, never mutates the filesystem, and reports
/// its own internal failures as a failed [`CheckResult`].
#[async_trait]
pub trait Check: Send + Sync {
    fn kind(&self) -> CheckKind;

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult;
}

/// Constructor for one check kind.
pub type CheckFactory = fn(CheckConfig) -> Box<dyn Check>;

/// Dispatch table from [`CheckKind`] to its constructor.
#[derive(Clone)]
pub struct CheckRegistry {
    factories: HashMap<CheckKind, CheckFactory>,
}

impl fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CheckRegistry {
    /// Registry with no kinds registered.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in kind.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(CheckKind::Contains, |c| Box::new(output::ContainsCheck::new(c)));
        registry.register(CheckKind::JsonSchema, |c| {
            Box::new(output::JsonSchemaCheck::new(c))
        });
        registry.register(CheckKind::FileExists, |c| {
            Box::new(file::FileExistsCheck::new(c))
        });
        registry.register(CheckKind::FileContent, |c| {
            Box::new(file::FileContentCheck::new(c))
        });
        registry.register(CheckKind::FileContentExcluded, |c| {
            Box::new(file::FileContentExcludedCheck::new(c))
        });
        registry.register(CheckKind::ValidJson, |c| Box::new(file::ValidJsonCheck::new(c)));
        registry.register(CheckKind::EntityConfig, |c| {
            Box::new(definition::DefinitionCheck::new(
                definition::DefinitionKind::Entity,
                c,
            ))
        });
        registry.register(CheckKind::FunctionDef, |c| {
            Box::new(definition::DefinitionCheck::new(
                definition::DefinitionKind::Function,
                c,
            ))
        });
        registry.register(CheckKind::AgentConfig, |c| {
            Box::new(definition::DefinitionCheck::new(
                definition::DefinitionKind::Agent,
                c,
            ))
        });
        registry.register(CheckKind::CommandPasses, |c| {
            Box::new(command::CommandPassesCheck::new(c))
        });
        registry
    }

    /// Register or replace the constructor for `kind`.
    pub fn register(&mut self, kind: CheckKind, factory: CheckFactory) -> &mut Self {
        self.factories.insert(kind, factory);
        self
    }

    /// Construct the check described by `config`.
    pub fn create(&self, config: &CheckConfig) -> Result<Box<dyn Check>, CheckError> {
        let kind: CheckKind = config.check_type.parse()?;
        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| CheckError::UnknownCheckType(config.check_type.clone()))?;
        Ok(factory(config.clone()))
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<CheckKind> {
        let mut kinds: Vec<_> = self.factories.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

/// Truncate to at most `max` characters.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
