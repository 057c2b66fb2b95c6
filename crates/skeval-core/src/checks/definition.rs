//! Domain-shaped definition checks: `entity-config`, `function-def`,
//! `agent-config`.
//!
//! The definition is read from `filePath` when `target` is `file`, else
//! extracted from the agent output. `expectedValid` (default true) flips
//! the verdict so fixtures can assert that a broken definition is rejected;
//! a definition that cannot be found counts as invalid.

use async_trait::async_trait;
use jsonschema::Validator;
use serde_json::Value;

use super::jsonc::{extract_definition, parse_jsonc};
use super::schema::{self, describe};
use super::{Check, CheckConfig, CheckContext, CheckKind, CheckTarget};
use crate::domain::result::CheckResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Entity,
    Function,
    Agent,
}

impl DefinitionKind {
    fn label(self) -> &'static str {
        match self {
            DefinitionKind::Entity => "entity",
            DefinitionKind::Function => "function",
            DefinitionKind::Agent => "agent",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            DefinitionKind::Entity => "schema",
            DefinitionKind::Function => "definition",
            DefinitionKind::Agent => "configuration",
        }
    }

    fn check_kind(self) -> CheckKind {
        match self {
            DefinitionKind::Entity => CheckKind::EntityConfig,
            DefinitionKind::Function => CheckKind::FunctionDef,
            DefinitionKind::Agent => CheckKind::AgentConfig,
        }
    }

    fn validator(self) -> &'static Validator {
        match self {
            DefinitionKind::Entity => schema::entity(),
            DefinitionKind::Function => schema::function(),
            DefinitionKind::Agent => schema::agent(),
        }
    }
}

pub struct DefinitionCheck {
    kind: DefinitionKind,
    config: CheckConfig,
}

impl DefinitionCheck {
    pub fn new(kind: DefinitionKind, config: CheckConfig) -> Self {
        Self { kind, config }
    }

    async fn load(&self, ctx: &CheckContext<'_>) -> Result<Option<Value>, String> {
        match (self.config.target, self.config.file_path.as_deref()) {
            (Some(CheckTarget::File), Some(rel)) => {
                let path = ctx.project_dir.join(rel);
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| e.to_string())?;
                parse_jsonc(&content).map(Some).map_err(|e| e.to_string())
            }
            _ => Ok(extract_definition(
                &ctx.agent_response.output,
                self.kind == DefinitionKind::Entity,
            )),
        }
    }
}

#[async_trait]
impl Check for DefinitionCheck {
    fn kind(&self) -> CheckKind {
        self.kind.check_kind()
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult {
        let name = &self.config.description;
        let expected_valid = self.config.expected_valid.unwrap_or(true);
        let (label, noun) = (self.kind.label(), self.kind.noun());

        let data = match self.load(ctx).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                return CheckResult::verdict(
                    name,
                    !expected_valid,
                    format!("No {label} configuration found in output"),
                )
            }
            Err(e) => {
                return CheckResult::verdict(
                    name,
                    !expected_valid,
                    format!("Failed to read {label} file: {e}"),
                )
            }
        };

        match schema::validate(self.kind.validator(), &data) {
            Ok(()) if expected_valid => CheckResult::pass(name, format!("Valid {label} {noun}")),
            Ok(()) => CheckResult::fail(name, format!("Expected invalid but got valid {noun}")),
            Err(issues) if expected_valid => CheckResult::fail(
                name,
                format!("Invalid {label} {noun}: {}", describe(&issues)),
            ),
            Err(_) => CheckResult::pass(name, "Correctly identified as invalid"),
        }
    }
}
