//! Checks over the agent's textual output.

use async_trait::async_trait;

use super::jsonc::extract_json;
use super::schema::{self, describe};
use super::{Check, CheckConfig, CheckContext, CheckKind};
use crate::domain::result::CheckResult;

/// `contains`: case-insensitive substring in the output.
pub struct ContainsCheck {
    config: CheckConfig,
}

impl ContainsCheck {
    pub fn new(config: CheckConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Check for ContainsCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Contains
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult {
        let name = &self.config.description;
        let needle = match self.config.value.as_deref() {
            Some(v) if !v.is_empty() => v,
            _ => return CheckResult::fail(name, "No search value specified in check config"),
        };

        let found = ctx
            .agent_response
            .output
            .to_lowercase()
            .contains(&needle.to_lowercase());
        if found {
            CheckResult::pass(name, "Found in output")
        } else {
            CheckResult::fail(name, format!("\"{needle}\" not found in output"))
        }
    }
}

/// `json-schema`: JSON extracted from the output conforms to a schema.
pub struct JsonSchemaCheck {
    config: CheckConfig,
}

impl JsonSchemaCheck {
    pub fn new(config: CheckConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Check for JsonSchemaCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::JsonSchema
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult {
        let name = &self.config.description;
        let Some(schema) = &self.config.schema else {
            return CheckResult::fail(name, "No schema specified in check config");
        };
        let Some(data) = extract_json(&ctx.agent_response.output) else {
            return CheckResult::fail(name, "No JSON found in output");
        };

        let validator = match schema::subset_validator(schema) {
            Ok(validator) => validator,
            Err(e) => return CheckResult::fail(name, format!("Invalid schema: {e}")),
        };
        match schema::validate(&validator, &data) {
            Ok(()) => CheckResult::pass(name, "Output matches schema"),
            Err(issues) => CheckResult::fail(
                name,
                format!("Schema validation failed: {}", describe(&issues)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentResponse;
    use serde_json::json;
    use std::path::Path;

    async fn run(check: &dyn Check, config: &CheckConfig, output: &str) -> CheckResult {
        let response = AgentResponse::new(output);
        let ctx = CheckContext {
            agent_response: &response,
            fixture_dir: Path::new("."),
            project_dir: Path::new("."),
            check_config: config,
        };
        check.run(&ctx).await
    }

    #[tokio::test]
    async fn test_contains_is_case_insensitive() {
        let config = CheckConfig::new(CheckKind::Contains, "mentions push").with_value("ENTITIES PUSH");
        let check = ContainsCheck::new(config.clone());
        let result = run(&check, &config, "then run npx base44 entities push").await;
        assert!(result.passed);
        assert_eq!(result.name, "mentions push");
    }

    #[tokio::test]
    async fn test_contains_without_value_fails() {
        let config = CheckConfig::new(CheckKind::Contains, "c");
        let result = run(&ContainsCheck::new(config.clone()), &config, "anything").await;
        assert!(!result.passed);
        assert!(result.details.unwrap().contains("No search value"));
    }

    #[tokio::test]
    async fn test_json_schema_pass_and_missing_required() {
        let config = CheckConfig::new(CheckKind::JsonSchema, "todo json").with_schema(json!({
            "type": "object",
            "properties": {"title": {"type": "string"}},
            "required": ["title"]
        }));
        let check = JsonSchemaCheck::new(config.clone());

        let ok = run(&check, &config, "```json\n{\"title\": \"Buy milk\"}\n```").await;
        assert!(ok.passed);

        let bad = run(&check, &config, "```json\n{\"note\": \"Buy milk\"}\n```").await;
        assert!(!bad.passed);
        let details = bad.details.unwrap();
        assert!(details.starts_with("Schema validation failed: "));
        assert!(details.contains("\"title\""));
    }

    #[tokio::test]
    async fn test_json_schema_without_json_in_output() {
        let config = CheckConfig::new(CheckKind::JsonSchema, "j").with_schema(json!({"type": "object"}));
        let result = run(&JsonSchemaCheck::new(config.clone()), &config, "no data here").await;
        assert!(!result.passed);
        assert_eq!(result.details.as_deref(), Some("No JSON found in output"));
    }
}
