//! Checks over files in the agent working directory.

use std::path::PathBuf;

use async_trait::async_trait;
use regex::RegexBuilder;

use super::jsonc::parse_jsonc;
use super::{Check, CheckConfig, CheckContext, CheckKind};
use crate::domain::result::CheckResult;

const NO_FILE_PATH: &str = "No file path specified in check config";

fn resolve<'a>(config: &'a CheckConfig, ctx: &CheckContext<'_>) -> Option<(&'a str, PathBuf)> {
    config
        .file_path
        .as_deref()
        .map(|rel| (rel, ctx.project_dir.join(rel)))
}

/// Case-insensitive regex test; compile errors become failed details.
fn regex_matches(pattern: &str, content: &str) -> Result<bool, String> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map(|re| re.is_match(content))
        .map_err(|e| format!("Invalid pattern \"{pattern}\": {e}"))
}

/// `file-exists`
pub struct FileExistsCheck {
    config: CheckConfig,
}

impl FileExistsCheck {
    pub fn new(config: CheckConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Check for FileExistsCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::FileExists
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult {
        let name = &self.config.description;
        let Some((rel, path)) = resolve(&self.config, ctx) else {
            return CheckResult::fail(name, NO_FILE_PATH);
        };
        if tokio::fs::metadata(&path).await.is_ok() {
            CheckResult::pass(name, format!("File exists: {rel}"))
        } else {
            CheckResult::fail(name, format!("File not found: {rel}"))
        }
    }
}

/// `file-content`: `pattern` (regex) takes precedence over `value`
/// (case-sensitive substring).
pub struct FileContentCheck {
    config: CheckConfig,
}

impl FileContentCheck {
    pub fn new(config: CheckConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Check for FileContentCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::FileContent
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult {
        let name = &self.config.description;
        let Some((rel, path)) = resolve(&self.config, ctx) else {
            return CheckResult::fail(name, NO_FILE_PATH);
        };
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => return CheckResult::fail(name, format!("Failed to read file: {e}")),
        };

        if let Some(pattern) = self.config.pattern.as_deref().filter(|p| !p.is_empty()) {
            return match regex_matches(pattern, &content) {
                Ok(true) => CheckResult::pass(name, format!("Pattern \"{pattern}\" found in {rel}")),
                Ok(false) => {
                    CheckResult::fail(name, format!("Pattern \"{pattern}\" not found in {rel}"))
                }
                Err(detail) => CheckResult::fail(name, detail),
            };
        }

        if let Some(value) = self.config.value.as_deref().filter(|v| !v.is_empty()) {
            let found = content.contains(value);
            return CheckResult::verdict(
                name,
                found,
                if found {
                    format!("\"{value}\" found in {rel}")
                } else {
                    format!("\"{value}\" not found in {rel}")
                },
            );
        }

        CheckResult::fail(name, "No pattern or value specified for content check")
    }
}

/// `file-content-excluded`: regex must not match. An unreadable file fails.
pub struct FileContentExcludedCheck {
    config: CheckConfig,
}

impl FileContentExcludedCheck {
    pub fn new(config: CheckConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Check for FileContentExcludedCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::FileContentExcluded
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult {
        let name = &self.config.description;
        let Some((rel, path)) = resolve(&self.config, ctx) else {
            return CheckResult::fail(name, NO_FILE_PATH);
        };
        let Some(pattern) = self.config.pattern.as_deref().filter(|p| !p.is_empty()) else {
            return CheckResult::fail(name, "No pattern specified for excluded content check");
        };
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => return CheckResult::fail(name, format!("Failed to read file: {e}")),
        };

        match regex_matches(pattern, &content) {
            Ok(true) => CheckResult::fail(
                name,
                format!("Pattern \"{pattern}\" was found in {rel} (should be absent)"),
            ),
            Ok(false) => CheckResult::pass(
                name,
                format!("Pattern \"{pattern}\" correctly absent from {rel}"),
            ),
            Err(detail) => CheckResult::fail(name, detail),
        }
    }
}

/// `valid-json`: file parses as JSON once comments are stripped.
pub struct ValidJsonCheck {
    config: CheckConfig,
}

impl ValidJsonCheck {
    pub fn new(config: CheckConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Check for ValidJsonCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::ValidJson
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult {
        let name = &self.config.description;
        let Some((rel, path)) = resolve(&self.config, ctx) else {
            return CheckResult::fail(name, NO_FILE_PATH);
        };
        let parsed = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| e.to_string())
            .and_then(|content| parse_jsonc(&content).map_err(|e| e.to_string()));

        match parsed {
            Ok(_) => CheckResult::pass(name, format!("Valid JSON in {rel}")),
            Err(e) => CheckResult::fail(name, format!("Invalid JSON in {rel}: {e}")),
        }
    }
}
