//! `command-passes`: an external command exits 0 in the project dir.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{truncate_chars, Check, CheckConfig, CheckContext, CheckKind};
use crate::domain::result::CheckResult;

pub const COMMAND_TIMEOUT_SECS: u64 = 120;
const MAX_DETAIL_CHARS: usize = 500;

pub struct CommandPassesCheck {
    config: CheckConfig,
    timeout: Duration,
}

impl CommandPassesCheck {
    pub fn new(config: CheckConfig) -> Self {
        Self {
            config,
            timeout: Duration::from_secs(COMMAND_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Check for CommandPassesCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::CommandPasses
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult {
        let name = &self.config.description;
        let Some(command) = self.config.command.as_deref().filter(|c| !c.trim().is_empty()) else {
            return CheckResult::fail(name, "No command specified in check config");
        };
        let mut parts = command.split_whitespace();
        let Some(program) = parts.next() else {
            return CheckResult::fail(name, "No command specified in check config");
        };

        debug!(command, cwd = %ctx.project_dir.display(), "running check command");

        let child = Command::new(program)
            .args(parts)
            .current_dir(ctx.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => return CheckResult::fail(name, format!("Command failed: {e}")),
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return CheckResult::fail(name, format!("Command failed: {e}")),
            Err(_) => {
                return CheckResult::fail(
                    name,
                    format!(
                        "Command failed: timed out after {} seconds",
                        self.timeout.as_secs()
                    ),
                )
            }
        };

        if output.status.success() {
            return CheckResult::pass(name, format!("Command \"{command}\" passed"));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stream = if stderr.is_empty() { stdout } else { stderr };
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        CheckResult::fail(
            name,
            truncate_chars(
                &format!("Command \"{command}\" failed with exit code {code}: {stream}"),
                MAX_DETAIL_CHARS,
            ),
        )
    }
}
