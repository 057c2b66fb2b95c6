//! Agent adapter that shells out to a coding-agent CLI.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use tracing::debug;

use super::error::{AgentError, AgentResult};
use super::markers::SkillMarkers;
use super::{AgentResponse, CodingAgent};

/// Default ceiling for one agent invocation.
pub const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 300;

/// Configuration for [`CliAgent`].
#[derive(Debug, Clone)]
pub struct CliAgentConfig {
    /// Reported agent identity.
    pub name: String,
    /// Command line; the prompt is appended as the final argument.
    pub command: Vec<String>,
    /// Timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CliAgentConfig {
    fn default() -> Self {
        Self {
            name: "claude-code".to_string(),
            command: vec!["claude".to_string(), "-p".to_string()],
            timeout_secs: DEFAULT_AGENT_TIMEOUT_SECS,
        }
    }
}

/// Runs `<command...> <prompt>` in the working directory and detects
/// skills from its stdout.
pub struct CliAgent {
    config: CliAgentConfig,
    markers: SkillMarkers,
}

impl CliAgent {
    pub fn new(config: CliAgentConfig) -> AgentResult<Self> {
        Self::with_markers(config, SkillMarkers::base44()?)
    }

    pub fn with_markers(config: CliAgentConfig, markers: SkillMarkers) -> AgentResult<Self> {
        if config.command.is_empty() {
            return Err(AgentError::EmptyCommand);
        }
        Ok(Self { config, markers })
    }

    fn respond(&self, output: String, metadata: serde_json::Value) -> AgentResponse {
        let skills_invoked = self.markers.detect(&output);
        let metadata = match metadata {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        AgentResponse {
            output,
            skills_invoked,
            metadata,
        }
    }
}

#[async_trait]
impl CodingAgent for CliAgent {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn run(&self, prompt: &str, working_dir: &Path) -> AgentResult<AgentResponse> {
        let start = Instant::now();
        let exe = &self.config.command[0];
        let args = &self.config.command[1..];

        debug!(agent = %self.config.name, cwd = %working_dir.display(), "spawning agent");

        let child = match Command::new(exe)
            .args(args)
            .arg(prompt)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let msg = format!("failed to spawn {exe}: {e}");
                return Ok(self.respond(
                    format!("Error running {}: {msg}", self.config.name),
                    json!({ "error": msg }),
                ));
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                let msg = e.to_string();
                return Ok(self.respond(
                    format!("Error running {}: {msg}", self.config.name),
                    json!({ "error": msg }),
                ));
            }
            Err(_) => {
                let msg = format!("timed out after {} seconds", self.config.timeout_secs);
                return Ok(self.respond(
                    format!("Error running {}: {msg}", self.config.name),
                    json!({ "error": msg, "timedOut": true }),
                ));
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        debug!(
            agent = %self.config.name,
            exit_code,
            duration_ms,
            output_len = stdout.len(),
            "agent finished"
        );

        if output.status.success() {
            return Ok(self.respond(
                stdout,
                json!({ "exitCode": exit_code, "durationMs": duration_ms }),
            ));
        }

        let error = format!("exited with code {exit_code}");
        let text = if !stdout.is_empty() {
            stdout
        } else if !stderr.is_empty() {
            stderr
        } else {
            format!("Error running {}: {error}", self.config.name)
        };
        Ok(self.respond(
            text,
            json!({ "exitCode": exit_code, "durationMs": duration_ms, "error": error }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(command: &[&str], timeout_secs: u64) -> CliAgent {
        CliAgent::new(CliAgentConfig {
            name: "test-cli".to_string(),
            command: command.iter().map(|s| s.to_string()).collect(),
            timeout_secs,
        })
        .expect("build agent")
    }

    #[test]
    fn test_empty_command_rejected() {
        let config = CliAgentConfig {
            command: vec![],
            ..Default::default()
        };
        assert!(matches!(CliAgent::new(config), Err(AgentError::EmptyCommand)));
    }

    #[tokio::test]
    async fn test_prompt_is_passed_as_last_argument() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(&["echo"], 10);
        let response = agent
            .run("run npx base44 entities push", dir.path())
            .await
            .unwrap();
        assert!(response.output.contains("npx base44 entities push"));
        assert!(response.skills_invoked.contains("base44-cli"));
        assert_eq!(response.metadata.get("exitCode"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn test_failing_command_returns_error_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(&["false"], 10);
        let response = agent.run("anything", dir.path()).await.unwrap();
        assert!(response.metadata.contains_key("error"));
        assert!(response.output.contains("exited with code"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(&["definitely-not-a-real-binary-skeval"], 10);
        let response = agent.run("p", dir.path()).await.unwrap();
        assert!(response.metadata.contains_key("error"));
        assert!(response.skills_invoked.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_reported_in_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(&["sleep"], 1);
        let response = agent.run("5", dir.path()).await.unwrap();
        assert_eq!(response.metadata.get("timedOut"), Some(&json!(true)));
    }
}
