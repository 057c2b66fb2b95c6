//! Shared helpers for skeval integration tests.
#![allow(dead_code)]

use std::path::Path;

use async_trait::async_trait;
use skeval_core::agent::AgentResult;
use skeval_core::{AgentResponse, CodingAgent};

/// Write `content` to `root/rel`, creating parent directories.
pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Entries of `dir` whose name starts with the scratch prefix.
pub fn scratch_leftovers(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(skeval_core::sandbox::SCRATCH_PREFIX))
        .collect()
}

/// Deterministic agent driven by a closure over `(prompt, working_dir)`.
pub struct ScriptedAgent<F> {
    name: String,
    script: F,
}

impl<F> ScriptedAgent<F>
where
    F: Fn(&str, &Path) -> AgentResult<AgentResponse> + Send + Sync,
{
    pub fn new(name: &str, script: F) -> Self {
        Self {
            name: name.to_string(),
            script,
        }
    }
}

#[async_trait]
impl<F> CodingAgent for ScriptedAgent<F>
where
    F: Fn(&str, &Path) -> AgentResult<AgentResponse> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, prompt: &str, working_dir: &Path) -> AgentResult<AgentResponse> {
        (self.script)(prompt, working_dir)
    }
}

/// The `basic-entity` fixture: one prompt, one file-exists check.
pub const BASIC_ENTITY_CONFIG: &str = r#"{
  // Legacy single-prompt shape
  "name": "basic-entity",
  "description": "Create a simple entity",
  "prompt": "Create a Todo entity",
  "expectedSkills": ["base44-cli"],
  "checks": [
    {
      "type": "file-exists",
      "filePath": "base44/entities/todo.jsonc",
      "description": "todo entity file exists"
    }
  ]
}"#;
