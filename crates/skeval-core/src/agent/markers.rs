//! Skill detection by output pattern matching.

use std::collections::BTreeSet;

use regex::{Regex, RegexBuilder};

use super::error::{AgentError, AgentResult};

const BASE44_CLI: &[&str] = &[
    // CLI commands
    r"base44\s+(entities|functions|agents)\s+(push|deploy|pull|create)",
    r"npx\s+base44",
    r"yarn\s+base44",
    r"pnpm\s+base44",
    // File paths
    r"base44/entities/[\w-]+\.jsonc",
    r"base44/functions/[\w-]+/",
    r"base44/agents/[\w_]+\.jsonc",
    r"`base44/entities/",
    r"`base44/functions/",
    r"`base44/agents/",
    // Config files
    r"function\.jsonc",
    r"\.jsonc.*entity|entity.*\.jsonc",
    // Deno functions
    r"Deno\.serve",
    r"createClientFromRequest",
    r"npm:@base44/sdk",
    r"entities\s+push",
    r"functions\s+deploy",
    r"agents\s+push",
    // Agent configs
    r"tool_configs",
    r"entity_name.*allowed_operations|allowed_operations.*entity_name",
    r#"function_name.*description|"function_name""#,
];

const BASE44_SDK: &[&str] = &[
    r"@base44/sdk",
    r#"from\s+['"]@base44/sdk['"]"#,
    r"import.*createClient.*from.*@base44/sdk",
    r"base44\.entities\.\w+\.(create|list|filter|update|delete|get|subscribe)",
    r"entities\.[A-Z]\w*\.(create|list|filter|update|delete|get|subscribe)",
    r"\.entities\.\w+\.list\(\)",
    r"\.entities\.\w+\.create\(",
    r"\.entities\.\w+\.update\(",
    r"integrations\.Core\.",
    r"SendEmail|InvokeLLM|UploadFile|GenerateImage",
    r"base44\.auth\.",
    r"base44\.functions\.invoke",
    r"functions\.invoke",
    r"base44\.agents\.",
    r"\.agents\.createConversation",
    r"\.agents\.addMessage",
    r"\.agents\.subscribeToConversation",
    r"\.agents\.getConversation",
    r"createConversation.*agent_name|agent_name.*createConversation",
    r"addMessage.*role.*content|role.*user.*content",
    r"subscribeToConversation",
    r"asServiceRole",
];

/// Ordered table of `skill -> patterns`. A skill is detected when any of
/// its patterns matches (case-insensitive).
#[derive(Debug, Clone)]
pub struct SkillMarkers {
    skills: Vec<(String, Vec<Regex>)>,
}

impl SkillMarkers {
    pub fn new(table: &[(&str, &[&str])]) -> AgentResult<Self> {
        let mut skills = Vec::with_capacity(table.len());
        for (skill, patterns) in table {
            let compiled = patterns
                .iter()
                .map(|p| {
                    RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .map_err(|source| AgentError::InvalidMarker {
                            skill: skill.to_string(),
                            source,
                        })
                })
                .collect::<AgentResult<Vec<_>>>()?;
            skills.push((skill.to_string(), compiled));
        }
        Ok(Self { skills })
    }

    /// Markers for the `base44-cli` and `base44-sdk` skills.
    pub fn base44() -> AgentResult<Self> {
        Self::new(&[("base44-cli", BASE44_CLI), ("base44-sdk", BASE44_SDK)])
    }

    pub fn detect(&self, output: &str) -> BTreeSet<String> {
        self.skills
            .iter()
            .filter(|(_, patterns)| patterns.iter().any(|re| re.is_match(output)))
            .map(|(skill, _)| skill.clone())
            .collect()
    }
}
