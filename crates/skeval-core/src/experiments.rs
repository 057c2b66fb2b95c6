//! Experiment overlays.
//!
//! An experiment is a non-hidden subdirectory of the experiments dir. It may
//! supply instruction files (`CLAUDE.md`, `AGENTS.md`) and a `skills/`
//! directory that replace the fixture's own when the overlay is applied to a
//! sandbox copy.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::{EvalError, Result};

/// Instruction files an overlay may supply or clear.
pub const INSTRUCTION_FILES: [&str; 2] = ["CLAUDE.md", "AGENTS.md"];

/// Skills directory name, both in experiments and in fixtures.
pub const SKILLS_DIR: &str = "skills";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    pub name: String,
    pub dir: PathBuf,
    /// Instruction files present in the experiment, in [`INSTRUCTION_FILES`] order.
    pub instruction_files: Vec<String>,
    /// Skill directory names under `skills/`, sorted.
    pub skills: Vec<String>,
}

impl Experiment {
    /// Inspect an experiment directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let instruction_files = INSTRUCTION_FILES
            .iter()
            .filter(|f| dir.join(f).is_file())
            .map(|f| f.to_string())
            .collect();
        let skills = list_skills(&dir.join(SKILLS_DIR))?;
        Ok(Self {
            name,
            dir: dir.to_path_buf(),
            instruction_files,
            skills,
        })
    }

    /// Path of an instruction file when the experiment supplies it.
    pub fn instruction_file(&self, file: &str) -> Option<PathBuf> {
        self.instruction_files
            .iter()
            .any(|f| f == file)
            .then(|| self.dir.join(file))
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.dir.join(SKILLS_DIR)
    }

    pub fn has_skills(&self) -> bool {
        !self.skills.is_empty()
    }

    /// Human-readable list of what the overlay provides.
    pub fn contents(&self) -> Vec<String> {
        self.instruction_files
            .iter()
            .chain(self.skills.iter())
            .cloned()
            .collect()
    }
}

/// Non-hidden subdirectory names of `dir`, sorted. Missing `dir` is empty.
pub(crate) fn list_skills(dir: &Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() && !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Discover experiments, sorted by name. A missing directory yields none.
pub fn discover_experiments(experiments_dir: &Path) -> Result<Vec<Experiment>> {
    list_skills(experiments_dir)?
        .iter()
        .map(|name| Experiment::load(&experiments_dir.join(name)))
        .collect()
}

/// Keep experiments whose name contains `pattern` (case-insensitive).
pub fn filter_experiments(experiments: Vec<Experiment>, pattern: &str) -> Vec<Experiment> {
    let pattern = pattern.to_lowercase();
    experiments
        .into_iter()
        .filter(|e| e.name.to_lowercase().contains(&pattern))
        .collect()
}

/// Discover and filter, failing when nothing is left to compare.
pub fn select_experiments(experiments_dir: &Path, pattern: Option<&str>) -> Result<Vec<Experiment>> {
    let experiments = discover_experiments(experiments_dir)?;
    if experiments.is_empty() {
        return Err(EvalError::NoExperiments(experiments_dir.to_path_buf()));
    }
    match pattern.filter(|p| !p.is_empty()) {
        Some(p) => {
            let filtered = filter_experiments(experiments, p);
            if filtered.is_empty() {
                return Err(EvalError::NoExperimentsMatch(p.to_string()));
            }
            Ok(filtered)
        }
        None => Ok(experiments),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_discover_sorted_non_hidden_with_contents() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("with-skills/skills/base44-cli/SKILL.md"));
        touch(&root.join("with-skills/CLAUDE.md"));
        touch(&root.join("baseline/AGENTS.md"));
        touch(&root.join(".hidden/CLAUDE.md"));
        touch(&root.join("notes.txt"));

        let found = discover_experiments(root).unwrap();
        let names: Vec<_> = found.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["baseline", "with-skills"]);
        assert_eq!(found[0].instruction_files, vec!["AGENTS.md"]);
        assert!(!found[0].has_skills());
        assert_eq!(found[1].contents(), vec!["CLAUDE.md", "base44-cli"]);
        assert!(found[1].instruction_file("AGENTS.md").is_none());
    }

    #[test]
    fn test_missing_dir_has_no_experiments() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_experiments(&dir.path().join("nope")).unwrap().is_empty());
        assert!(matches!(
            select_experiments(&dir.path().join("nope"), None),
            Err(EvalError::NoExperiments(_))
        ));
    }

    #[test]
    fn test_filter_is_case_insensitive_and_empty_match_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Baseline")).unwrap();
        std::fs::create_dir_all(dir.path().join("terse-claude-md")).unwrap();

        let picked = select_experiments(dir.path(), Some("BASE")).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "Baseline");

        assert!(matches!(
            select_experiments(dir.path(), Some("zzz")),
            Err(EvalError::NoExperimentsMatch(p)) if p == "zzz"
        ));
    }
}
