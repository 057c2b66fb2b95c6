//! Fixture discovery and prompt expansion.
//!
//! A directory is a fixture root iff it directly contains `eval.json`.
//! Fixture roots are never descended into and hidden directories are
//! skipped. Expansion turns each root into one [`FixtureUnit`] per declared
//! prompt, or a single invalid unit when its config cannot be loaded.

use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::checks::jsonc::strip_comments;
use crate::domain::error::{EvalError, Result};
use crate::domain::fixture::{EvalConfig, ExpandedFixture, EVAL_CONFIG_FILE};

/// Suite key used for fixtures sitting directly at the fixtures root.
pub const DEFAULT_SUITE: &str = "default";

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Recursively find fixture roots under `root`, sorted lexicographically.
///
/// A missing `root` yields an empty list. Any other unreadable directory is
/// a [`EvalError::Discovery`].
pub fn discover_fixtures(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        debug!(root = %root.display(), "fixtures directory does not exist");
        return Ok(Vec::new());
    }

    let mut fixtures = Vec::new();
    let mut walker = WalkDir::new(root).follow_links(false).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| EvalError::Discovery {
            path: e.path().unwrap_or(root).to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        if entry.depth() > 0 && is_hidden(entry.file_name()) {
            walker.skip_current_dir();
            continue;
        }
        if entry.path().join(EVAL_CONFIG_FILE).is_file() {
            walker.skip_current_dir();
            fixtures.push(entry.into_path());
        }
    }

    fixtures.sort();
    Ok(fixtures)
}

/// Load `eval.json` from a fixture root. Comments are tolerated.
pub fn load_eval_config(fixture_dir: &Path) -> Result<EvalConfig> {
    let path = fixture_dir.join(EVAL_CONFIG_FILE);
    let content = std::fs::read_to_string(&path).map_err(|source| EvalError::ConfigRead {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(strip_comments(&content).trim())
        .map_err(|source| EvalError::ConfigParse { path, source })
}

/// First path segment of `fixture_dir` beneath `root`; `"default"` for the
/// root itself.
pub fn suite_key(root: &Path, fixture_dir: &Path) -> String {
    fixture_dir
        .strip_prefix(root)
        .ok()
        .and_then(|rel| match rel.components().next() {
            Some(Component::Normal(seg)) => Some(seg.to_string_lossy().into_owned()),
            _ => None,
        })
        .unwrap_or_else(|| DEFAULT_SUITE.to_string())
}

/// Name list and pattern used to narrow the expanded prompt set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixtureFilter {
    /// Keep a prompt when the fixture dir base name or the prompt name
    /// equals or contains any of these.
    pub names: Vec<String>,
    /// Case-insensitive substring over fixture path or prompt name.
    pub pattern: Option<String>,
}

impl FixtureFilter {
    pub fn new(names: Vec<String>, pattern: Option<String>) -> Self {
        Self { names, pattern }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.pattern.as_deref().map_or(true, str::is_empty)
    }

    /// Test a fixture directory and a prompt name against the filter.
    pub fn accepts(&self, fixture_dir: &Path, prompt_name: &str) -> bool {
        let base = fixture_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let by_name = self.names.is_empty()
            || self.names.iter().any(|n| {
                base == *n || base.contains(n.as_str()) || prompt_name == n || prompt_name.contains(n.as_str())
            });

        let by_pattern = match self.pattern.as_deref().filter(|p| !p.is_empty()) {
            None => true,
            Some(p) => {
                let p = p.to_lowercase();
                fixture_dir.to_string_lossy().to_lowercase().contains(&p)
                    || prompt_name.to_lowercase().contains(&p)
            }
        };

        by_name && by_pattern
    }
}

/// One schedulable unit in discovery order.
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureUnit {
    /// A runnable prompt.
    Prompt(ExpandedFixture),
    /// A fixture whose `eval.json` failed to load; reported as failed.
    Invalid {
        fixture_dir: PathBuf,
        suite: String,
        error: String,
    },
}

impl FixtureUnit {
    pub fn suite(&self) -> &str {
        match self {
            FixtureUnit::Prompt(f) => &f.suite,
            FixtureUnit::Invalid { suite, .. } => suite,
        }
    }

    pub fn name(&self) -> String {
        match self {
            FixtureUnit::Prompt(f) => f.name.clone(),
            FixtureUnit::Invalid { fixture_dir, .. } => fixture_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

/// Expand discovered fixture roots into filtered units, preserving order.
pub fn expand_fixtures(root: &Path, fixture_dirs: &[PathBuf], filter: &FixtureFilter) -> Vec<FixtureUnit> {
    let mut units = Vec::new();
    for dir in fixture_dirs {
        let suite = suite_key(root, dir);
        match load_eval_config(dir) {
            Ok(config) => {
                let prompts = config.expand(dir, &suite);
                if prompts.is_empty() {
                    debug!(fixture = %dir.display(), "fixture declares no prompts, skipping");
                }
                units.extend(
                    prompts
                        .into_iter()
                        .filter(|p| filter.accepts(dir, &p.name))
                        .map(FixtureUnit::Prompt),
                );
            }
            Err(e) => {
                let unit = FixtureUnit::Invalid {
                    fixture_dir: dir.clone(),
                    suite,
                    error: e.to_string(),
                };
                if filter.accepts(dir, &unit.name()) {
                    units.push(unit);
                }
            }
        }
    }
    units
}
