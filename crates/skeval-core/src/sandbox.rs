//! Sandboxed execution of one fixture prompt.
//!
//! Each execution gets a private scratch copy of the fixture root. The
//! agent works inside `project/` when the fixture has one, else in the
//! scratch root. Every failure between copying and checking becomes a
//! failed [`FixtureResult`]; the scratch directory is removed on every path.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::future::join_all;
use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;

use crate::agent::{AgentResponse, CodingAgent};
use crate::checks::{CheckContext, CheckRegistry};
use crate::domain::error::Result;
use crate::domain::fixture::ExpandedFixture;
use crate::domain::result::{CheckResult, FixtureResult};
use crate::experiments::{Experiment, INSTRUCTION_FILES, SKILLS_DIR};
use crate::obs;

/// Prefix of every scratch directory name.
pub const SCRATCH_PREFIX: &str = "skeval-";

/// Optional agent working directory inside a fixture.
pub const PROJECT_DIR: &str = "project";

/// Recursively copy `src` into `dest`, keeping symlinks as links.
pub fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in WalkDir::new(src).follow_links(false).min_depth(1) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dest.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = std::fs::read_link(entry.path())?;
            if target.symlink_metadata().is_ok() {
                std::fs::remove_file(&target)?;
            }
            make_symlink(&link, &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn make_symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(link, target)
}

#[cfg(not(unix))]
fn make_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let resolved = target.parent().map(|p| p.join(link)).unwrap_or_else(|| link.to_path_buf());
    std::fs::copy(resolved, target).map(|_| ())
}

fn remove_path(path: &Path) -> io::Result<()> {
    match path.symlink_metadata() {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// An ephemeral working copy of one fixture.
#[derive(Debug)]
pub struct Sandbox {
    dir: TempDir,
    project_dir: PathBuf,
}

impl Sandbox {
    /// Create a scratch directory under `scratch_root` and copy the fixture
    /// into it. A partially built sandbox is removed on error.
    pub async fn materialize(scratch_root: &Path, fixture_dir: &Path) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(scratch_root)?;

        let src = fixture_dir.to_path_buf();
        let dest = dir.path().to_path_buf();
        tokio::task::spawn_blocking(move || copy_tree(&src, &dest))
            .await
            .map_err(io::Error::other)??;

        let candidate = dir.path().join(PROJECT_DIR);
        let project_dir = if tokio::fs::metadata(&candidate)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            candidate
        } else {
            dir.path().to_path_buf()
        };

        Ok(Self { dir, project_dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Apply an experiment overlay to this working copy.
    ///
    /// Instruction files are copied in when the experiment supplies them
    /// and removed otherwise. `project/skills` is replaced by the
    /// experiment's skills when it has any, else by the fixture's own.
    pub async fn apply_overlay(&self, experiment: &Experiment) -> io::Result<()> {
        let project = self.project_dir.clone();
        let fixture_skills = self.root().join(SKILLS_DIR);
        let experiment = experiment.clone();
        tokio::task::spawn_blocking(move || {
            for file in INSTRUCTION_FILES {
                let dest = project.join(file);
                match experiment.instruction_file(file) {
                    Some(src) => {
                        std::fs::copy(src, &dest)?;
                    }
                    None => remove_path(&dest)?,
                }
            }

            let dest = project.join(SKILLS_DIR);
            let source = if experiment.has_skills() {
                Some(experiment.skills_dir())
            } else if fixture_skills.is_dir() && fixture_skills != dest {
                Some(fixture_skills)
            } else {
                None
            };
            if let Some(source) = source {
                remove_path(&dest)?;
                copy_tree(&source, &dest)?;
            }
            Ok::<(), io::Error>(())
        })
        .await
        .map_err(io::Error::other)?
    }

    /// Remove the scratch directory. Failures are logged, never raised.
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            obs::emit_cleanup_failed(&path, &e);
        }
    }
}

/// Run one expanded fixture prompt end to end.
///
/// Never fails: copy errors, overlay errors, agent errors and unknown check
/// types all yield a failed result with `error` set and no checks.
pub async fn run_fixture(
    agent: &dyn CodingAgent,
    registry: &CheckRegistry,
    fixture: &ExpandedFixture,
    scratch_root: &Path,
    overlay: Option<&Experiment>,
) -> FixtureResult {
    let start = Instant::now();

    let result = match Sandbox::materialize(scratch_root, &fixture.fixture_dir).await {
        Ok(sandbox) => {
            debug!(
                fixture = %fixture.name,
                scratch = %sandbox.root().display(),
                project = %sandbox.project_dir().display(),
                "sandbox ready"
            );
            let outcome = execute(agent, registry, fixture, &sandbox, overlay).await;
            sandbox.cleanup();
            let duration_ms = start.elapsed().as_millis() as u64;
            match outcome {
                Ok((response, checks)) => {
                    FixtureResult::completed(fixture, response, checks, duration_ms)
                }
                Err(e) => FixtureResult::errored(fixture, e.to_string(), duration_ms),
            }
        }
        Err(e) => FixtureResult::errored(
            fixture,
            format!("failed to prepare sandbox: {e}"),
            start.elapsed().as_millis() as u64,
        ),
    };

    obs::emit_fixture_finished(&result);
    result
}

async fn execute(
    agent: &dyn CodingAgent,
    registry: &CheckRegistry,
    fixture: &ExpandedFixture,
    sandbox: &Sandbox,
    overlay: Option<&Experiment>,
) -> Result<(AgentResponse, Vec<CheckResult>)> {
    if let Some(experiment) = overlay {
        sandbox.apply_overlay(experiment).await?;
    }

    let checks = fixture
        .checks
        .iter()
        .map(|config| registry.create(config).map(|check| (check, config)))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let response = agent.run(&fixture.prompt, sandbox.project_dir()).await?;
    debug!(
        fixture = %fixture.name,
        skills = ?response.skills_invoked,
        output = %response.output,
        "agent responded"
    );

    let results = join_all(checks.iter().map(|(check, config)| {
        let ctx = CheckContext {
            agent_response: &response,
            fixture_dir: &fixture.fixture_dir,
            project_dir: sandbox.project_dir(),
            check_config: config,
        };
        async move { check.run(&ctx).await }
    }))
    .await;

    Ok((response, results))
}
