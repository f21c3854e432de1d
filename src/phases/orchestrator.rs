//! Orchestrator for a complete build
//!
//! This module coordinates all phases to provide a clean API for resolving a
//! project into a [`BuildPlan`].

use std::path::{Path, PathBuf};

use log::info;

use super::{phase1, phase2, phase3, phase4, BuildPlan};
use crate::context::BuildContext;
use crate::error::{Error, Result, ResultExt};
use crate::manifest::Scope;
use crate::options::SpecifyMap;
use crate::workspace::WorkspaceSettings;

/// Inputs of a build besides the project directory.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Workspace profile to activate.
    pub profile: Option<String>,
    /// Explicit option values for the root project.
    pub specify: SpecifyMap,
    /// Overrides the workspace cache root.
    pub cache_root: Option<PathBuf>,
}

/// Resolve the project at `project_dir` with workspace settings discovered
/// from its directory.
pub fn build(project_dir: &Path, options: &BuildOptions) -> Result<BuildPlan> {
    let display = project_dir.display().to_string();
    let settings = WorkspaceSettings::discover(
        project_dir,
        options.profile.as_deref(),
        options.cache_root.clone(),
    )
    .context("load workspace settings", &[("project", display.as_str())])?;
    let mut ctx = BuildContext::new(settings, options.specify.clone());
    execute(&mut ctx, project_dir)
}

/// Execute every phase against a fresh context.
///
/// 1. Load the root project and resolve its options
/// 2. Discover the script closure, then the config closure
/// 3. Collect script files and config sources (imports first, root last)
/// 4. Sort config sources into merge order
/// 5. Fold them into the composite config tree
pub fn execute(ctx: &mut BuildContext, project_dir: &Path) -> Result<BuildPlan> {
    let root_path = ctx.load_root(project_dir)?;

    // Phase 1: Discovery
    let script_closure = phase1::execute(ctx, Scope::Script)?;
    let config_closure = phase1::execute(ctx, Scope::Config)?;

    // Phase 2: Source Collection
    let mut script_projects = script_closure.project_paths();
    script_projects.push(root_path.clone());
    let scripts = phase2::collect_scripts(ctx, &script_projects)?;

    let mut config_projects = config_closure.project_paths();
    config_projects.push(root_path.clone());
    let sources = phase2::collect_config(ctx, &config_projects)?;

    // Phase 3: Ordering
    let config_sources = phase3::execute(sources);

    // Phase 4: Composite
    let config = phase4::execute(&config_sources)?;

    let root = ctx
        .root()
        .map(|project| project.name.clone())
        .ok_or_else(|| Error::Resolution {
            key: root_path.display().to_string(),
            message: "root project vanished from the build context".to_string(),
        })?;
    info!(
        "Resolved {}: {} projects, {} scripts, {} config sources",
        root,
        ctx.project_count(),
        scripts.len(),
        config_sources.len()
    );

    Ok(BuildPlan {
        root,
        root_path,
        options: ctx.results.clone(),
        assigns: ctx.assigns.clone(),
        script_closure,
        config_closure,
        scripts,
        config_sources,
        config,
    })
}
