//! # Build Context
//!
//! All mutable state of one build lives in a [`BuildContext`]: the project
//! arena (keyed by canonical, symlink-resolved path), the project name index,
//! the option [`Results`] table and the [`AssignTable`]. The context is passed
//! by reference through every phase, so two builds in the same process never
//! share state.
//!
//! A project is loaded, validated and option-resolved exactly once per build,
//! the first time any import reaches its directory. Later imports of the same
//! directory observe the same resolved state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{Error, Result, ResultExt};
use crate::expr::{BasicEvaluator, Env, Evaluator};
use crate::git::{GitProvider, SystemGit};
use crate::link::Link;
use crate::manifest::{self, Manifest};
use crate::options::{AssignTable, OptionResolver, ResolvedOptions, Results, SpecifyMap};
use crate::resolver::{LinkResolver, ResolvedLink};
use crate::workspace::WorkspaceSettings;

/// A loaded project with its options resolved.
#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    /// Canonical project directory.
    pub path: PathBuf,
    pub manifest: Manifest,
    pub options: ResolvedOptions,
}

impl Project {
    /// The environment match expressions of this project are evaluated in.
    pub fn env(&self) -> Env {
        self.options.env()
    }
}

/// Per-build state and collaborators.
pub struct BuildContext {
    settings: WorkspaceSettings,
    evaluator: Box<dyn Evaluator>,
    git: Box<dyn GitProvider>,
    specify: SpecifyMap,
    projects: BTreeMap<PathBuf, Project>,
    names: BTreeMap<String, PathBuf>,
    root: Option<PathBuf>,
    /// Git checkouts already brought up to date during this build.
    fetched: BTreeSet<PathBuf>,
    pub results: Results,
    pub assigns: AssignTable,
}

impl BuildContext {
    /// Creates a context with the default evaluator and the system git provider.
    pub fn new(settings: WorkspaceSettings, specify: SpecifyMap) -> Self {
        Self::with_collaborators(
            settings,
            specify,
            Box::new(BasicEvaluator::new()),
            Box::new(SystemGit),
        )
    }

    /// Creates a context with custom collaborators.
    pub fn with_collaborators(
        settings: WorkspaceSettings,
        specify: SpecifyMap,
        evaluator: Box<dyn Evaluator>,
        git: Box<dyn GitProvider>,
    ) -> Self {
        Self {
            settings,
            evaluator,
            git,
            specify,
            projects: BTreeMap::new(),
            names: BTreeMap::new(),
            root: None,
            fetched: BTreeSet::new(),
            results: Results::new(),
            assigns: AssignTable::new(),
        }
    }

    pub fn settings(&self) -> &WorkspaceSettings {
        &self.settings
    }

    pub fn evaluator(&self) -> &dyn Evaluator {
        self.evaluator.as_ref()
    }

    /// Load the build's root project. Specify values apply to it only.
    pub fn load_root(&mut self, dir: &Path) -> Result<PathBuf> {
        if let Some(root) = &self.root {
            return Err(Error::Validation {
                field: "root".to_string(),
                value: dir.display().to_string(),
                message: format!("root already loaded from {}", root.display()),
            });
        }
        let path = canonicalize(dir)?;
        self.root = Some(path.clone());
        self.load_project(&path)
    }

    pub fn root_path(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn root(&self) -> Option<&Project> {
        self.root.as_ref().and_then(|path| self.projects.get(path))
    }

    pub fn project(&self, path: &Path) -> Option<&Project> {
        self.projects.get(path)
    }

    /// Look a project up by name.
    pub fn project_named(&self, name: &str) -> Option<&Project> {
        self.names.get(name).and_then(|path| self.projects.get(path))
    }

    /// Number of distinct projects loaded so far.
    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    /// Load the project at canonical `path`, resolving its options, unless it
    /// is already in the arena.
    pub fn load_project(&mut self, path: &Path) -> Result<PathBuf> {
        if self.projects.contains_key(path) {
            return Ok(path.to_path_buf());
        }

        let display = path.display().to_string();
        let manifest =
            manifest::from_dir(path).context("load project", &[("path", display.as_str())])?;

        if let Some(existing) = self.names.get(&manifest.name) {
            if existing != path {
                return Err(Error::Validation {
                    field: "name".to_string(),
                    value: manifest.name.clone(),
                    message: format!(
                        "project name is used by both {} and {}",
                        existing.display(),
                        display
                    ),
                });
            }
        }

        let is_root = self.root.as_deref() == Some(path);
        let specify = is_root.then_some(&self.specify);
        let options = OptionResolver::new(self.evaluator.as_ref())
            .resolve_project(
                &manifest.name,
                &manifest.option,
                specify,
                &mut self.results,
                &mut self.assigns,
            )
            .context(
                "resolve options",
                &[("project", manifest.name.as_str()), ("path", display.as_str())],
            )?;

        if is_root {
            for key in self.specify.keys() {
                let addressed_here = match key.split_once('.') {
                    Some((project, _)) => project == manifest.name,
                    None => true,
                };
                if !addressed_here {
                    debug!("Ignoring specify value {} for a non-root project", key);
                }
            }
        }

        info!("Loaded project {} from {}", manifest.name, display);
        self.names.insert(manifest.name.clone(), path.to_path_buf());
        self.projects.insert(
            path.to_path_buf(),
            Project {
                name: manifest.name.clone(),
                path: path.to_path_buf(),
                manifest,
                options,
            },
        );
        Ok(path.to_path_buf())
    }

    /// Resolve a link written in `owner`.
    pub fn resolve_link(&self, link: &Link, owner: &Project) -> Result<ResolvedLink> {
        LinkResolver::new(&self.settings, self.evaluator.as_ref()).resolve(
            link,
            &owner.path,
            &owner.name,
        )
    }

    /// Make a resolved link's directory available and return its canonical path.
    ///
    /// Each git checkout is handed to the provider at most once per build;
    /// later imports of the same url and ref reuse the first fetch.
    pub fn fetch(&mut self, resolved: &ResolvedLink) -> Result<PathBuf> {
        if let Some(git) = &resolved.git {
            if self.fetched.contains(&git.checkout) {
                debug!("Reusing checkout {}", git.checkout.display());
            } else {
                self.git
                    .ensure_cloned(&git.url, &git.git_ref, &git.checkout)
                    .context("fetch git project", &[("url", git.url.as_str())])?;
                self.fetched.insert(git.checkout.clone());
            }
        }
        canonicalize(&resolved.path)
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    let display = path.display().to_string();
    std::fs::canonicalize(path).context("canonicalize project path", &[("path", display.as_str())])
}
