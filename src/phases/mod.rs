//! Implementation of the phases of a bundlekit build.
//!
//! ## Overview
//!
//! A build follows 4 phases after the root project is loaded:
//! 1. Discovery - Walk the script and config import closures, loading and
//!    option-resolving every reached project once
//! 2. Source Collection - Expand each project's source globs
//! 3. Ordering - Stable sort of config sources by their declared `order`
//! 4. Composite - Fold the ordered config sources into one tree
//!
//! All phases share one [`BuildContext`](crate::context::BuildContext); each
//! phase depends only on the previous ones.

use std::path::PathBuf;

use serde::Serialize;
use serde_yaml::Value as YamlValue;

use crate::manifest::Scope;
use crate::merge::MergeModes;
use crate::options::{AssignTable, Results};
use crate::resolver::ResolvedLink;

pub mod composite;
pub mod discovery;
pub mod orchestrator;
pub mod ordering;
pub mod sources;

pub use composite as phase4;
pub use discovery as phase1;
pub use ordering as phase3;
pub use sources as phase2;

/// One accepted import in a closure.
#[derive(Debug, Clone)]
pub struct ImportEdge {
    /// Name of the project declaring the import.
    pub owner: String,
    pub target: ResolvedLink,
    /// Name of the imported project.
    pub project: String,
    /// Canonical path of the imported project.
    pub project_path: PathBuf,
    /// Number of hops from the root.
    pub depth: usize,
}

/// The transitive imports of the root for one scope, in first-discovery order.
#[derive(Debug, Clone)]
pub struct Closure {
    pub scope: Scope,
    pub edges: Vec<ImportEdge>,
}

impl Closure {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            edges: Vec::new(),
        }
    }

    /// Imported project paths in discovery order.
    pub fn project_paths(&self) -> Vec<PathBuf> {
        self.edges.iter().map(|e| e.project_path.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// A script file contributed by a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptFile {
    pub project: String,
    pub path: PathBuf,
    /// Path relative to the declaring source directory.
    pub relative: PathBuf,
}

/// A parsed config source file.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub project: String,
    pub path: PathBuf,
    pub order: i64,
    pub modes: MergeModes,
    pub values: YamlValue,
}

/// Everything a materializer needs to produce a bundle.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub root: String,
    pub root_path: PathBuf,
    pub options: Results,
    pub assigns: AssignTable,
    pub script_closure: Closure,
    pub config_closure: Closure,
    pub scripts: Vec<ScriptFile>,
    /// Config sources in merge order.
    pub config_sources: Vec<ConfigSource>,
    pub config: YamlValue,
}
