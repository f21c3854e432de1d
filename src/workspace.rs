//! # Workspace Settings
//!
//! Workspace settings hold everything link resolution needs beyond the link
//! itself: the registry that maps short names to real links, the redirect
//! rules that rewrite resolved links (typically to point a git dependency at
//! a local working copy), named profiles that layer their own registry entries
//! and redirects on top, and the root of the git checkout cache.
//!
//! Settings live in an optional `bundle-workspace.yaml`, looked up from the
//! root project's directory upwards.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expr::Env;
use crate::manifest::{parse_as, Format};

/// The settings file name.
pub const WORKSPACE_FILE: &str = "bundle-workspace.yaml";

/// A named link, optionally gated by a match expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryEntry {
    pub name: String,
    /// A `dir:` or `git:` link.
    pub link: String,
    #[serde(default, rename = "match")]
    pub match_expr: Option<String>,
}

/// Rewrites links whose lookup key matches `pattern`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedirectDecl {
    pub pattern: String,
    #[serde(default, rename = "match")]
    pub match_expr: Option<String>,
    /// Target link template; `${0}`, `${1}`... and named captures are bound.
    pub link: String,
}

/// A compiled redirect rule.
#[derive(Debug, Clone)]
pub struct RedirectRule {
    pub regex: Regex,
    pub match_expr: Option<String>,
    pub link: String,
}

impl RedirectRule {
    pub fn compile(decl: &RedirectDecl) -> Result<Self> {
        Ok(Self {
            regex: Regex::new(&decl.pattern)?,
            match_expr: decl.match_expr.clone(),
            link: decl.link.clone(),
        })
    }
}

/// Registry entries, redirects and variables selected by `--profile`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    #[serde(default)]
    pub registry: Vec<RegistryEntry>,
    #[serde(default)]
    pub redirects: Vec<RedirectDecl>,
}

/// The on-disk shape of `bundle-workspace.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkspaceFile {
    #[serde(default)]
    pub registry: Vec<RegistryEntry>,
    #[serde(default)]
    pub redirects: Vec<RedirectDecl>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
    #[serde(default)]
    pub cache_root: Option<PathBuf>,
}

/// Resolved workspace settings for one build.
#[derive(Debug, Clone)]
pub struct WorkspaceSettings {
    /// Profile entries first, then workspace defaults.
    pub registry: Vec<RegistryEntry>,
    /// Profile rules first, then workspace defaults.
    pub redirects: Vec<RedirectRule>,
    /// Variables visible to registry and redirect match expressions.
    pub vars: Env,
    pub cache_root: PathBuf,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            registry: Vec::new(),
            redirects: Vec::new(),
            vars: Env::new(),
            cache_root: default_cache_root(),
        }
    }
}

impl WorkspaceSettings {
    /// Combine a settings file with the selected profile.
    ///
    /// `cache_root` overrides the file's `cacheRoot`, which overrides the
    /// platform default.
    pub fn from_file(
        file: WorkspaceFile,
        profile: Option<&str>,
        cache_root: Option<PathBuf>,
    ) -> Result<Self> {
        let selected = match profile {
            Some(name) => file.profiles.get(name).cloned().ok_or_else(|| Error::Validation {
                field: "profile".to_string(),
                value: name.to_string(),
                message: format!(
                    "unknown profile; available: {}",
                    file.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            })?,
            None => Profile::default(),
        };

        let mut registry = selected.registry.clone();
        registry.extend(file.registry.iter().cloned());

        let mut redirects = Vec::new();
        for decl in selected.redirects.iter().chain(file.redirects.iter()) {
            redirects.push(RedirectRule::compile(decl)?);
        }

        let mut vars = selected.vars.clone();
        if let Some(name) = profile {
            vars.entry("profile".to_string())
                .or_insert_with(|| name.to_string());
        }

        let cache_root = cache_root
            .or(file.cache_root.map(|p| expand_home(&p)))
            .unwrap_or_else(default_cache_root);

        Ok(Self {
            registry,
            redirects,
            vars,
            cache_root,
        })
    }

    /// Find and load the settings that apply to a project directory.
    pub fn discover(
        project_dir: &Path,
        profile: Option<&str>,
        cache_root: Option<PathBuf>,
    ) -> Result<Self> {
        let file = match find_workspace_file(project_dir) {
            Some(path) => {
                debug!("Using workspace settings {}", path.display());
                let content = std::fs::read_to_string(&path)?;
                parse_as::<WorkspaceFile>(&content, Format::Yaml, &path)?
            }
            None => WorkspaceFile::default(),
        };
        Self::from_file(file, profile, cache_root)
    }
}

/// Parses a YAML workspace settings string.
pub fn parse(yaml_content: &str) -> Result<WorkspaceFile> {
    parse_as(yaml_content, Format::Yaml, Path::new(WORKSPACE_FILE))
}

/// Walk up from `start` looking for `bundle-workspace.yaml`.
///
/// Relative starts such as `.` are made absolute first so the walk reaches
/// the real parent directories.
pub fn find_workspace_file(start: &Path) -> Option<PathBuf> {
    let start = std::fs::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .map(|dir| dir.join(WORKSPACE_FILE))
        .find(|path| path.is_file())
}

/// `<cache dir>/bundlekit`, falling back to a local directory.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".bundlekit-cache"))
        .join("bundlekit")
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
