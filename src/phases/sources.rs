//! Phase 2: Source Collection
//!
//! Expands the `sources` declarations of every project in a closure (plus the
//! root, which always comes last) into concrete files.
//!
//! ## Process
//!
//! 1.  **Activation**: A source declaration is skipped unless its match
//!     expression passes against the *owning* project's options.
//!
//! 2.  **Globbing**: The declaration's `dir` is walked with `walkdir` and every
//!     file whose path relative to `dir` matches the `files` glob is taken,
//!     in lexicographic order. `.git` directories are never entered.
//!
//! 3.  **Parsing** (config scope only): Each file is parsed as a config source
//!     document carrying `order`, `merges` and `values`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use log::debug;
use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use walkdir::WalkDir;

use super::{ConfigSource, ScriptFile};
use crate::context::{BuildContext, Project};
use crate::error::{Error, Result, ResultExt};
use crate::expr::matches;
use crate::manifest::{parse_as, Format, Scope, SourceDecl};
use crate::merge::{MergeMode, MergeModes};

/// The on-disk shape of a config source file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigSourceFile {
    #[serde(default)]
    order: i64,
    #[serde(default)]
    merges: BTreeMap<String, MergeMode>,
    #[serde(default)]
    values: YamlValue,
}

/// Collect script files for `projects`, in the given order.
pub fn collect_scripts(ctx: &BuildContext, projects: &[PathBuf]) -> Result<Vec<ScriptFile>> {
    let mut scripts = Vec::new();
    for path in projects {
        let project = project_at(ctx, path)?;
        for (decl, dir) in active_sources(ctx, project, Scope::Script)? {
            for (file, relative) in glob_files(&dir, &decl.files)? {
                scripts.push(ScriptFile {
                    project: project.name.clone(),
                    path: file,
                    relative,
                });
            }
        }
    }
    Ok(scripts)
}

/// Collect and parse config sources for `projects`, in the given order.
pub fn collect_config(ctx: &BuildContext, projects: &[PathBuf]) -> Result<Vec<ConfigSource>> {
    let mut sources = Vec::new();
    for path in projects {
        let project = project_at(ctx, path)?;
        for (decl, dir) in active_sources(ctx, project, Scope::Config)? {
            for (file, _) in glob_files(&dir, &decl.files)? {
                let display = file.display().to_string();
                let source = load_config_source(&project.name, &file).context(
                    "load config source",
                    &[("project", project.name.as_str()), ("path", display.as_str())],
                )?;
                sources.push(source);
            }
        }
    }
    Ok(sources)
}

/// Parse one config source file.
pub fn load_config_source(project: &str, path: &Path) -> Result<ConfigSource> {
    let format = Format::from_path(path).ok_or_else(|| Error::ManifestParse {
        path: path.display().to_string(),
        message: "unsupported config source extension".to_string(),
        hint: Some("narrow the source `files` glob to .yaml, .yml, .toml or .json".to_string()),
    })?;
    let content = std::fs::read_to_string(path)?;
    let file: ConfigSourceFile = if content.trim().is_empty() {
        ConfigSourceFile::default()
    } else {
        parse_as(&content, format, path)?
    };
    debug!(
        "Config source {} (order {}, {} merge modes)",
        path.display(),
        file.order,
        file.merges.len()
    );
    Ok(ConfigSource {
        project: project.to_string(),
        path: path.to_path_buf(),
        order: file.order,
        modes: MergeModes::from_declared(&file.merges),
        values: file.values,
    })
}

fn project_at<'c>(ctx: &'c BuildContext, path: &Path) -> Result<&'c Project> {
    ctx.project(path).ok_or_else(|| Error::Resolution {
        key: path.display().to_string(),
        message: "project is not loaded".to_string(),
    })
}

/// The source declarations of `project` that pass their match expression,
/// paired with their directory.
fn active_sources<'p>(
    ctx: &BuildContext,
    project: &'p Project,
    scope: Scope,
) -> Result<Vec<(&'p SourceDecl, PathBuf)>> {
    let env = project.env();
    let mut active = Vec::new();
    for decl in &project.manifest.scope(scope).sources {
        let on = matches(ctx.evaluator(), decl.match_expr.as_deref(), &env).context(
            "evaluate source match",
            &[("project", project.name.as_str()), ("dir", decl.dir.as_str())],
        )?;
        if on {
            active.push((decl, project.path.join(&decl.dir)));
        } else {
            debug!("{}: {} sources in {} are inactive", project.name, scope, decl.dir);
        }
    }
    Ok(active)
}

/// Files under `dir` whose relative path matches `files`, sorted.
pub fn glob_files(dir: &Path, files: &str) -> Result<Vec<(PathBuf, PathBuf)>> {
    if !dir.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("source directory {} does not exist", dir.display()),
        )));
    }

    let pattern = Pattern::new(files)?;
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let mut matched = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(|err| Error::Io(err.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = match entry.path().strip_prefix(dir) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => continue,
        };
        if pattern.matches_path_with(&relative, options) {
            matched.push((entry.path().to_path_buf(), relative));
        }
    }
    matched.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(matched)
}
