//! # Link Resolution
//!
//! Turns a parsed [`Link`] into the directory the linked project lives in.
//!
//! 1. Registry links are looked up by name in the workspace registry (profile
//!    entries first), the first entry whose match expression passes wins.
//! 2. A provisional path is computed: directory links use their path (relative
//!    paths are taken from the importing project's directory), git links use
//!    their checkout directory in the cache.
//! 3. Redirect rules are tried against two keys, the link's normalized string
//!    and `dir:<provisional path>`. The first rule whose regex matches and
//!    whose match expression passes rewrites the link, and the lookup repeats
//!    on the result until no rule applies.
//!
//! Resolution never touches the network; checking out git links is left to
//! the caller through [`crate::git::GitProvider`].

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};
use crate::expr::{matches, Env, Evaluator};
use crate::git;
use crate::link::{GitRef, Link, LinkKind};
use crate::workspace::{RedirectRule, WorkspaceSettings};

/// Upper bound on chained redirects for a single link.
pub const MAX_REDIRECTS: usize = 16;

/// Where a git-backed project comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCoordinates {
    pub url: String,
    pub git_ref: GitRef,
    /// The checkout directory, without any registry subpath.
    pub checkout: PathBuf,
}

/// A link together with the directory it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// The link as written.
    pub link: Link,
    /// The concrete `dir:` or `git:` link after registry lookup and redirects.
    pub target: Link,
    /// Final project directory (lexically normalized, not canonicalized).
    pub path: PathBuf,
    pub git: Option<GitCoordinates>,
}

/// A concrete link plus the registry subpath carried along with it.
#[derive(Debug, Clone)]
struct Target {
    link: Link,
    subpath: Option<String>,
}

/// Resolves links against one build's workspace settings.
pub struct LinkResolver<'a> {
    settings: &'a WorkspaceSettings,
    evaluator: &'a dyn Evaluator,
}

impl<'a> LinkResolver<'a> {
    pub fn new(settings: &'a WorkspaceSettings, evaluator: &'a dyn Evaluator) -> Self {
        Self {
            settings,
            evaluator,
        }
    }

    /// Resolve `link`, written in the project `importer` located at `base_dir`.
    pub fn resolve(&self, link: &Link, base_dir: &Path, importer: &str) -> Result<ResolvedLink> {
        let mut env = self.settings.vars.clone();
        env.insert("importer".to_string(), importer.to_string());

        let mut target = self.expand_registry(link, &env)?;
        let mut path = self.provisional_path(&target, base_dir)?;
        let mut seen = HashSet::new();
        seen.insert(path.clone());

        for _ in 0..MAX_REDIRECTS {
            let Some(next) = self.apply_redirects(&target, &path, &env)? else {
                return Ok(self.finish(link, target, path));
            };
            let next_path = self.provisional_path(&next, base_dir)?;
            if next_path == path {
                // the rule rewrote the link onto itself
                return Ok(self.finish(link, next, next_path));
            }
            debug!(
                "Redirected {} -> {} ({})",
                target.link,
                next.link,
                next_path.display()
            );
            if !seen.insert(next_path.clone()) {
                return Err(Error::CycleDetected {
                    cycle: format!("redirects of {} revisit {}", link, next_path.display()),
                });
            }
            target = next;
            path = next_path;
        }

        Err(Error::CycleDetected {
            cycle: format!(
                "{} was redirected more than {} times",
                link, MAX_REDIRECTS
            ),
        })
    }

    fn finish(&self, link: &Link, target: Target, path: PathBuf) -> ResolvedLink {
        let git = match &target.link.kind {
            LinkKind::Git { url, git_ref } => {
                let checkout = git::cache_path(&self.settings.cache_root, url, git_ref)
                    .unwrap_or_else(|_| path.clone());
                Some(GitCoordinates {
                    url: url.clone(),
                    git_ref: git_ref.clone(),
                    checkout,
                })
            }
            _ => None,
        };
        ResolvedLink {
            link: link.clone(),
            target: target.link,
            path,
            git,
        }
    }

    /// Replace a registry link with the entry it names.
    fn expand_registry(&self, link: &Link, env: &Env) -> Result<Target> {
        let LinkKind::Registry {
            name,
            subpath,
            git_ref,
        } = &link.kind
        else {
            return Ok(Target {
                link: link.clone(),
                subpath: None,
            });
        };

        let mut candidates = 0;
        for entry in self.settings.registry.iter().filter(|e| &e.name == name) {
            candidates += 1;
            if !matches(self.evaluator, entry.match_expr.as_deref(), env)? {
                continue;
            }
            let entry_link = Link::parse(&entry.link)?;
            let concrete = match &entry_link.kind {
                LinkKind::Dir { .. } => entry_link.clone(),
                LinkKind::Git { url, git_ref: entry_ref } => {
                    // an explicit ref on the registry link wins over the entry's
                    let chosen = git_ref.clone().unwrap_or_else(|| entry_ref.clone());
                    Link::git(url.clone(), chosen)
                }
                LinkKind::Registry { .. } => {
                    return Err(Error::Resolution {
                        key: link.normalized(),
                        message: format!(
                            "registry entry '{}' points at another registry link {}",
                            name, entry.link
                        ),
                    })
                }
            };
            debug!("Registry {} -> {}", link, concrete);
            return Ok(Target {
                link: concrete,
                subpath: subpath.clone(),
            });
        }

        let message = if candidates == 0 {
            format!("no registry entry named '{}'", name)
        } else {
            format!(
                "none of the {} registry entries named '{}' matched",
                candidates, name
            )
        };
        Err(Error::Resolution {
            key: link.normalized(),
            message,
        })
    }

    fn provisional_path(&self, target: &Target, base_dir: &Path) -> Result<PathBuf> {
        let base = match &target.link.kind {
            LinkKind::Dir { path } => {
                let path = Path::new(path);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    base_dir.join(path)
                }
            }
            LinkKind::Git { url, git_ref } => {
                git::cache_path(&self.settings.cache_root, url, git_ref)?
            }
            LinkKind::Registry { .. } => {
                return Err(Error::Resolution {
                    key: target.link.normalized(),
                    message: "registry link left unexpanded".to_string(),
                })
            }
        };
        let full = match &target.subpath {
            Some(sub) => base.join(sub),
            None => base,
        };
        Ok(clean_path(&full))
    }

    /// The first applicable redirect for `target`, if any.
    fn apply_redirects(&self, target: &Target, path: &Path, env: &Env) -> Result<Option<Target>> {
        let link_key = target.link.normalized();
        let path_key = format!("dir:{}", path.display());

        for rule in &self.settings.redirects {
            for (key, is_link_key) in [(&link_key, true), (&path_key, false)] {
                let Some(rewritten) = self.try_rule(rule, key, env)? else {
                    continue;
                };
                let link = Link::parse(&rewritten)?;
                let mut next = self.expand_registry(&link, env)?;
                // a rewrite of the bare link keeps the registry subpath, a
                // rewrite of the full path already accounts for it
                if is_link_key && next.subpath.is_none() {
                    next.subpath = target.subpath.clone();
                }
                return Ok(Some(next));
            }
        }
        Ok(None)
    }

    fn try_rule(&self, rule: &RedirectRule, key: &str, env: &Env) -> Result<Option<String>> {
        let Some(captures) = rule.regex.captures(key) else {
            return Ok(None);
        };
        let mut rule_env = env.clone();
        for (idx, group) in captures.iter().enumerate() {
            if let Some(m) = group {
                rule_env.insert(idx.to_string(), m.as_str().to_string());
            }
        }
        for name in rule.regex.capture_names().flatten() {
            if let Some(m) = captures.name(name) {
                rule_env.insert(name.to_string(), m.as_str().to_string());
            }
        }
        if !matches(self.evaluator, rule.match_expr.as_deref(), &rule_env)? {
            return Ok(None);
        }
        Ok(Some(self.evaluator.eval_string(&rule.link, &rule_env)?))
    }
}

/// Remove `.` components and fold `..` without touching the filesystem.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}
