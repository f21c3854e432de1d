//! Phase 1: Discovery
//!
//! Computes the import closure of the root project for one scope.
//!
//! ## Process
//!
//! 1.  **Seeding**: The root's import declarations for the scope are queued,
//!     keeping only those whose match expression passes against the root's
//!     resolved options.
//!
//! 2.  **Breadth-first walk**: Each queued import is resolved through the
//!     link resolver and fetched. The target is then dropped if it is the root,
//!     the declaring project itself, or a project visited earlier. Otherwise
//!     it is loaded (resolving its options), appended to the closure, and its
//!     own imports are queued, filtered against *its* options.
//!
//! 3.  **Cycle Detection**: Every queued import carries the chain of non-root
//!     projects that led to it. Reaching one of those again is an error.
//!
//! The output is in first-discovery order. Script and config closures are
//! built independently.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use log::debug;

use super::{Closure, ImportEdge};
use crate::context::{BuildContext, Project};
use crate::error::{Error, Result, ResultExt};
use crate::expr::matches;
use crate::link::Link;
use crate::manifest::Scope;

/// An import waiting to be resolved.
#[derive(Debug)]
struct Pending {
    owner: PathBuf,
    link: String,
    /// Non-root projects on the path from the root to `owner`, inclusive.
    ancestors: Vec<PathBuf>,
    depth: usize,
}

/// Executes Phase 1 for `scope`.
pub fn execute(ctx: &mut BuildContext, scope: Scope) -> Result<Closure> {
    let root = ctx
        .root_path()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::Resolution {
            key: scope.to_string(),
            message: "the root project must be loaded before discovery".to_string(),
        })?;

    let mut closure = Closure::new(scope);
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut queue = VecDeque::new();
    enqueue_imports(ctx, &root, scope, &[], 1, &mut queue)?;

    while let Some(item) = queue.pop_front() {
        let owner = loaded(ctx, &item.owner)?;
        let owner_name = owner.name.clone();
        let details = [("project", owner_name.as_str()), ("link", item.link.as_str())];

        let link = Link::parse(&item.link).context("parse import", &details)?;
        let resolved = ctx
            .resolve_link(&link, owner)
            .context("resolve import", &details)?;
        let path = ctx.fetch(&resolved).context("fetch import", &details)?;

        if path == root {
            debug!("{}: dropping import of the root via {}", owner_name, item.link);
            continue;
        }
        if path == item.owner {
            debug!("{}: dropping self import via {}", owner_name, item.link);
            continue;
        }
        if item.ancestors.contains(&path) {
            return Err(Error::CycleDetected {
                cycle: describe_cycle(ctx, &item.ancestors, &path),
            });
        }
        if !visited.insert(path.clone()) {
            debug!("{}: {} already visited", owner_name, path.display());
            continue;
        }

        ctx.load_project(&path).context("load import", &details)?;
        let project = loaded(ctx, &path)?.name.clone();
        debug!(
            "{} closure: {} -> {} ({})",
            scope,
            owner_name,
            project,
            path.display()
        );

        closure.edges.push(ImportEdge {
            owner: owner_name,
            target: resolved,
            project,
            project_path: path.clone(),
            depth: item.depth,
        });

        let mut ancestors = item.ancestors.clone();
        ancestors.push(path.clone());
        enqueue_imports(ctx, &path, scope, &ancestors, item.depth + 1, &mut queue)?;
    }

    Ok(closure)
}

/// Queue the active imports `path` declares for `scope`.
fn enqueue_imports(
    ctx: &BuildContext,
    path: &Path,
    scope: Scope,
    ancestors: &[PathBuf],
    depth: usize,
    queue: &mut VecDeque<Pending>,
) -> Result<()> {
    let project = loaded(ctx, path)?;
    let env = project.env();
    for import in &project.manifest.scope(scope).imports {
        let active = matches(ctx.evaluator(), import.match_expr.as_deref(), &env).context(
            "evaluate import match",
            &[("project", project.name.as_str()), ("link", import.link.as_str())],
        )?;
        if !active {
            debug!("{}: import {} is inactive", project.name, import.link);
            continue;
        }
        queue.push_back(Pending {
            owner: path.to_path_buf(),
            link: import.link.clone(),
            ancestors: ancestors.to_vec(),
            depth,
        });
    }
    Ok(())
}

fn loaded<'c>(ctx: &'c BuildContext, path: &Path) -> Result<&'c Project> {
    ctx.project(path).ok_or_else(|| Error::Resolution {
        key: path.display().to_string(),
        message: "project is not loaded".to_string(),
    })
}

fn describe_cycle(ctx: &BuildContext, ancestors: &[PathBuf], target: &Path) -> String {
    let start = ancestors.iter().position(|p| p == target).unwrap_or(0);
    let name = |path: &Path| {
        ctx.project(path)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| path.display().to_string())
    };
    let mut chain: Vec<String> = ancestors[start..].iter().map(|p| name(p.as_path())).collect();
    chain.push(name(target));
    chain.join(" -> ")
}
