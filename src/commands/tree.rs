//! # Tree Command Implementation
//!
//! This module implements the `tree` subcommand, which displays a project's
//! import closure in a hierarchical format.
//!
//! ## Functionality
//!
//! - **Closure Visualization**: Each project appears once, under the project
//!   that first imported it
//! - **Scope Selection**: `--scope script` or `--scope config`
//! - **Depth Control**: Supports `--depth` flag to limit tree depth
//!
//! This command is a safe, read-only operation.

use std::borrow::Cow;

use anyhow::Result;
use clap::{Args, ValueEnum};
use ptree::{print_tree, TreeItem};

use bundlekit::phases::{Closure, ImportEdge};

use super::ProjectArgs;

/// Which closure to display.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeArg {
    Script,
    Config,
}

/// Display the import tree
#[derive(Args, Debug)]
pub struct TreeArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Closure to display.
    #[arg(long, value_enum, default_value = "script")]
    pub scope: ScopeArg,

    /// Maximum depth to display in the tree.
    ///
    /// If not specified, displays the full tree.
    /// Use 0 to show only the root, 1 to show its direct imports, etc.
    #[arg(long, value_name = "NUM")]
    pub depth: Option<usize>,
}

/// Execute the `tree` command.
pub fn execute(args: TreeArgs) -> Result<()> {
    let plan = args.project.build()?;
    let closure = match args.scope {
        ScopeArg::Script => &plan.script_closure,
        ScopeArg::Config => &plan.config_closure,
    };
    let tree = build_tree(&plan.root, closure, args.depth.unwrap_or(usize::MAX));
    print_tree(&tree).map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))?;
    Ok(())
}

/// Build the display tree rooted at `root`.
pub fn build_tree(root: &str, closure: &Closure, max_depth: usize) -> TreeNode {
    build_node(root.to_string(), root, &closure.edges, max_depth, 0)
}

fn build_node(
    label: String,
    name: &str,
    edges: &[ImportEdge],
    max_depth: usize,
    current_depth: usize,
) -> TreeNode {
    if current_depth >= max_depth {
        return TreeNode {
            label,
            children: vec![],
        };
    }
    let children = edges
        .iter()
        .filter(|edge| edge.owner == name)
        .map(|edge| {
            let label = format!("{} ({})", edge.project, edge.target.link);
            build_node(label, &edge.project, edges, max_depth, current_depth + 1)
        })
        .collect();
    TreeNode { label, children }
}

/// Tree node structure for ptree visualization
#[derive(Clone, Debug)]
pub struct TreeNode {
    pub label: String,
    pub children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        Cow::Borrowed(&self.children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundlekit::link::Link;
    use bundlekit::manifest::Scope;
    use bundlekit::resolver::ResolvedLink;
    use std::path::PathBuf;

    fn edge(owner: &str, project: &str, depth: usize) -> ImportEdge {
        let link = Link::parse(&format!("dir:../{}", project)).unwrap();
        ImportEdge {
            owner: owner.to_string(),
            target: ResolvedLink {
                link: link.clone(),
                target: link,
                path: PathBuf::from(format!("/ws/{}", project)),
                git: None,
            },
            project: project.to_string(),
            project_path: PathBuf::from(format!("/ws/{}", project)),
            depth,
        }
    }

    fn closure() -> Closure {
        let mut closure = Closure::new(Scope::Script);
        closure.edges = vec![edge("app", "a", 1), edge("app", "b", 1), edge("a", "c", 2)];
        closure
    }

    #[test]
    fn test_build_tree_nests_by_owner() {
        let tree = build_tree("app", &closure(), usize::MAX);
        assert_eq!(tree.label, "app");
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].label, "a (dir:../a)");
        assert_eq!(tree.children[0].children[0].label, "c (dir:../c)");
        assert!(tree.children[1].children.is_empty());
    }

    #[test]
    fn test_build_tree_respects_depth() {
        let tree = build_tree("app", &closure(), 1);
        assert_eq!(tree.children.len(), 2);
        assert!(tree.children[0].children.is_empty());

        let root_only = build_tree("app", &closure(), 0);
        assert!(root_only.children.is_empty());
    }
}
