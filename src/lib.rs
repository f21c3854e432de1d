//! # Bundlekit Library
//!
//! This library resolves shell-script bundle projects: it follows a root
//! project's imports across directories and git repositories, resolves every
//! project's typed options, and merges their config sources into one tree.
//! It is used by the `bundlekit` command-line tool and leaves producing the
//! final bundle to whatever consumes the [`phases::BuildPlan`].
//!
//! ## Quick Example
//!
//! ```
//! use bundlekit::link::{GitRef, Link, LinkKind};
//! use bundlekit::manifest;
//!
//! let link = Link::parse("@tools/shell#ref=tag/v1.0.0").unwrap();
//! assert_eq!(link.normalized(), "registry:tools/shell#ref=tag/v1.0.0");
//! assert!(matches!(
//!     link.kind,
//!     LinkKind::Registry { git_ref: Some(GitRef::Tag(_)), .. }
//! ));
//!
//! let manifest = manifest::parse(
//!     r#"
//! name: deploy
//! option:
//!   items:
//!     - name: env
//!       choices: [dev, prod]
//!       default: dev
//! script:
//!   imports:
//!     - link: "@tools/shell"
//! "#,
//! )
//! .unwrap();
//! assert_eq!(manifest.option.items.len(), 1);
//! ```
//!
//! ## Core Concepts
//!
//! - **Links (`link`, `resolver`, `workspace`)**: `registry:`, `dir:` and `git:`
//!   references to other projects, resolved through the workspace registry and
//!   redirect rules.
//! - **Manifests (`manifest`)**: the per-project `bundle.yaml` declaring
//!   options, sources and imports for the script and config scopes.
//! - **Options (`options`, `expr`)**: typed values set by the root's specify
//!   map, by assigns from other projects, or by defaults; match and verify
//!   expressions are evaluated over them.
//! - **Merging (`merge`)**: deep merge of config trees with per-path
//!   `replace`/`insert` modes.
//! - **Phases (`phases`)**: discovery, source collection, ordering and
//!   composition, sharing one per-build [`context::BuildContext`].
//!
//! ## Execution Flow
//!
//! The main entry point is [`phases::orchestrator::build`]:
//!
//! 1.  **Root**: Load workspace settings and the root project.
//! 2.  **Discovery**: Walk the script and config import closures.
//! 3.  **Sources**: Expand every reached project's source globs.
//! 4.  **Ordering**: Sort config sources by their declared order.
//! 5.  **Composition**: Fold the config sources into one tree.

pub mod context;
pub mod error;
pub mod expr;
pub mod git;
pub mod link;
pub mod manifest;
pub mod merge;
pub mod options;
pub mod phases;
pub mod resolver;
pub mod workspace;

#[cfg(test)]
mod link_proptest;
