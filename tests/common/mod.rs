//! Shared test utilities for integration and E2E tests.
//!
//! This module provides a workspace fixture and helper functions to reduce
//! duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let ws = Workspace::new()
//!         .with_project("app", manifests::MINIMAL_APP)
//!         .with_file("app/config/base.yaml", "values: { a: 1 }");
//!     let plan = ws.build("app").unwrap();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

use bundlekit::error::Result;
use bundlekit::phases::orchestrator::{self, BuildOptions};
use bundlekit::phases::BuildPlan;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::manifests;
    pub use super::Workspace;
}

/// Common manifest snippets for testing.
#[allow(dead_code)]
pub mod manifests {
    /// A root project with one config source directory.
    pub const MINIMAL_APP: &str = r#"
name: app
config:
  sources:
    - dir: config
      files: "*.yaml"
"#;

    /// A library exposing scripts and config.
    pub const LIB: &str = r#"
name: lib
script:
  sources:
    - dir: bin
      files: "*.sh"
config:
  sources:
    - dir: config
      files: "*.yaml"
"#;

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "name: [unclosed";
}

/// A temporary directory holding one or more projects.
pub struct Workspace {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl Workspace {
    /// Create an empty workspace.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a project directory with the given `bundle.yaml`.
    pub fn with_project(self, dir: &str, manifest: &str) -> Self {
        self.temp_dir
            .child(dir)
            .child("bundle.yaml")
            .write_str(manifest)
            .expect("Failed to write manifest");
        self
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Add a `bundle-workspace.yaml` at the workspace root.
    pub fn with_settings(self, content: &str) -> Self {
        self.with_file("bundle-workspace.yaml", content)
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Canonical path of a project directory.
    pub fn project(&self, dir: &str) -> PathBuf {
        std::fs::canonicalize(self.path().join(dir)).expect("Failed to canonicalize project")
    }

    /// Git cache root used by builds in this workspace.
    pub fn cache_root(&self) -> PathBuf {
        self.path().join(".cache")
    }

    /// Build the project in `dir` with default options.
    pub fn build(&self, dir: &str) -> Result<BuildPlan> {
        self.build_with(dir, BuildOptions::default())
    }

    /// Build the project in `dir`, pinning the cache root into the workspace.
    pub fn build_with(&self, dir: &str, mut options: BuildOptions) -> Result<BuildPlan> {
        options.cache_root = Some(self.cache_root());
        orchestrator::build(&self.path().join(dir), &options)
    }

    /// Create a CLI command running in this workspace.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bundlekit");
        cmd.current_dir(self.path())
            .env("BUNDLEKIT_CACHE", self.cache_root())
            .env_remove("BUNDLEKIT_PROFILE")
            .env_remove("RUST_LOG");
        cmd
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_creates_projects() {
        let ws = Workspace::new().with_project("app", manifests::MINIMAL_APP);
        assert!(ws.path().join("app/bundle.yaml").exists());
    }

    #[test]
    fn test_manifest_constants_are_valid() {
        for manifest in [manifests::MINIMAL_APP, manifests::LIB] {
            bundlekit::manifest::parse(manifest).expect("manifest constant should parse");
        }
        assert!(bundlekit::manifest::parse(manifests::INVALID_YAML).is_err());
    }
}
