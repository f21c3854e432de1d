//! # Link Parsing
//!
//! Links are how projects, profiles and the command line refer to other
//! projects. Four spellings are accepted:
//!
//! - `registry:<name>[/<subpath>][#ref=<ref>]` and its abbreviation `@<name>...`
//! - `dir:<path>`
//! - `git:<url>[#ref=<ref>]`
//!
//! where `<ref>` is `tag/<name>`, `branch/<name>` or a bare `<name>` (an
//! implicit branch). An omitted ref means `branch/main`.
//!
//! ```
//! use bundlekit::link::{GitRef, Link, LinkKind};
//!
//! let link = Link::parse("registry:foo/bar#ref=tag/v1.0.0").unwrap();
//! assert_eq!(
//!     link.kind,
//!     LinkKind::Registry {
//!         name: "foo".to_string(),
//!         subpath: Some("bar".to_string()),
//!         git_ref: Some(GitRef::Tag("v1.0.0".to_string())),
//!     }
//! );
//! assert_eq!(Link::parse("@foo").unwrap().normalized(), "registry:foo#ref=branch/main");
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const REF_MARKER: &str = "#ref=";

/// The branch used when a link does not name a ref.
pub const DEFAULT_BRANCH: &str = "main";

/// A git reference carried by registry and git links.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GitRef {
    Branch(String),
    Tag(String),
}

impl GitRef {
    /// Parse the text after `#ref=`.
    pub fn parse(raw: &str) -> Option<Self> {
        let git_ref = if let Some(name) = raw.strip_prefix("tag/") {
            GitRef::Tag(name.to_string())
        } else if let Some(name) = raw.strip_prefix("branch/") {
            GitRef::Branch(name.to_string())
        } else {
            GitRef::Branch(raw.to_string())
        };
        if git_ref.name().is_empty() {
            None
        } else {
            Some(git_ref)
        }
    }

    /// The branch or tag name as git understands it.
    pub fn name(&self) -> &str {
        match self {
            GitRef::Branch(name) | GitRef::Tag(name) => name,
        }
    }

    /// `branch` or `tag`.
    pub fn kind(&self) -> &'static str {
        match self {
            GitRef::Branch(_) => "branch",
            GitRef::Tag(_) => "tag",
        }
    }

    /// `branch/<name>` or `tag/<name>`.
    pub fn normalized(&self) -> String {
        format!("{}/{}", self.kind(), self.name())
    }
}

impl Default for GitRef {
    fn default() -> Self {
        GitRef::Branch(DEFAULT_BRANCH.to_string())
    }
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

/// The three shapes a link can take.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LinkKind {
    Registry {
        name: String,
        subpath: Option<String>,
        /// Present only when the link spells out `#ref=`; otherwise the
        /// registry entry's own ref applies.
        git_ref: Option<GitRef>,
    },
    Dir {
        path: String,
    },
    Git {
        url: String,
        git_ref: GitRef,
    },
}

/// A parsed link, keeping the text it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    pub raw: String,
    pub kind: LinkKind,
}

impl Link {
    /// Parse a link string.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let kind = if let Some(rest) = trimmed.strip_prefix("registry:") {
            parse_registry(raw, rest)?
        } else if let Some(rest) = trimmed.strip_prefix('@') {
            parse_registry(raw, rest)?
        } else if let Some(rest) = trimmed.strip_prefix("dir:") {
            parse_dir(raw, rest)?
        } else if let Some(rest) = trimmed.strip_prefix("git:") {
            parse_git(raw, rest)?
        } else {
            return Err(parse_error(
                raw,
                "expected one of the prefixes 'registry:', '@', 'dir:' or 'git:'",
            ));
        };

        Ok(Self {
            raw: raw.to_string(),
            kind,
        })
    }

    /// Build a directory link from a path.
    pub fn dir(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            raw: format!("dir:{}", path),
            kind: LinkKind::Dir { path },
        }
    }

    /// Build a git link from a url and ref.
    pub fn git(url: impl Into<String>, git_ref: GitRef) -> Self {
        let url = url.into();
        let raw = format!("git:{}{}{}", url, REF_MARKER, git_ref.normalized());
        Self {
            raw,
            kind: LinkKind::Git { url, git_ref },
        }
    }

    /// The canonical spelling of this link, with the ref always explicit.
    pub fn normalized(&self) -> String {
        match &self.kind {
            LinkKind::Registry {
                name,
                subpath,
                git_ref,
            } => {
                let git_ref = git_ref.clone().unwrap_or_default();
                match subpath {
                    Some(sub) => format!("registry:{}/{}{}{}", name, sub, REF_MARKER, git_ref),
                    None => format!("registry:{}{}{}", name, REF_MARKER, git_ref),
                }
            }
            LinkKind::Dir { path } => format!("dir:{}", path),
            LinkKind::Git { url, git_ref } => format!("git:{}{}{}", url, REF_MARKER, git_ref),
        }
    }

    pub fn is_registry(&self) -> bool {
        matches!(self.kind, LinkKind::Registry { .. })
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

impl FromStr for Link {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Link::parse(s)
    }
}

fn parse_error(raw: &str, message: &str) -> Error {
    Error::LinkParse {
        link: raw.to_string(),
        message: message.to_string(),
    }
}

/// Split `body#ref=<ref>` into the body and its explicit ref, if any.
fn split_explicit_ref<'a>(raw: &str, rest: &'a str) -> Result<(&'a str, Option<GitRef>)> {
    match rest.find(REF_MARKER) {
        Some(idx) => {
            let ref_text = &rest[idx + REF_MARKER.len()..];
            let git_ref =
                GitRef::parse(ref_text).ok_or_else(|| parse_error(raw, "empty ref after '#ref='"))?;
            Ok((&rest[..idx], Some(git_ref)))
        }
        None => Ok((rest, None)),
    }
}

/// Split `body#ref=<ref>` into the body and its ref, applying the default.
fn split_ref<'a>(raw: &str, rest: &'a str) -> Result<(&'a str, GitRef)> {
    let (body, git_ref) = split_explicit_ref(raw, rest)?;
    Ok((body, git_ref.unwrap_or_default()))
}

fn parse_registry(raw: &str, rest: &str) -> Result<LinkKind> {
    let (body, git_ref) = split_explicit_ref(raw, rest)?;
    let (name, subpath) = match body.split_once('/') {
        Some((name, sub)) => {
            let sub = sub.trim_matches('/');
            (name, (!sub.is_empty()).then(|| sub.to_string()))
        }
        None => (body, None),
    };
    if name.is_empty() {
        return Err(parse_error(raw, "empty registry name"));
    }
    Ok(LinkKind::Registry {
        name: name.to_string(),
        subpath,
        git_ref,
    })
}

fn parse_dir(raw: &str, rest: &str) -> Result<LinkKind> {
    if rest.contains(REF_MARKER) {
        return Err(parse_error(raw, "directory links do not take a ref"));
    }
    if rest.is_empty() {
        return Err(parse_error(raw, "empty directory path"));
    }
    Ok(LinkKind::Dir {
        path: rest.to_string(),
    })
}

fn parse_git(raw: &str, rest: &str) -> Result<LinkKind> {
    let (url, git_ref) = split_ref(raw, rest)?;
    if url.is_empty() {
        return Err(parse_error(raw, "empty git url"));
    }
    Ok(LinkKind::Git {
        url: url.to_string(),
        git_ref,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registry_with_subpath_and_tag() {
        let link = Link::parse("registry:foo/bar#ref=tag/v1.0.0").unwrap();
        assert_eq!(
            link.kind,
            LinkKind::Registry {
                name: "foo".to_string(),
                subpath: Some("bar".to_string()),
                git_ref: Some(GitRef::Tag("v1.0.0".to_string())),
            }
        );
        assert_eq!(link.normalized(), "registry:foo/bar#ref=tag/v1.0.0");
    }

    #[test]
    fn test_parse_registry_default_ref() {
        let link = Link::parse("registry:foo").unwrap();
        assert_eq!(link.normalized(), "registry:foo#ref=branch/main");
    }

    #[test]
    fn test_parse_registry_keeps_explicit_default_ref() {
        let implicit = Link::parse("@foo").unwrap();
        let explicit = Link::parse("@foo#ref=branch/main").unwrap();
        assert!(matches!(implicit.kind, LinkKind::Registry { git_ref: None, .. }));
        assert_eq!(
            explicit.kind,
            LinkKind::Registry {
                name: "foo".to_string(),
                subpath: None,
                git_ref: Some(GitRef::Branch("main".to_string())),
            }
        );
        assert_ne!(implicit.kind, explicit.kind);
        assert_eq!(implicit.normalized(), explicit.normalized());
    }

    #[test]
    fn test_parse_registry_abbreviation() {
        let long = Link::parse("registry:tools/lint#ref=dev").unwrap();
        let short = Link::parse("@tools/lint#ref=branch/dev").unwrap();
        assert_eq!(long.kind, short.kind);
        assert_eq!(short.normalized(), "registry:tools/lint#ref=branch/dev");
    }

    #[test]
    fn test_parse_git() {
        let link = Link::parse("git:https://github.com/acme/lib.git#ref=tag/v2").unwrap();
        assert_eq!(
            link.kind,
            LinkKind::Git {
                url: "https://github.com/acme/lib.git".to_string(),
                git_ref: GitRef::Tag("v2".to_string()),
            }
        );

        let default_ref = Link::parse("git:git@github.com:acme/lib.git").unwrap();
        assert_eq!(
            default_ref.normalized(),
            "git:git@github.com:acme/lib.git#ref=branch/main"
        );
    }

    #[test]
    fn test_parse_dir() {
        let link = Link::parse("dir:../shared").unwrap();
        assert_eq!(
            link.kind,
            LinkKind::Dir {
                path: "../shared".to_string()
            }
        );
        assert_eq!(link.to_string(), "dir:../shared");
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "registry:",
            "@",
            "@#ref=main",
            "git:",
            "git:#ref=main",
            "git:https://x/y.git#ref=",
            "registry:foo#ref=tag/",
            "dir:",
            "dir:/a#ref=main",
            "https://example.com/repo.git",
        ] {
            let err = Link::parse(bad).unwrap_err();
            assert!(
                matches!(err, Error::LinkParse { .. }),
                "expected parse error for {}",
                bad
            );
        }
    }

    #[test]
    fn test_git_ref_parse() {
        assert_eq!(GitRef::parse("tag/v1"), Some(GitRef::Tag("v1".to_string())));
        assert_eq!(
            GitRef::parse("branch/feature/x"),
            Some(GitRef::Branch("feature/x".to_string()))
        );
        assert_eq!(GitRef::parse("dev"), Some(GitRef::Branch("dev".to_string())));
        assert_eq!(GitRef::parse(""), None);
        assert_eq!(GitRef::default().normalized(), "branch/main");
    }
}
