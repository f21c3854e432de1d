//! # Error Handling
//!
//! This module defines the centralized error type for `bundlekit`. It uses the
//! `thiserror` library to build a single `Error` enum that covers every failure
//! the resolution engine can hit, each variant carrying the contextual fields
//! needed to act on it.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Variants fall into five families, reported by
//!   [`Error::kind`]:
//!   - parse errors (malformed links, manifests, config sources),
//!   - validation errors (missing, duplicate, mistyped or out-of-choice fields),
//!   - resolution errors (registry and redirect misses, assign conflicts,
//!     required options left unset, failed verifications, cycles),
//!   - merge errors (type mismatches while folding config trees),
//!   - I/O errors (filesystem and git collaborator failures).
//!
//! - **`Error::Context`**: A breadcrumb wrapper. Every layer that calls into a
//!   lower one attaches the operation name and the key/value pairs it knows
//!   about (project name, path, field) using [`ResultExt::context`], so the
//!   top-level error carries the whole causal chain.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.

use thiserror::Error;

/// Main error type for bundlekit operations
#[derive(Error, Debug)]
pub enum Error {
    /// A link string could not be parsed.
    #[error("Link parsing error for '{link}': {message}")]
    LinkParse { link: String, message: String },

    /// A project manifest, workspace file or config source could not be parsed.
    #[error("Manifest parsing error in {path}: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ManifestParse {
        path: String,
        message: String,
        /// Optional hint for how to fix the manifest
        hint: Option<String>,
    },

    /// A field failed validation (bad name, duplicate, wrong type, not in choices).
    #[error("Validation error for {field} = '{value}': {message}")]
    Validation {
        field: String,
        value: String,
        message: String,
    },

    /// A non-optional option ended up without a value.
    #[error("Option {project}.{option} is required but has no value")]
    OptionRequired { project: String, option: String },

    /// A verify expression evaluated to false or failed to evaluate.
    #[error("Verification failed in project {project}: `{expression}` {message}")]
    VerifyFailed {
        project: String,
        expression: String,
        message: String,
    },

    /// Two assigns target the same option with different origins.
    #[error("Assign conflict on {target}: already assigned from {existing}, refusing {incoming}")]
    AssignConflict {
        target: String,
        existing: String,
        incoming: String,
    },

    /// A link, registry entry or redirect could not be resolved.
    #[error("Resolution error for {key}: {message}")]
    Resolution { key: String, message: String },

    /// A circular dependency was detected between non-root projects or redirects.
    #[error("Cycle detected: {cycle}")]
    CycleDetected { cycle: String },

    /// Incompatible values met at the same config path.
    #[error("Merge error in {source_path} at '{key}': {message}")]
    Merge {
        source_path: String,
        key: String,
        message: String,
    },

    /// An expression could not be evaluated.
    #[error("Expression error in `{expression}`: {message}")]
    Expression { expression: String, message: String },

    /// An error occurred while cloning or updating a git repository.
    #[error("Git clone error for {url}@{r#ref}: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    GitClone {
        url: String,
        r#ref: String,
        message: String,
        /// Optional hint for how to resolve the clone issue
        hint: Option<String>,
    },

    /// A git command exited unsuccessfully.
    #[error("Git command failed for {url}: {command} - {stderr}")]
    GitCommand {
        command: String,
        url: String,
        stderr: String,
    },

    /// A breadcrumb wrapping a lower-level failure.
    #[error("{operation}{}: {source}", format_details(details))]
    Context {
        operation: String,
        details: Vec<(String, String)>,
        #[source]
        source: Box<Error>,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON parsing error, wrapped from `serde_json::Error`.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A TOML parsing error, wrapped from `toml::de::Error`.
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A semantic versioning parsing error, wrapped from `semver::Error`.
    #[error("Semver parsing error: {0}")]
    Semver(#[from] semver::Error),
}

/// The five error families every failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Validation,
    Resolution,
    Merge,
    Io,
}

impl Error {
    /// Classify this error, looking through any breadcrumbs.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::LinkParse { .. }
            | Error::ManifestParse { .. }
            | Error::Yaml(_)
            | Error::Json(_)
            | Error::Toml(_)
            | Error::Regex(_)
            | Error::Glob(_)
            | Error::UrlParse(_)
            | Error::Semver(_) => ErrorKind::Parse,
            Error::Validation { .. } | Error::VerifyFailed { .. } => ErrorKind::Validation,
            Error::OptionRequired { .. }
            | Error::AssignConflict { .. }
            | Error::Resolution { .. }
            | Error::CycleDetected { .. }
            | Error::Expression { .. } => ErrorKind::Resolution,
            Error::Merge { .. } => ErrorKind::Merge,
            Error::GitClone { .. } | Error::GitCommand { .. } | Error::Io(_) => ErrorKind::Io,
            Error::Context { source, .. } => source.kind(),
        }
    }

    /// The innermost error, with every breadcrumb stripped.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

fn format_details(details: &[(String, String)]) -> String {
    if details.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = details.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!(" [{}]", pairs.join(", "))
}

/// Attach breadcrumbs to a failing result.
pub trait ResultExt<T> {
    fn context(self, operation: &str, details: &[(&str, &str)]) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, operation: &str, details: &[(&str, &str)]) -> Result<T> {
        self.map_err(|e| Error::Context {
            operation: operation.to_string(),
            details: details
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            source: Box::new(e.into()),
        })
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_link_parse() {
        let error = Error::LinkParse {
            link: "registry:".to_string(),
            message: "empty registry name".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Link parsing error"));
        assert!(display.contains("registry:"));
        assert!(display.contains("empty registry name"));
    }

    #[test]
    fn test_error_display_manifest_parse_with_hint() {
        let error = Error::ManifestParse {
            path: "/ws/app/bundle.yaml".to_string(),
            message: "unknown field `nmae`".to_string(),
            hint: Some("check the field names".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("/ws/app/bundle.yaml"));
        assert!(display.contains("hint:"));
        assert!(display.contains("check the field names"));
    }

    #[test]
    fn test_error_display_assign_conflict() {
        let error = Error::AssignConflict {
            target: "lib.env".to_string(),
            existing: "app.env".to_string(),
            incoming: "tools.env".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("lib.env"));
        assert!(display.contains("app.env"));
        assert!(display.contains("tools.env"));
    }

    #[test]
    fn test_context_carries_breadcrumbs() {
        let inner: Result<()> = Err(Error::OptionRequired {
            project: "lib".to_string(),
            option: "port".to_string(),
        });
        let err = inner
            .context("resolve options", &[("project", "lib")])
            .context("build closure", &[("scope", "config")])
            .unwrap_err();
        let display = format!("{}", err);
        assert!(display.starts_with("build closure [scope=config]"));
        assert!(display.contains("resolve options [project=lib]"));
        assert!(display.contains("lib.port is required"));
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert!(matches!(err.root_cause(), Error::OptionRequired { .. }));
    }

    #[test]
    fn test_error_kinds() {
        let merge = Error::Merge {
            source_path: "a.yaml".to_string(),
            key: "x.y".to_string(),
            message: "list vs map".to_string(),
        };
        assert_eq!(merge.kind(), ErrorKind::Merge);

        let io: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(io.kind(), ErrorKind::Io);

        let validation = Error::Validation {
            field: "app.port".to_string(),
            value: "x".to_string(),
            message: "not an integer".to_string(),
        };
        assert_eq!(validation.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: [unclosed").unwrap_err();
        let error: Error = yaml_error.into();
        assert!(format!("{}", error).contains("YAML parsing error"));
        assert_eq!(error.kind(), ErrorKind::Parse);
    }
}
