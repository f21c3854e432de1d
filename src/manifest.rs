//! # Project Manifest Schema and Parsing
//!
//! Every project directory carries a manifest (`bundle.yaml`, `bundle.yml`,
//! `bundle.toml` or `bundle.json`) describing the project's name, its typed
//! options, the shell sources it contributes and the other projects it
//! imports. Script and config material are declared separately, each with its
//! own sources and imports.
//!
//! ```yaml
//! name: app
//! runtime:
//!   minVersion: 0.1.0
//! option:
//!   items:
//!     - name: env
//!       type: string
//!       choices: [dev, staging, prod]
//!       default: dev
//!       assigns:
//!         - project: lib
//!           option: target
//!           mapping: "${value}-eu"
//!   verifies:
//!     - "env != 'prod' || region != ''"
//! script:
//!   sources:
//!     - dir: bin
//!       files: "*.sh"
//!   imports:
//!     - link: "@lib"
//! config:
//!   sources:
//!     - dir: config
//!       files: "*.yaml"
//!       match: "env == 'prod'"
//! ```
//!
//! Parsing is strict: unknown fields are rejected so that typos surface as
//! errors instead of silently disabled imports.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use semver::Version;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Manifest file names, in lookup order.
pub const MANIFEST_FILES: [&str; 4] = ["bundle.yaml", "bundle.yml", "bundle.toml", "bundle.json"];

/// Names of projects and options.
pub const NAME_PATTERN: &str = r"^[a-z][a-z0-9_-]*$";

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(NAME_PATTERN).unwrap());

/// The two independently resolved halves of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Script,
    Config,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Script => "script",
            Scope::Config => "config",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime version bounds, inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Runtime {
    #[serde(default)]
    pub min_version: Option<String>,
    #[serde(default)]
    pub max_version: Option<String>,
}

/// The type an option's raw value is parsed as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[default]
    String,
    Bool,
    Integer,
    Decimal,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::String => "string",
            OptionType::Bool => "bool",
            OptionType::Integer => "integer",
            OptionType::Decimal => "decimal",
        }
    }
}

/// Pull another project's option from this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignDecl {
    /// Target project name.
    pub project: String,
    /// Target option name.
    pub option: String,
    /// Optional string expression with `value` bound to this option's raw value.
    #[serde(default)]
    pub mapping: Option<String>,
}

impl AssignDecl {
    /// `project.option`
    pub fn target_key(&self) -> String {
        format!("{}.{}", self.project, self.option)
    }
}

/// One declared option.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionDecl {
    pub name: String,
    #[serde(default, rename = "type")]
    pub option_type: OptionType,
    /// Allow-list of raw values.
    #[serde(default)]
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub optional: bool,
    /// Default raw value. Scalars of any YAML type are accepted and kept as text.
    #[serde(default, deserialize_with = "deserialize_raw_scalar")]
    pub default: Option<String>,
    #[serde(default)]
    pub assigns: Vec<AssignDecl>,
}

/// The `option` block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionSection {
    #[serde(default)]
    pub items: Vec<OptionDecl>,
    /// Boolean expressions over the resolved options.
    #[serde(default)]
    pub verifies: Vec<String>,
}

/// A set of files contributed by a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SourceDecl {
    /// Directory relative to the project root.
    #[serde(default = "default_source_dir")]
    pub dir: String,
    /// Glob matched against paths relative to `dir`.
    #[serde(default = "default_source_files")]
    pub files: String,
    /// Activation expression over the owning project's options.
    #[serde(default, rename = "match")]
    pub match_expr: Option<String>,
}

/// Get the default directory for a source declaration
pub fn default_source_dir() -> String {
    ".".to_string()
}

/// Get the default file glob for a source declaration
pub fn default_source_files() -> String {
    "**/*".to_string()
}

/// A link to another project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportDecl {
    pub link: String,
    /// Activation expression over the owning project's options.
    #[serde(default, rename = "match")]
    pub match_expr: Option<String>,
}

/// Sources and imports for one scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeSection {
    #[serde(default)]
    pub sources: Vec<SourceDecl>,
    #[serde(default)]
    pub imports: Vec<ImportDecl>,
}

/// A parsed project manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default)]
    pub option: OptionSection,
    #[serde(default)]
    pub script: ScopeSection,
    #[serde(default)]
    pub config: ScopeSection,
}

impl Manifest {
    /// Sources and imports for `scope`.
    pub fn scope(&self, scope: Scope) -> &ScopeSection {
        match scope {
            Scope::Script => &self.script,
            Scope::Config => &self.config,
        }
    }

    /// Check names, option uniqueness, choice/type coherence and runtime bounds.
    pub fn validate(&self) -> Result<()> {
        if !NAME_RE.is_match(&self.name) {
            return Err(Error::Validation {
                field: "name".to_string(),
                value: self.name.clone(),
                message: format!("project names must match {}", NAME_PATTERN),
            });
        }

        let mut seen = HashSet::new();
        for item in &self.option.items {
            let field = format!("{}.{}", self.name, item.name);
            if !NAME_RE.is_match(&item.name) {
                return Err(Error::Validation {
                    field: "option.items.name".to_string(),
                    value: item.name.clone(),
                    message: format!("option names must match {}", NAME_PATTERN),
                });
            }
            if !seen.insert(item.name.as_str()) {
                return Err(Error::Validation {
                    field,
                    value: item.name.clone(),
                    message: "duplicate option declaration".to_string(),
                });
            }
            if let Some(choices) = &item.choices {
                if choices.is_empty() {
                    return Err(Error::Validation {
                        field,
                        value: String::new(),
                        message: "choices must not be empty when present".to_string(),
                    });
                }
            }
            for assign in &item.assigns {
                if assign.project.is_empty() || assign.option.is_empty() {
                    return Err(Error::Validation {
                        field: format!("{}.assigns", field),
                        value: assign.target_key(),
                        message: "assign targets need both a project and an option".to_string(),
                    });
                }
            }
        }

        self.check_runtime(&current_version()?)
    }

    /// Check `runtime.minVersion`/`maxVersion` against `version`.
    pub fn check_runtime(&self, version: &Version) -> Result<()> {
        if let Some(min) = &self.runtime.min_version {
            let min = Version::parse(min)?;
            if *version < min {
                return Err(Error::Validation {
                    field: format!("{}.runtime.minVersion", self.name),
                    value: min.to_string(),
                    message: format!("requires at least version {}, running {}", min, version),
                });
            }
        }
        if let Some(max) = &self.runtime.max_version {
            let max = Version::parse(max)?;
            if *version > max {
                return Err(Error::Validation {
                    field: format!("{}.runtime.maxVersion", self.name),
                    value: max.to_string(),
                    message: format!("requires at most version {}, running {}", max, version),
                });
            }
        }
        Ok(())
    }
}

/// The version manifests' runtime bounds are checked against.
pub fn current_version() -> Result<Version> {
    Ok(Version::parse(env!("CARGO_PKG_VERSION"))?)
}

/// The serialization formats manifests and config sources may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Toml,
    Json,
}

impl Format {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Some(Format::Yaml),
            Some("toml") => Some(Format::Toml),
            Some("json") => Some(Format::Json),
            _ => None,
        }
    }
}

/// Deserialize `content` in the given format, reporting failures against `path`.
pub fn parse_as<T: DeserializeOwned>(content: &str, format: Format, path: &Path) -> Result<T> {
    let parsed = match format {
        Format::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| {
        let hint = message
            .contains("unknown field")
            .then(|| "check the field names against the documented schema".to_string());
        Error::ManifestParse {
            path: path.display().to_string(),
            message,
            hint,
        }
    })
}

/// Parses and validates a YAML manifest string.
pub fn parse(yaml_content: &str) -> Result<Manifest> {
    let manifest: Manifest = parse_as(yaml_content, Format::Yaml, Path::new("<inline>"))?;
    manifest.validate()?;
    Ok(manifest)
}

/// Find the manifest file inside a project directory.
pub fn find_manifest(project_dir: &Path) -> Option<PathBuf> {
    MANIFEST_FILES
        .iter()
        .map(|name| project_dir.join(name))
        .find(|path| path.is_file())
}

/// Load and validate the manifest of the project at `project_dir`.
pub fn from_dir(project_dir: &Path) -> Result<Manifest> {
    let path = find_manifest(project_dir).ok_or_else(|| Error::ManifestParse {
        path: project_dir.display().to_string(),
        message: "no project manifest found".to_string(),
        hint: Some(format!("create one of: {}", MANIFEST_FILES.join(", "))),
    })?;
    from_file(&path)
}

/// Load and validate a manifest file.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Manifest> {
    let path = path.as_ref();
    let format = Format::from_path(path).ok_or_else(|| Error::ManifestParse {
        path: path.display().to_string(),
        message: "unsupported manifest extension".to_string(),
        hint: Some("use .yaml, .yml, .toml or .json".to_string()),
    })?;
    let content = std::fs::read_to_string(path)?;
    let manifest: Manifest = parse_as(&content, format, path)?;
    manifest.validate()?;
    Ok(manifest)
}

/// Accept strings, numbers and booleans as raw option text.
fn deserialize_raw_scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
        Scalar::Str(s) => s,
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}
