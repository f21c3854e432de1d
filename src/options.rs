//! # Option Resolution
//!
//! Every project declares typed options. Each option gets its value from the
//! first of these that applies:
//!
//! 1. **specify**: a raw value supplied for the build's root project (for
//!    example `--set env=staging` on the command line). Values addressed at any
//!    other project are ignored.
//! 2. **assign**: another project declared that its own option flows into this
//!    one, optionally through a mapping expression with `value` bound.
//! 3. **default**: the declared default.
//! 4. **unset**: allowed only for `optional` options.
//!
//! Resolved values are recorded in the per-build [`Results`] table. Assigns are
//! recorded in the [`AssignTable`], which always maps a target straight to the
//! option its value ultimately originates from, so chains are collapsed when
//! they are registered and never walked when they are read.

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::expr::{Env, Evaluator};
use crate::manifest::{AssignDecl, OptionDecl, OptionSection, OptionType};

/// Raw option values supplied for the root project, by option name.
///
/// Keys may also be written `<root>.<option>`; keys naming another project are
/// ignored.
pub type SpecifyMap = BTreeMap<String, String>;

/// Where an option's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Specify,
    Assign,
    Default,
    Unset,
}

impl ValueSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueSource::Specify => "specify",
            ValueSource::Assign => "assign",
            ValueSource::Default => "default",
            ValueSource::Unset => "unset",
        }
    }
}

/// A raw value parsed according to its option type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedValue {
    String(String),
    Bool(bool),
    Integer(i64),
    Decimal(f64),
}

/// The resolved value of one option.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionValue {
    pub raw: Option<String>,
    pub parsed: Option<ParsedValue>,
    pub source: ValueSource,
}

impl OptionValue {
    pub fn unset() -> Self {
        Self {
            raw: None,
            parsed: None,
            source: ValueSource::Unset,
        }
    }

    pub fn is_set(&self) -> bool {
        self.raw.is_some()
    }
}

/// `project.option`
pub fn option_key(project: &str, option: &str) -> String {
    format!("{}.{}", project, option)
}

/// Every resolved option of the build, keyed by `project.option`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Results {
    values: BTreeMap<String, OptionValue>,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: String, value: OptionValue) {
        self.values.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.values.iter()
    }
}

/// A registered assign, already collapsed to its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignEntry {
    /// The option this entry feeds, `project.option`.
    pub target: String,
    /// The option the value ultimately originates from.
    pub final_source: String,
    /// The option that declared the assign.
    pub direct_source: String,
    /// Mapping applied to the direct source's raw value.
    pub mapping: Option<String>,
}

/// Flat target -> origin assign registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssignTable {
    entries: BTreeMap<String, AssignEntry>,
}

impl AssignTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: &str) -> Option<&AssignEntry> {
        self.entries.get(target)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AssignEntry)> {
        self.entries.iter()
    }

    /// The origin of `key`'s value: its registered final source, or itself.
    pub fn final_source_of(&self, key: &str) -> String {
        self.entries
            .get(key)
            .map(|entry| entry.final_source.clone())
            .unwrap_or_else(|| key.to_string())
    }

    /// Register that `source` (already resolved) feeds `decl`'s target.
    ///
    /// A second assign onto the same target is accepted only when it collapses
    /// to the same origin. An assign onto an option that has already been
    /// resolved is rejected: the consumer was resolved before its producer.
    pub fn add(&mut self, source: &str, decl: &AssignDecl, results: &Results) -> Result<()> {
        let target = decl.target_key();
        let final_source = self.final_source_of(source);

        if let Some(existing) = self.entries.get(&target) {
            if existing.final_source == final_source {
                debug!(
                    "Assign {} -> {} already registered via {}",
                    source, target, existing.direct_source
                );
                return Ok(());
            }
            return Err(Error::AssignConflict {
                target,
                existing: existing.final_source.clone(),
                incoming: final_source,
            });
        }

        if results.contains(&target) {
            return Err(Error::Resolution {
                key: target.clone(),
                message: format!(
                    "assign from {} arrives after {} was already resolved (assign cycle or consumer imported before producer)",
                    source, target
                ),
            });
        }

        self.entries.insert(
            target.clone(),
            AssignEntry {
                target,
                final_source,
                direct_source: source.to_string(),
                mapping: decl.mapping.clone(),
            },
        );
        Ok(())
    }
}

/// One project's resolved options, by option name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedOptions {
    pub values: BTreeMap<String, OptionValue>,
}

impl ResolvedOptions {
    pub fn get(&self, option: &str) -> Option<&OptionValue> {
        self.values.get(option)
    }

    /// The expression environment: raw values, with unset options as `""`.
    pub fn env(&self) -> Env {
        self.values
            .iter()
            .map(|(name, value)| (name.clone(), value.raw.clone().unwrap_or_default()))
            .collect()
    }
}

/// Check `raw` against the declaration's choices, then parse it by type.
pub fn parse_value(project: &str, decl: &OptionDecl, raw: &str) -> Result<ParsedValue> {
    let field = option_key(project, &decl.name);
    if let Some(choices) = &decl.choices {
        if !choices.iter().any(|choice| choice == raw) {
            return Err(Error::Validation {
                field,
                value: raw.to_string(),
                message: format!("not one of the allowed choices [{}]", choices.join(", ")),
            });
        }
    }

    let invalid = |kind: &str| Error::Validation {
        field: field.clone(),
        value: raw.to_string(),
        message: format!("not a valid {}", kind),
    };
    match decl.option_type {
        OptionType::String => Ok(ParsedValue::String(raw.to_string())),
        OptionType::Bool => Ok(ParsedValue::Bool(raw == "true")),
        OptionType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(ParsedValue::Integer)
            .map_err(|_| invalid("integer")),
        OptionType::Decimal => match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(ParsedValue::Decimal(value)),
            _ => Err(invalid("decimal")),
        },
    }
}

/// Resolves option declarations for one project at a time.
pub struct OptionResolver<'a> {
    evaluator: &'a dyn Evaluator,
}

impl<'a> OptionResolver<'a> {
    pub fn new(evaluator: &'a dyn Evaluator) -> Self {
        Self { evaluator }
    }

    /// Resolve every option `project` declares, record them in `results`,
    /// register their assigns and run the project's verifications.
    ///
    /// `specify` is only passed for the root project.
    pub fn resolve_project(
        &self,
        project: &str,
        section: &OptionSection,
        specify: Option<&SpecifyMap>,
        results: &mut Results,
        assigns: &mut AssignTable,
    ) -> Result<ResolvedOptions> {
        let mut resolved = ResolvedOptions::default();

        for decl in &section.items {
            let key = option_key(project, &decl.name);
            let value = self.resolve_one(project, decl, specify, results, assigns)?;
            if !value.is_set() && !decl.optional {
                return Err(Error::OptionRequired {
                    project: project.to_string(),
                    option: decl.name.clone(),
                });
            }
            debug!("{} = {:?} ({:?})", key, value.raw, value.source);

            results.insert(key.clone(), value.clone());
            resolved.values.insert(decl.name.clone(), value);

            for assign in &decl.assigns {
                assigns.add(&key, assign, results)?;
            }
        }

        self.verify(project, section, &resolved)?;
        Ok(resolved)
    }

    fn resolve_one(
        &self,
        project: &str,
        decl: &OptionDecl,
        specify: Option<&SpecifyMap>,
        results: &Results,
        assigns: &AssignTable,
    ) -> Result<OptionValue> {
        if let Some(raw) = specify.and_then(|map| lookup_specify(map, project, &decl.name)) {
            return self.value(project, decl, raw.to_string(), ValueSource::Specify);
        }

        let key = option_key(project, &decl.name);
        if let Some(entry) = assigns.get(&key) {
            let source_raw = results
                .get(&entry.direct_source)
                .and_then(|value| value.raw.clone());
            if let Some(source_raw) = source_raw {
                let raw = match &entry.mapping {
                    Some(mapping) => {
                        let mut env = Env::new();
                        env.insert("value".to_string(), source_raw);
                        self.evaluator.eval_string(mapping, &env)?
                    }
                    None => source_raw,
                };
                return self.value(project, decl, raw, ValueSource::Assign);
            }
            debug!(
                "{} is assigned from {} which is unset, falling back",
                key, entry.direct_source
            );
        }

        if let Some(default) = &decl.default {
            return self.value(project, decl, default.clone(), ValueSource::Default);
        }

        Ok(OptionValue::unset())
    }

    fn value(
        &self,
        project: &str,
        decl: &OptionDecl,
        raw: String,
        source: ValueSource,
    ) -> Result<OptionValue> {
        let parsed = parse_value(project, decl, &raw)?;
        Ok(OptionValue {
            raw: Some(raw),
            parsed: Some(parsed),
            source,
        })
    }

    fn verify(
        &self,
        project: &str,
        section: &OptionSection,
        resolved: &ResolvedOptions,
    ) -> Result<()> {
        let env = resolved.env();
        for expression in &section.verifies {
            let outcome = self.evaluator.eval_bool(expression, &env);
            let message = match outcome {
                Ok(true) => continue,
                Ok(false) => "evaluated to false".to_string(),
                Err(e) => format!("could not be evaluated: {}", e),
            };
            return Err(Error::VerifyFailed {
                project: project.to_string(),
                expression: expression.clone(),
                message,
            });
        }
        Ok(())
    }
}

fn lookup_specify<'m>(map: &'m SpecifyMap, project: &str, option: &str) -> Option<&'m str> {
    map.get(option)
        .or_else(|| map.get(&option_key(project, option)))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BasicEvaluator;
    use crate::manifest::parse;

    fn section(yaml: &str) -> OptionSection {
        parse(yaml).unwrap().option
    }

    #[test]
    fn test_specify_beats_assign_beats_default() {
        let producer = section(
            r#"
name: producer
option:
  items:
    - name: env
      default: prod
      assigns:
        - project: app
          option: env
"#,
        );
        let app = section(
            r#"
name: app
option:
  items:
    - name: env
      default: dev
"#,
        );
        let eval = BasicEvaluator::new();
        let resolver = OptionResolver::new(&eval);

        // specify wins
        let mut results = Results::new();
        let mut assigns = AssignTable::new();
        resolver
            .resolve_project("producer", &producer, None, &mut results, &mut assigns)
            .unwrap();
        let specify: SpecifyMap = [("env".to_string(), "staging".to_string())].into();
        let resolved = resolver
            .resolve_project("app", &app, Some(&specify), &mut results, &mut assigns)
            .unwrap();
        let env = resolved.get("env").unwrap();
        assert_eq!(env.raw.as_deref(), Some("staging"));
        assert_eq!(env.source, ValueSource::Specify);

        // without specify the assign wins
        let mut results = Results::new();
        let mut assigns = AssignTable::new();
        resolver
            .resolve_project("producer", &producer, None, &mut results, &mut assigns)
            .unwrap();
        let resolved = resolver
            .resolve_project("app", &app, None, &mut results, &mut assigns)
            .unwrap();
        let env = resolved.get("env").unwrap();
        assert_eq!(env.raw.as_deref(), Some("prod"));
        assert_eq!(env.source, ValueSource::Assign);

        // without either the default applies
        let mut results = Results::new();
        let mut assigns = AssignTable::new();
        let resolved = resolver
            .resolve_project("app", &app, None, &mut results, &mut assigns)
            .unwrap();
        assert_eq!(resolved.get("env").unwrap().source, ValueSource::Default);
        assert_eq!(results.get("app.env").unwrap().raw.as_deref(), Some("dev"));
    }

    #[test]
    fn test_specify_for_other_projects_is_ignored() {
        let lib = section("name: lib\noption:\n  items:\n    - name: env\n      default: dev\n");
        let eval = BasicEvaluator::new();
        let resolver = OptionResolver::new(&eval);
        let specify: SpecifyMap = [("app.env".to_string(), "prod".to_string())].into();
        let resolved = resolver
            .resolve_project(
                "lib",
                &lib,
                Some(&specify),
                &mut Results::new(),
                &mut AssignTable::new(),
            )
            .unwrap();
        assert_eq!(resolved.get("env").unwrap().raw.as_deref(), Some("dev"));
    }

    #[test]
    fn test_mapping_expression() {
        let producer = section(
            r#"
name: app
option:
  items:
    - name: region
      default: eu
      assigns:
        - project: lib
          option: bucket
          mapping: "bucket-${value}"
"#,
        );
        let lib = section("name: lib\noption:\n  items:\n    - name: bucket\n");
        let eval = BasicEvaluator::new();
        let resolver = OptionResolver::new(&eval);
        let mut results = Results::new();
        let mut assigns = AssignTable::new();
        resolver
            .resolve_project("app", &producer, None, &mut results, &mut assigns)
            .unwrap();
        let resolved = resolver
            .resolve_project("lib", &lib, None, &mut results, &mut assigns)
            .unwrap();
        assert_eq!(resolved.get("bucket").unwrap().raw.as_deref(), Some("bucket-eu"));
    }

    #[test]
    fn test_required_option_unset() {
        let lib = section("name: lib\noption:\n  items:\n    - name: token\n");
        let eval = BasicEvaluator::new();
        let err = OptionResolver::new(&eval)
            .resolve_project("lib", &lib, None, &mut Results::new(), &mut AssignTable::new())
            .unwrap_err();
        assert!(matches!(err, Error::OptionRequired { .. }));
    }

    #[test]
    fn test_optional_unset_binds_empty_string() {
        let lib = section(
            "name: lib\noption:\n  items:\n    - name: token\n      optional: true\n  verifies:\n    - \"token == ''\"\n",
        );
        let eval = BasicEvaluator::new();
        let resolved = OptionResolver::new(&eval)
            .resolve_project("lib", &lib, None, &mut Results::new(), &mut AssignTable::new())
            .unwrap();
        assert_eq!(resolved.get("token").unwrap().source, ValueSource::Unset);
        assert_eq!(resolved.env().get("token").map(String::as_str), Some(""));
    }

    #[test]
    fn test_choices_checked_before_type() {
        let app = section(
            r#"
name: app
option:
  items:
    - name: replicas
      type: integer
      choices: ["1", "2"]
"#,
        );
        let decl = &app.items[0];
        assert_eq!(parse_value("app", decl, "2").unwrap(), ParsedValue::Integer(2));
        let err = parse_value("app", decl, "3").unwrap_err();
        assert!(format!("{}", err).contains("allowed choices"));
    }

    #[test]
    fn test_type_parsing() {
        let app = section(
            r#"
name: app
option:
  items:
    - name: flag
      type: bool
    - name: count
      type: integer
    - name: ratio
      type: decimal
"#,
        );
        assert_eq!(
            parse_value("app", &app.items[0], "true").unwrap(),
            ParsedValue::Bool(true)
        );
        assert_eq!(
            parse_value("app", &app.items[0], "yes").unwrap(),
            ParsedValue::Bool(false)
        );
        assert!(parse_value("app", &app.items[1], "1.5").is_err());
        assert_eq!(
            parse_value("app", &app.items[2], "1.5").unwrap(),
            ParsedValue::Decimal(1.5)
        );
        assert!(parse_value("app", &app.items[2], "1,5").is_err());
        assert!(parse_value("app", &app.items[2], "inf").is_err());
    }

    fn assign(project: &str, option: &str) -> AssignDecl {
        AssignDecl {
            project: project.to_string(),
            option: option.to_string(),
            mapping: None,
        }
    }

    #[test]
    fn test_assign_conflict_and_collapse() {
        let results = Results::new();
        let mut table = AssignTable::new();

        // a.x -> b.y -> c.z, and a.x -> c.z directly: same origin
        table.add("a.x", &assign("b", "y"), &results).unwrap();
        table.add("b.y", &assign("c", "z"), &results).unwrap();
        assert_eq!(table.get("c.z").unwrap().final_source, "a.x");
        table.add("a.x", &assign("c", "z"), &results).unwrap();
        assert_eq!(table.len(), 2);

        // d.w -> c.z has a different origin
        let err = table.add("d.w", &assign("c", "z"), &results).unwrap_err();
        match err {
            Error::AssignConflict {
                target,
                existing,
                incoming,
            } => {
                assert_eq!(target, "c.z");
                assert_eq!(existing, "a.x");
                assert_eq!(incoming, "d.w");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_assign_onto_resolved_option_is_error() {
        let mut results = Results::new();
        results.insert("lib.env".to_string(), OptionValue::unset());
        let mut table = AssignTable::new();
        let err = table.add("app.env", &assign("lib", "env"), &results).unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
    }

    #[test]
    fn test_verify_failure() {
        let app = section(
            r#"
name: app
option:
  items:
    - name: port
      type: integer
      default: 0
  verifies:
    - "port != 0"
"#,
        );
        let eval = BasicEvaluator::new();
        let err = OptionResolver::new(&eval)
            .resolve_project("app", &app, None, &mut Results::new(), &mut AssignTable::new())
            .unwrap_err();
        match err {
            Error::VerifyFailed { expression, .. } => assert_eq!(expression, "port != 0"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
