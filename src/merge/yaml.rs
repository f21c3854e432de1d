//! YAML tree merging
//!
//! Config values are held as [`serde_yaml::Value`] regardless of the format
//! they were written in. [`merge_source`] folds one source into the
//! accumulated tree:
//!
//! - Mappings: merged key by key, recursively
//! - Sequences: appended, or prepended under `insert`
//! - Scalars: the incoming value wins
//! - `replace`: the incoming value is taken as-is at that path
//!
//! A null accumulated value is always replaced. Any other combination of a
//! mapping, a sequence and a scalar is a merge error naming the source and
//! the dotted key.

use log::debug;
use serde_yaml::Value as YamlValue;

use super::{format_path, MergeMode, MergeModes, PathSegment};
use crate::error::{Error, Result};

/// Fold `incoming`, read from `source_path`, into `acc`.
pub fn merge_source(
    acc: &mut YamlValue,
    incoming: &YamlValue,
    modes: &MergeModes,
    source_path: &str,
) -> Result<()> {
    let mut path = Vec::new();
    merge_yaml_values(acc, incoming, modes, &mut path, source_path)
}

/// Recursively merge `incoming` into `acc` at `path`.
pub fn merge_yaml_values(
    acc: &mut YamlValue,
    incoming: &YamlValue,
    modes: &MergeModes,
    path: &mut Vec<PathSegment>,
    source_path: &str,
) -> Result<()> {
    match modes.get(path) {
        Some(MergeMode::Replace) => {
            debug!("{}: replacing '{}'", source_path, format_path(path));
            *acc = incoming.clone();
            return Ok(());
        }
        Some(MergeMode::Insert) => {
            return insert_sequence(acc, incoming, path, source_path);
        }
        None => {}
    }

    if acc.is_null() {
        *acc = incoming.clone();
        return Ok(());
    }

    match (acc, incoming) {
        (YamlValue::Mapping(acc_map), YamlValue::Mapping(incoming_map)) => {
            for (key, value) in incoming_map {
                match acc_map.get_mut(key) {
                    Some(existing) => {
                        path.push(PathSegment::Key(key_to_string(key)));
                        let merged = merge_yaml_values(existing, value, modes, path, source_path);
                        path.pop();
                        merged?;
                    }
                    None => {
                        acc_map.insert(key.clone(), value.clone());
                    }
                }
            }
            Ok(())
        }
        (YamlValue::Sequence(acc_seq), YamlValue::Sequence(incoming_seq)) => {
            acc_seq.extend(incoming_seq.iter().cloned());
            Ok(())
        }
        (acc, incoming) if is_scalar(acc) && is_scalar(incoming) => {
            *acc = incoming.clone();
            Ok(())
        }
        (acc, incoming) => Err(mismatch(acc, incoming, path, source_path)),
    }
}

fn insert_sequence(
    acc: &mut YamlValue,
    incoming: &YamlValue,
    path: &[PathSegment],
    source_path: &str,
) -> Result<()> {
    match (acc, incoming) {
        (YamlValue::Sequence(acc_seq), YamlValue::Sequence(incoming_seq)) => {
            let mut combined = incoming_seq.clone();
            combined.append(acc_seq);
            *acc_seq = combined;
            Ok(())
        }
        (acc, YamlValue::Sequence(_)) if acc.is_null() => {
            *acc = incoming.clone();
            Ok(())
        }
        (acc, incoming) => Err(Error::Merge {
            source_path: source_path.to_string(),
            key: format_path(path),
            message: format!(
                "insert needs lists on both sides, found {} and {}",
                get_yaml_type_name(acc),
                get_yaml_type_name(incoming)
            ),
        }),
    }
}

fn is_scalar(value: &YamlValue) -> bool {
    !matches!(value, YamlValue::Mapping(_) | YamlValue::Sequence(_))
}

fn mismatch(
    acc: &YamlValue,
    incoming: &YamlValue,
    path: &[PathSegment],
    source_path: &str,
) -> Error {
    Error::Merge {
        source_path: source_path.to_string(),
        key: format_path(path),
        message: format!(
            "cannot merge {} into {}",
            get_yaml_type_name(incoming),
            get_yaml_type_name(acc)
        ),
    }
}

fn key_to_string(key: &YamlValue) -> String {
    match key {
        YamlValue::String(s) => s.clone(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Bool(b) => b.to_string(),
        other => format!("{:?}", other),
    }
}

/// Get a human-readable type name for a YAML value
pub fn get_yaml_type_name(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "null",
        YamlValue::Bool(_) => "bool",
        YamlValue::Number(_) => "number",
        YamlValue::String(_) => "string",
        YamlValue::Sequence(_) => "list",
        YamlValue::Mapping(_) => "map",
        YamlValue::Tagged(_) => "tagged value",
    }
}
