//! Phase 4: Composite Config Construction
//!
//! Folds the ordered config sources into a single tree, starting from an
//! empty accumulator. Each source is merged with its own merge modes; see
//! [`crate::merge::yaml`] for the rules.

use log::debug;
use serde_yaml::Value as YamlValue;

use super::ConfigSource;
use crate::error::Result;
use crate::merge::yaml::merge_source;

/// Execute Phase 4: merge `sources` in order.
pub fn execute(sources: &[ConfigSource]) -> Result<YamlValue> {
    let mut composite = YamlValue::Mapping(Default::default());
    for source in sources {
        if source.values.is_null() {
            debug!("{} carries no values", source.path.display());
            continue;
        }
        let display = source.path.display().to_string();
        merge_source(&mut composite, &source.values, &source.modes, &display)?;
    }
    Ok(composite)
}
