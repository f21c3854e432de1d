//! Phase 3: Determining Merge Order
//!
//! Config sources arrive in collection order: imported projects in
//! first-discovery order, then the root, each project's files in
//! lexicographic order. This phase sorts them by their declared `order`,
//! ascending. The sort is stable, so sources sharing an `order` keep
//! collection order and the root's sources merge after its imports'.
//!
//! Later sources merge last, so a larger `order` wins scalar conflicts.

use log::debug;

use super::ConfigSource;

/// Execute Phase 3: sort config sources into merge order.
pub fn execute(mut sources: Vec<ConfigSource>) -> Vec<ConfigSource> {
    sources.sort_by_key(|source| source.order);
    for (idx, source) in sources.iter().enumerate() {
        debug!(
            "merge #{}: {} (order {}, project {})",
            idx,
            source.path.display(),
            source.order,
            source.project
        );
    }
    sources
}
