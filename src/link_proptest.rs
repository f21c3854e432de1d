//! Property-based tests for link parsing and cache path encoding.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::git::encode_path_component;
    use crate::link::{GitRef, Link, LinkKind};
    use crate::merge::{format_path, parse_path};
    use proptest::prelude::*;

    fn git_ref() -> impl Strategy<Value = GitRef> {
        prop_oneof![
            "[a-zA-Z0-9._-]{1,12}".prop_map(GitRef::Branch),
            "[a-zA-Z0-9._-]{1,12}".prop_map(GitRef::Tag),
        ]
    }

    // ============================================================================
    // Link normalization
    // ============================================================================

    proptest! {
        /// Property: a normalized registry link parses back to the same link
        #[test]
        fn registry_normalized_round_trips(
            name in "[a-z][a-z0-9_-]{0,10}",
            subpath in proptest::option::of("[a-z]{1,8}(/[a-z]{1,8}){0,2}"),
            git_ref in git_ref(),
        ) {
            let raw = match &subpath {
                Some(sub) => format!("@{}/{}#ref={}", name, sub, git_ref.normalized()),
                None => format!("@{}#ref={}", name, git_ref.normalized()),
            };
            let link = Link::parse(&raw).unwrap();
            prop_assert_eq!(
                &link.kind,
                &LinkKind::Registry { name: name.clone(), subpath: subpath.clone(), git_ref: Some(git_ref.clone()) }
            );
            let reparsed = Link::parse(&link.normalized()).unwrap();
            prop_assert_eq!(reparsed.kind, link.kind);
        }

        /// Property: normalization is idempotent for git links
        #[test]
        fn git_normalization_is_idempotent(
            repo in "[a-z]{1,8}/[a-z]{1,8}",
            git_ref in proptest::option::of(git_ref()),
        ) {
            let raw = match &git_ref {
                Some(r) => format!("git:https://example.com/{}.git#ref={}", repo, r.name()),
                None => format!("git:https://example.com/{}.git", repo),
            };
            let once = Link::parse(&raw).unwrap().normalized();
            let twice = Link::parse(&once).unwrap().normalized();
            prop_assert_eq!(&once, &twice);
            prop_assert!(once.contains("#ref=branch/") || once.contains("#ref=tag/"));
        }

        /// Property: directory links keep their path verbatim
        #[test]
        fn dir_links_keep_path(path in "[a-z./_-]{1,24}") {
            let link = Link::parse(&format!("dir:{}", path)).unwrap();
            prop_assert_eq!(link.kind, LinkKind::Dir { path });
        }
    }

    // ============================================================================
    // encode_path_component property tests
    // ============================================================================

    proptest! {
        /// Property: encoded components never contain separators or traverse
        #[test]
        fn encoded_component_is_single_safe_segment(input in ".*") {
            let result = encode_path_component(&input);
            for ch in ['/', '\\', ':', '*', '?', '"', '<', '>', '|'] {
                prop_assert!(!result.contains(ch));
            }
            prop_assert!(result != "." && result != "..");
        }

        /// Property: distinct inputs never share an encoded component
        #[test]
        fn encoded_component_is_injective(a in ".{0,12}", b in ".{0,12}") {
            prop_assume!(a != b);
            prop_assert_ne!(encode_path_component(&a), encode_path_component(&b));
        }

        /// Property: inputs differing only in a separator stay apart
        #[test]
        fn encoded_component_separates_lookalikes(
            left in "[a-z0-9]{1,8}",
            right in "[a-z0-9]{1,8}",
            sep in "[/:\\\\ _+-]",
        ) {
            let underscore = encode_path_component(&format!("{}_{}", left, right));
            let other = format!("{}{}{}", left, sep, right);
            prop_assume!(sep != "_");
            prop_assert_ne!(encode_path_component(&other), underscore);
        }
    }

    // ============================================================================
    // Merge-mode path notation
    // ============================================================================

    proptest! {
        /// Property: plain dotted keys survive parse/format unchanged
        #[test]
        fn dotted_path_round_trips(path in "[a-z_]{1,6}(\\.[a-z_]{1,6}){0,4}") {
            prop_assert_eq!(format_path(&parse_path(&path)), path);
        }
    }
}
