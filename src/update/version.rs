//! Dotted version string comparison
//!
//! Release tags in the wild carry prefixes ("v2.0.0") and suffixes
//! ("1.2.0-beta"), so parsing is lossy on purpose: everything except digits
//! and dots is stripped, and any segment that still fails to parse counts
//! as 0. Parsing never fails.

use std::cmp::Ordering;

/// Parse a version string into its numeric components.
///
/// `"v1.0.13"` → `[1, 0, 13]`, `"2.0.0-beta"` → `[2, 0, 0]`.
pub fn parse_version(raw: &str) -> Vec<u64> {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();

    cleaned
        .split('.')
        .map(|segment| segment.parse::<u64>().unwrap_or(0))
        .collect()
}

/// Compare two version strings component-wise.
///
/// The shorter sequence is padded with trailing zeros, so `"1.0"` and
/// `"1.0.0"` compare equal.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = parse_version(a);
    let mut right = parse_version(b);

    let len = left.len().max(right.len());
    left.resize(len, 0);
    right.resize(len, 0);

    left.cmp(&right)
}

/// True if `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare_versions(candidate, current) == Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_plain() {
        assert_eq!(parse_version("1.0.13"), vec![1, 0, 13]);
    }

    #[test]
    fn test_parse_strips_prefix_and_suffix() {
        assert_eq!(parse_version("v2.0.0-beta"), vec![2, 0, 0]);
        assert_eq!(parse_version("release-10.4"), vec![10, 4]);
    }

    #[test]
    fn test_parse_empty_segment_defaults_to_zero() {
        assert_eq!(parse_version("1..2"), vec![1, 0, 2]);
        assert_eq!(parse_version(""), vec![0]);
    }

    #[test]
    fn test_compare_known_pairs() {
        assert_eq!(compare_versions("1.0.0", "1.0.12"), Ordering::Less);
        assert_eq!(compare_versions("1.0.13", "1.0.12"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.12", "1.0.12"), Ordering::Equal);
        assert_eq!(compare_versions("2.0.0", "1.0.12"), Ordering::Greater);
    }

    #[test]
    fn test_compare_pads_missing_components() {
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn test_is_newer() {
        assert!(is_newer("1.0.13", "1.0.12"));
        assert!(!is_newer("1.0.12", "1.0.12"));
        assert!(!is_newer("1.0.11", "1.0.12"));
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(s in "\\PC*") {
            let _ = parse_version(&s);
        }

        #[test]
        fn prop_compare_is_antisymmetric(a in "[0-9v.\\-a-z]{0,16}", b in "[0-9v.\\-a-z]{0,16}") {
            let forward = compare_versions(&a, &b);
            let backward = compare_versions(&b, &a);
            prop_assert_eq!(forward, backward.reverse());
        }

        #[test]
        fn prop_compare_is_reflexive(a in "[0-9v.\\-a-z]{0,16}") {
            prop_assert_eq!(compare_versions(&a, &a), Ordering::Equal);
        }
    }
}
