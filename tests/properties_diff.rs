// ABOUTME: Property-based tests for the properties differ.
// ABOUTME: Checks partitioning and equality laws over arbitrary string maps.

use berth::diff::{Properties, PropertiesDiff};
use proptest::prelude::*;

fn properties() -> impl Strategy<Value = Properties> {
    prop::collection::btree_map("[a-e]{1,2}", "[a-z0-9]{1,3}", 0..8)
}

proptest! {
    #[test]
    fn added_and_removed_never_overlap_changed(left in properties(), right in properties()) {
        let diff = PropertiesDiff::compute(Some(&left), Some(&right));

        for key in diff.changed().keys() {
            prop_assert!(!diff.added().contains_key(key));
            prop_assert!(!diff.removed().contains_key(key));
        }
    }

    #[test]
    fn every_key_lands_in_exactly_one_bucket(left in properties(), right in properties()) {
        let diff = PropertiesDiff::compute(Some(&left), Some(&right));

        for key in left.keys().chain(right.keys()) {
            let buckets = [
                diff.added().contains_key(key),
                diff.removed().contains_key(key),
                diff.common().contains_key(key),
                diff.deleted().contains_key(key),
                diff.changed().contains_key(key),
            ];
            prop_assert_eq!(buckets.iter().filter(|hit| **hit).count(), 1);
        }
    }

    #[test]
    fn equality_matches_map_equality(left in properties(), right in properties()) {
        let diff = PropertiesDiff::compute(Some(&left), Some(&right));
        prop_assert_eq!(diff.are_equal(), left == right);
    }

    #[test]
    fn diff_with_itself_is_equal(map in properties()) {
        let diff = PropertiesDiff::compute(Some(&map), Some(&map));
        prop_assert!(diff.are_equal());
        prop_assert_eq!(diff.common(), &map);
        prop_assert!(diff.change_set().is_empty());
    }

    #[test]
    fn missing_map_behaves_as_empty(map in properties()) {
        let missing = PropertiesDiff::compute(None, Some(&map));
        let empty = PropertiesDiff::compute(Some(&Properties::new()), Some(&map));
        prop_assert_eq!(missing.added(), empty.added());
        prop_assert_eq!(missing.are_equal(), map.is_empty());
    }
}

#[test]
fn clearing_a_value_is_a_deletion_not_a_change() {
    let left = Properties::from([("memory".to_string(), "512m".to_string())]);
    let right = Properties::from([("memory".to_string(), "  ".to_string())]);

    let diff = PropertiesDiff::compute(Some(&left), Some(&right));

    assert!(diff.changed().is_empty());
    assert_eq!(diff.deleted().get("memory").map(String::as_str), Some("512m"));
    assert!(!diff.are_equal());
}
