// ABOUTME: Pure comparison of two flat key/value property maps.
// ABOUTME: Partitions keys into added, removed, common, changed and deleted.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Flat string-keyed, string-valued property set.
pub type Properties = BTreeMap<String, String>;

/// A property present on both sides with a different, non-empty replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyChange {
    pub original: String,
    pub replaced: String,
}

/// Difference between an existing (left) and a proposed (right) property set.
///
/// A key whose right-hand value is empty is reported as `deleted`, not as
/// `changed`: clearing a property is treated as removing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropertiesDiff {
    removed: Properties,
    added: Properties,
    common: Properties,
    changed: BTreeMap<String, PropertyChange>,
    deleted: Properties,
}

impl PropertiesDiff {
    /// Compare `left` (existing) against `right` (proposed).
    ///
    /// A missing map is treated as empty.
    pub fn compute(left: Option<&Properties>, right: Option<&Properties>) -> Self {
        let empty = Properties::new();
        let left = left.unwrap_or(&empty);
        let right = right.unwrap_or(&empty);

        let mut diff = PropertiesDiff::default();

        for (key, original) in left {
            match right.get(key) {
                None => {
                    diff.removed.insert(key.clone(), original.clone());
                }
                Some(replaced) if replaced == original => {
                    diff.common.insert(key.clone(), original.clone());
                }
                Some(replaced) if replaced.trim().is_empty() => {
                    diff.deleted.insert(key.clone(), original.clone());
                }
                Some(replaced) => {
                    diff.changed.insert(
                        key.clone(),
                        PropertyChange {
                            original: original.clone(),
                            replaced: replaced.clone(),
                        },
                    );
                }
            }
        }

        for (key, value) in right {
            if !left.contains_key(key) {
                diff.added.insert(key.clone(), value.clone());
            }
        }

        diff
    }

    pub fn removed(&self) -> &Properties {
        &self.removed
    }

    pub fn added(&self) -> &Properties {
        &self.added
    }

    pub fn common(&self) -> &Properties {
        &self.common
    }

    pub fn changed(&self) -> &BTreeMap<String, PropertyChange> {
        &self.changed
    }

    pub fn deleted(&self) -> &Properties {
        &self.deleted
    }

    /// True when nothing was added, removed, changed or deleted.
    pub fn are_equal(&self) -> bool {
        self.removed.is_empty()
            && self.added.is_empty()
            && self.changed.is_empty()
            && self.deleted.is_empty()
    }

    /// Every actionable difference rendered as `key=(old, new)`, sorted by key.
    ///
    /// Missing sides render as `<none>`.
    pub fn change_set(&self) -> Vec<String> {
        const NONE: &str = "<none>";
        let mut entries: Vec<(&str, String)> = Vec::new();

        for (key, change) in &self.changed {
            entries.push((key, format!("{key}=({}, {})", change.original, change.replaced)));
        }
        for (key, value) in &self.added {
            entries.push((key, format!("{key}=({NONE}, {value})")));
        }
        for (key, value) in self.removed.iter().chain(&self.deleted) {
            entries.push((key, format!("{key}=({value}, {NONE})")));
        }

        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, line)| line).collect()
    }
}

impl fmt::Display for PropertiesDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.change_set().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn partitions_keys() {
        let left = props(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]);
        let right = props(&[("a", "1"), ("b", "20"), ("d", ""), ("e", "5")]);

        let diff = PropertiesDiff::compute(Some(&left), Some(&right));

        assert_eq!(diff.common(), &props(&[("a", "1")]));
        assert_eq!(diff.removed(), &props(&[("c", "3")]));
        assert_eq!(diff.added(), &props(&[("e", "5")]));
        assert_eq!(diff.deleted(), &props(&[("d", "4")]));
        assert_eq!(
            diff.changed().get("b"),
            Some(&PropertyChange {
                original: "2".to_string(),
                replaced: "20".to_string()
            })
        );
        assert!(!diff.are_equal());
    }

    #[test]
    fn clearing_a_value_is_a_deletion_not_a_change() {
        let left = props(&[("server.port", "8080")]);
        let right = props(&[("server.port", "  ")]);

        let diff = PropertiesDiff::compute(Some(&left), Some(&right));

        assert!(diff.changed().is_empty());
        assert_eq!(diff.deleted().get("server.port").map(String::as_str), Some("8080"));
    }

    #[test]
    fn setting_a_previously_empty_value_is_a_change() {
        let left = props(&[("k", "")]);
        let right = props(&[("k", "v")]);

        let diff = PropertiesDiff::compute(Some(&left), Some(&right));

        assert_eq!(diff.changed().len(), 1);
        assert!(diff.deleted().is_empty());
    }

    #[test]
    fn missing_maps_are_empty() {
        let diff = PropertiesDiff::compute(None, None);
        assert!(diff.are_equal());

        let right = props(&[("x", "1")]);
        let diff = PropertiesDiff::compute(None, Some(&right));
        assert_eq!(diff.added().len(), 1);
        assert!(!diff.are_equal());
    }

    #[test]
    fn common_only_counts_as_equal() {
        let left = props(&[("a", "1"), ("b", "2")]);
        let diff = PropertiesDiff::compute(Some(&left), Some(&left.clone()));
        assert!(diff.are_equal());
        assert_eq!(diff.common().len(), 2);
        assert!(diff.change_set().is_empty());
    }

    #[test]
    fn change_set_renders_old_and_new_values() {
        let left = props(&[("a", "1"), ("gone", "x")]);
        let right = props(&[("a", "2"), ("new", "y")]);

        let diff = PropertiesDiff::compute(Some(&left), Some(&right));

        assert_eq!(
            diff.change_set(),
            vec![
                "a=(1, 2)".to_string(),
                "gone=(x, <none>)".to_string(),
                "new=(<none>, y)".to_string(),
            ]
        );
        assert_eq!(diff.to_string(), "a=(1, 2), gone=(x, <none>), new=(<none>, y)");
    }
}
