// ABOUTME: Compares two manifests component by component.
// ABOUTME: A component is redeployed when its resource, count or any property differs.

use std::collections::HashSet;

use super::report::{ChangeKind, ComponentChange, ReleaseAnalysisReport};
use crate::diff::{Properties, PropertiesDiff};
use crate::manifest::{ComponentSpec, Manifest, ManifestError};

const RESOURCE_KEY: &str = "resource";
const COUNT_KEY: &str = "count";
const APP_PREFIX: &str = "app.";
const DEPLOYMENT_PREFIX: &str = "deployment.";

/// Decides which components of a candidate manifest must be redeployed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseAnalyzer;

impl ReleaseAnalyzer {
    /// Analyze `candidate` against `existing` (`None` for a first install).
    ///
    /// # Errors
    ///
    /// Returns a `ManifestError` if either manifest fails to parse; no partial
    /// report is produced.
    pub fn analyze(
        &self,
        existing: Option<&Manifest>,
        candidate: &Manifest,
    ) -> Result<ReleaseAnalysisReport, ManifestError> {
        let components = candidate.components()?;
        let existing = match existing {
            Some(manifest) => manifest.components()?,
            None => Vec::new(),
        };

        let mut changes = Vec::new();
        let mut unchanged = Vec::new();

        for spec in &components {
            match existing.iter().find(|old| old.name == spec.name) {
                None => changes.push(ComponentChange {
                    name: spec.name.clone(),
                    kind: ChangeKind::Added,
                    diff: PropertiesDiff::compute(None, Some(&comparable(spec))),
                }),
                Some(old) => {
                    let diff =
                        PropertiesDiff::compute(Some(&comparable(old)), Some(&comparable(spec)));
                    if diff.are_equal() {
                        unchanged.push(spec.name.clone());
                    } else {
                        changes.push(ComponentChange {
                            name: spec.name.clone(),
                            kind: ChangeKind::Modified,
                            diff,
                        });
                    }
                }
            }
        }

        let candidate_names: HashSet<&str> = components.iter().map(|c| c.name.as_str()).collect();
        let retired = existing
            .iter()
            .filter(|old| !candidate_names.contains(old.name.as_str()))
            .map(|old| old.name.clone())
            .collect();

        let report = ReleaseAnalysisReport {
            components,
            changes,
            unchanged,
            retired,
        };
        tracing::debug!(summary = %report.summary(), "analyzed release");
        Ok(report)
    }
}

/// Flatten everything that affects a deployment into one property map.
fn comparable(spec: &ComponentSpec) -> Properties {
    let mut props = Properties::new();
    props.insert(RESOURCE_KEY.to_string(), spec.resource.clone());
    props.insert(COUNT_KEY.to_string(), spec.count.to_string());
    for (key, value) in &spec.application_properties {
        props.insert(format!("{APP_PREFIX}{key}"), value.clone());
    }
    for (key, value) in &spec.deployment_properties {
        props.insert(format!("{DEPLOYMENT_PREFIX}{key}"), value.clone());
    }
    props
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(docs: &[(&str, &str, &str)]) -> Manifest {
        let text = docs
            .iter()
            .map(|(name, resource, props)| {
                format!(
                    "metadata:\n  name: {name}\nspec:\n  resource: {resource}\n  applicationProperties: {props}\n"
                )
            })
            .collect::<Vec<_>>()
            .join("---\n");
        Manifest::new(text)
    }

    #[test]
    fn first_install_deploys_everything() {
        let candidate = manifest(&[("a", "r1", "{}"), ("b", "r2", "{}")]);
        let report = ReleaseAnalyzer.analyze(None, &candidate).unwrap();

        assert_eq!(report.to_deploy(), vec!["a", "b"]);
        assert!(report.changes().iter().all(|c| c.kind == ChangeKind::Added));
        assert!(!report.is_equal());
    }

    #[test]
    fn identical_manifests_are_equal() {
        let m = manifest(&[("a", "r1", "{x: 1}"), ("b", "r2", "{}")]);
        let report = ReleaseAnalyzer.analyze(Some(&m), &m.clone()).unwrap();

        assert!(report.is_equal());
        assert!(report.to_deploy().is_empty());
        assert_eq!(report.unchanged(), &["a".to_string(), "b".to_string()]);
        assert_eq!(report.summary(), "no changes");
    }

    #[test]
    fn property_change_flags_only_that_component() {
        let old = manifest(&[("a", "r1", "{x: 1}"), ("b", "r2", "{}")]);
        let new = manifest(&[("a", "r1", "{x: 2}"), ("b", "r2", "{}")]);
        let report = ReleaseAnalyzer.analyze(Some(&old), &new).unwrap();

        assert_eq!(report.to_deploy(), vec!["a"]);
        assert_eq!(report.unchanged(), &["b".to_string()]);
        assert_eq!(report.summary(), "a: app.x=(1, 2)");
        assert_eq!(report.specs_to_deploy().len(), 1);
    }

    #[test]
    fn resource_change_flags_component() {
        let old = manifest(&[("a", "r1", "{}")]);
        let new = manifest(&[("a", "r1b", "{}")]);
        let report = ReleaseAnalyzer.analyze(Some(&old), &new).unwrap();

        assert_eq!(report.to_deploy(), vec!["a"]);
        assert!(report.summary().contains("resource=(r1, r1b)"));
    }

    #[test]
    fn removed_component_is_retired() {
        let old = manifest(&[("a", "r1", "{}"), ("b", "r2", "{}")]);
        let new = manifest(&[("a", "r1", "{}")]);
        let report = ReleaseAnalyzer.analyze(Some(&old), &new).unwrap();

        assert!(report.to_deploy().is_empty());
        assert_eq!(report.retired(), &["b".to_string()]);
        assert!(!report.is_equal());
        assert_eq!(report.summary(), "b: retired");
    }

    #[test]
    fn unparseable_candidate_fails_fast() {
        let old = manifest(&[("a", "r1", "{}")]);
        let result = ReleaseAnalyzer.analyze(Some(&old), &Manifest::new("spec: ["));
        assert!(result.is_err());
    }
}
