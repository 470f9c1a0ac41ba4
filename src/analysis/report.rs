// ABOUTME: Result of comparing an existing manifest with a candidate.
// ABOUTME: Lists components to deploy, unchanged and retired, plus a readable summary.

use crate::diff::PropertiesDiff;
use crate::manifest::ComponentSpec;

/// Why a component is being deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Not present in the existing manifest.
    Added,
    /// Present in both, with differing properties, resource or count.
    Modified,
}

/// A component flagged for deployment, with the difference that triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentChange {
    pub name: String,
    pub kind: ChangeKind,
    pub diff: PropertiesDiff,
}

/// Output of [`ReleaseAnalyzer::analyze`](super::ReleaseAnalyzer::analyze).
#[derive(Debug, Clone)]
pub struct ReleaseAnalysisReport {
    pub(super) components: Vec<ComponentSpec>,
    pub(super) changes: Vec<ComponentChange>,
    pub(super) unchanged: Vec<String>,
    pub(super) retired: Vec<String>,
}

impl ReleaseAnalysisReport {
    /// Names of components to deploy, in candidate manifest order.
    pub fn to_deploy(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn changes(&self) -> &[ComponentChange] {
        &self.changes
    }

    pub fn unchanged(&self) -> &[String] {
        &self.unchanged
    }

    /// Components present only in the existing manifest.
    pub fn retired(&self) -> &[String] {
        &self.retired
    }

    /// Every component of the candidate manifest.
    pub fn components(&self) -> &[ComponentSpec] {
        &self.components
    }

    /// Candidate specs for the components flagged for deployment.
    pub fn specs_to_deploy(&self) -> Vec<&ComponentSpec> {
        self.components
            .iter()
            .filter(|spec| self.changes.iter().any(|c| c.name == spec.name))
            .collect()
    }

    /// True when nothing needs deploying or retiring.
    pub fn is_equal(&self) -> bool {
        self.changes.is_empty() && self.retired.is_empty()
    }

    /// Human-readable difference summary for logs and status descriptions.
    pub fn summary(&self) -> String {
        if self.is_equal() {
            return "no changes".to_string();
        }

        let mut parts = Vec::new();
        for change in &self.changes {
            match change.kind {
                ChangeKind::Added => parts.push(format!("{}: added", change.name)),
                ChangeKind::Modified => parts.push(format!("{}: {}", change.name, change.diff)),
            }
        }
        for name in &self.retired {
            parts.push(format!("{name}: retired"));
        }
        parts.join("; ")
    }
}
