// ABOUTME: Per-version record of backend handles for each deployed component.
// ABOUTME: Upgrades record only redeployed components and point at their base version.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{DeploymentId, ReleaseName};

/// Handles a release version received from its deployer, keyed by component.
///
/// After a red/black upgrade only the redeployed components appear here;
/// unchanged components stay with `base_version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDeployerData {
    pub release_name: ReleaseName,
    pub release_version: u32,
    /// Version whose handles serve components not redeployed by this version.
    #[serde(default)]
    pub base_version: Option<u32>,
    #[serde(default)]
    pub deployments: BTreeMap<String, Vec<DeploymentId>>,
}

impl AppDeployerData {
    pub fn new(release_name: ReleaseName, release_version: u32, base_version: Option<u32>) -> Self {
        Self {
            release_name,
            release_version,
            base_version,
            deployments: BTreeMap::new(),
        }
    }

    /// Append a handle for `component`.
    pub fn record(&mut self, component: impl Into<String>, id: DeploymentId) {
        self.deployments.entry(component.into()).or_default().push(id);
    }

    pub fn handles(&self, component: &str) -> &[DeploymentId] {
        self.deployments
            .get(component)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, component: &str) -> bool {
        self.deployments.contains_key(component)
    }

    /// Every `(component, handle)` pair in component order.
    pub fn all_handles(&self) -> impl Iterator<Item = (&str, &DeploymentId)> {
        self.deployments
            .iter()
            .flat_map(|(name, ids)| ids.iter().map(move |id| (name.as_str(), id)))
    }

    pub fn handle_count(&self) -> usize {
        self.deployments.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.handle_count() == 0
    }
}
