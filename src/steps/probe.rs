// ABOUTME: Summarises live backend health for a release's components.
// ABOUTME: Used by status queries and the reconciler to annotate platform status.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::fmt;

use super::LiveHandles;
use crate::deployer::{Deployer, DeploymentState};
use crate::diagnostics::{Diagnostics, Warning};
use crate::release::Release;

/// Aggregated state per component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformStatus {
    components: BTreeMap<String, DeploymentState>,
}

impl PlatformStatus {
    pub fn components(&self) -> &BTreeMap<String, DeploymentState> {
        &self.components
    }

    pub fn deployed_count(&self) -> usize {
        self.components
            .values()
            .filter(|s| **s == DeploymentState::Deployed)
            .count()
    }

    pub fn all_deployed(&self) -> bool {
        self.deployed_count() == self.components.len()
    }
}

impl fmt::Display for PlatformStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all_deployed() {
            return f.write_str("All applications have been successfully deployed.");
        }
        let detail = self
            .components
            .iter()
            .map(|(name, state)| format!("{name}={state}"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "{} of {} applications deployed: {detail}",
            self.deployed_count(),
            self.components.len()
        )
    }
}

/// Query every handle once and fold the results per component.
///
/// A component is `deployed` when all its handles are, `partial` when only
/// some are, and otherwise takes the state of its first unhealthy handle.
/// Status call failures count as `error` and are recorded as warnings.
pub async fn probe(
    deployer: &dyn Deployer,
    release: &Release,
    handles: &LiveHandles,
    diagnostics: &mut Diagnostics,
) -> PlatformStatus {
    let mut components = BTreeMap::new();

    for (component, ids) in handles {
        let results = join_all(ids.iter().map(|id| deployer.status(id))).await;
        let mut states = Vec::with_capacity(results.len());
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(status) => states.push(status.state),
                Err(e) => {
                    diagnostics.warn(Warning::status_probe(format!(
                        "status of '{id}' ({} v{} {component}) unavailable: {e}",
                        release.name, release.version
                    )));
                    states.push(DeploymentState::Error);
                }
            }
        }
        components.insert(component.clone(), fold_states(&states));
    }

    PlatformStatus { components }
}

fn fold_states(states: &[DeploymentState]) -> DeploymentState {
    let deployed = states
        .iter()
        .filter(|s| **s == DeploymentState::Deployed)
        .count();
    match deployed {
        _ if states.is_empty() => DeploymentState::Unknown,
        n if n == states.len() => DeploymentState::Deployed,
        0 => states[0],
        _ => DeploymentState::Partial,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(pairs: &[(&str, DeploymentState)]) -> PlatformStatus {
        PlatformStatus {
            components: pairs.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
        }
    }

    #[test]
    fn all_deployed_summary() {
        let s = status(&[("a", DeploymentState::Deployed), ("b", DeploymentState::Deployed)]);
        assert_eq!(s.to_string(), "All applications have been successfully deployed.");
    }

    #[test]
    fn partial_summary_lists_every_component() {
        let s = status(&[("a", DeploymentState::Deployed), ("b", DeploymentState::Failed)]);
        assert_eq!(s.to_string(), "1 of 2 applications deployed: a=deployed, b=failed");
        assert!(!s.all_deployed());
    }

    #[test]
    fn fold_mixed_states() {
        use DeploymentState::*;
        assert_eq!(fold_states(&[Deployed, Deployed]), Deployed);
        assert_eq!(fold_states(&[Deployed, Failed]), Partial);
        assert_eq!(fold_states(&[Failed, Deploying]), Failed);
        assert_eq!(fold_states(&[]), Unknown);
    }
}
