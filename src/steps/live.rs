// ABOUTME: Resolves the handles currently serving each component of a release.
// ABOUTME: Follows base_version links for components an upgrade left untouched.

use std::collections::BTreeMap;

use super::StepError;
use crate::release::Release;
use crate::store::{DeployerDataStore, Store};
use crate::types::DeploymentId;

/// Component name to the handles serving it.
pub type LiveHandles = BTreeMap<String, Vec<DeploymentId>>;

/// Handles serving every component of `release`'s manifest.
///
/// A component missing from the release's own deployer data is looked up in
/// its base version, and so on down the chain. Components with no recorded
/// handle anywhere are omitted.
pub async fn live_handles(store: &dyn Store, release: &Release) -> Result<LiveHandles, StepError> {
    let mut pending: Vec<String> = release
        .manifest
        .components()?
        .into_iter()
        .map(|c| c.name)
        .collect();
    let mut handles = LiveHandles::new();
    let mut version = Some(release.version);

    while let Some(current) = version {
        if pending.is_empty() {
            break;
        }
        let Some(data) = store.get_deployer_data(&release.name, current).await? else {
            break;
        };
        pending.retain(|component| match data.deployments.get(component) {
            Some(ids) => {
                handles.insert(component.clone(), ids.clone());
                false
            }
            None => true,
        });
        version = data.base_version.filter(|base| *base < current);
    }

    Ok(handles)
}

/// Restrict `handles` to the named components.
pub fn select<'a>(handles: &LiveHandles, components: impl IntoIterator<Item = &'a str>) -> LiveHandles {
    components
        .into_iter()
        .filter_map(|name| handles.get(name).map(|ids| (name.to_string(), ids.clone())))
        .collect()
}
