// ABOUTME: The four deployment steps and the helpers they share.
// ABOUTME: Deploy, health check, promote-or-cancel and delete.

mod delete;
mod deploy;
mod error;
mod health;
mod live;
mod probe;
mod promote;

pub use delete::DeleteStep;
pub use deploy::DeployStep;
pub use error::{StepError, StepFailure};
pub use health::{HealthCheckStep, HealthOutcome};
pub use live::{LiveHandles, live_handles, select};
pub use probe::{PlatformStatus, probe};
pub use promote::PromoteOrCancelStep;

use futures::future::join_all;

use crate::deployer::Deployer;
use crate::diagnostics::{Diagnostics, Warning};
use crate::release::Release;

/// Undeploy every handle, recording failures as warnings.
///
/// Returns the number of handles that failed to undeploy.
pub(crate) async fn undeploy_all(
    deployer: &dyn Deployer,
    release: &Release,
    handles: &LiveHandles,
    diagnostics: &mut Diagnostics,
) -> usize {
    let targets: Vec<_> = handles
        .iter()
        .flat_map(|(component, ids)| ids.iter().map(move |id| (component, id)))
        .collect();
    let results = join_all(targets.iter().map(|(_, id)| deployer.undeploy(id))).await;

    let mut failed = 0;
    for ((component, id), result) in targets.iter().zip(results) {
        match result {
            Ok(()) => tracing::info!(
                release = %release.name,
                version = release.version,
                component = %component,
                deployment_id = %id,
                "undeployed component"
            ),
            Err(e) => {
                failed += 1;
                diagnostics.warn(Warning::undeploy_failed(format!(
                    "failed to undeploy '{id}' ({component}) of release '{}' version {}: {e}",
                    release.name, release.version
                )));
            }
        }
    }
    failed
}
