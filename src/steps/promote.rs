// ABOUTME: Acts on a health outcome: promote the new version or cancel it.
// ABOUTME: Promotion retires the previous version; cancellation retires only the new one.

use std::sync::Arc;

use super::{DeleteStep, LiveHandles, StepError, undeploy_all};
use crate::deployer::DeployerRegistry;
use crate::diagnostics::{Diagnostics, Warning};
use crate::release::{AppDeployerData, Release, StatusCode};
use crate::store::{ReleaseStore, Store};

#[derive(Clone)]
pub struct PromoteOrCancelStep {
    registry: Arc<DeployerRegistry>,
    store: Arc<dyn Store>,
    delete: DeleteStep,
}

impl PromoteOrCancelStep {
    pub fn new(registry: Arc<DeployerRegistry>, store: Arc<dyn Store>) -> Self {
        let delete = DeleteStep::new(Arc::clone(&registry), Arc::clone(&store));
        Self {
            registry,
            store,
            delete,
        }
    }

    /// Mark `target` DEPLOYED, then undeploy `retiring` and delete `previous`.
    ///
    /// `retiring` holds the previous version's handles for components the
    /// target replaced or dropped; handles of unchanged components are left
    /// running. Returns the promoted target.
    pub async fn promote(
        &self,
        mut target: Release,
        previous: Release,
        retiring: &LiveHandles,
        description: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<Release, StepError> {
        target.status.transition(StatusCode::Deployed, description);
        let target = self.store.save(target).await?;
        tracing::info!(
            release = %target.name,
            version = target.version,
            previous = previous.version,
            "promoted release"
        );

        let note = format!("Upgraded to v{}", target.version);
        self.delete
            .run(previous, retiring, &note, diagnostics)
            .await?;
        Ok(target)
    }

    /// Undeploy every handle of the target and mark it FAILED.
    ///
    /// The previous version is not touched and stays the current release.
    pub async fn cancel(
        &self,
        mut target: Release,
        data: &AppDeployerData,
        description: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<Release, StepError> {
        let handles: LiveHandles = data.deployments.clone();
        let failed = match self.registry.get(&target.platform) {
            Ok(deployer) => undeploy_all(deployer.as_ref(), &target, &handles, diagnostics).await,
            Err(e) => {
                diagnostics.warn(Warning::undeploy_failed(format!(
                    "cannot undeploy release '{}' version {}: {e}",
                    target.name, target.version
                )));
                data.handle_count()
            }
        };
        if failed > 0 {
            diagnostics.warn(Warning::manual_cleanup(format!(
                "{failed} deployment(s) of release '{}' version {} may still be running",
                target.name, target.version
            )));
        }

        target.status.transition(StatusCode::Failed, description);
        let target = self.store.save(target).await?;
        tracing::warn!(
            release = %target.name,
            version = target.version,
            reason = description,
            "cancelled release"
        );
        Ok(target)
    }
}
