// ABOUTME: Best-effort undeploy of a release's handles followed by DELETING and DELETED.
// ABOUTME: Individual undeploy failures become warnings and never abort the step.

use std::sync::Arc;

use super::{LiveHandles, StepError, undeploy_all};
use crate::deployer::DeployerRegistry;
use crate::diagnostics::{Diagnostics, Warning};
use crate::release::{Release, StatusCode};
use crate::store::{ReleaseStore, Store};

#[derive(Clone)]
pub struct DeleteStep {
    registry: Arc<DeployerRegistry>,
    store: Arc<dyn Store>,
}

impl DeleteStep {
    pub fn new(registry: Arc<DeployerRegistry>, store: Arc<dyn Store>) -> Self {
        Self { registry, store }
    }

    /// Undeploy `handles` and move `release` through DELETING to DELETED.
    ///
    /// Returns the saved, deleted release. Only store failures are errors.
    pub async fn run(
        &self,
        mut release: Release,
        handles: &LiveHandles,
        description: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<Release, StepError> {
        release
            .status
            .transition(StatusCode::Deleting, format!("{description} (in progress)"));
        let release = self.store.save(release).await?;

        match self.registry.get(&release.platform) {
            Ok(deployer) => {
                undeploy_all(deployer.as_ref(), &release, handles, diagnostics).await;
            }
            Err(e) => diagnostics.warn(Warning::undeploy_failed(format!(
                "cannot undeploy release '{}' version {}: {e}",
                release.name, release.version
            ))),
        }

        let mut release = release;
        release.status.transition(StatusCode::Deleted, description);
        let release = self.store.save(release).await?;
        tracing::info!(release = %release.name, version = release.version, "release deleted");
        Ok(release)
    }
}
