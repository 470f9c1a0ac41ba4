// ABOUTME: Deploys a set of components concurrently and records their handles.
// ABOUTME: Deployer data is persisted after every component so partial progress survives.

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;

use super::{StepError, StepFailure};
use crate::deployer::{DeployerRegistry, DeploymentRequest};
use crate::manifest::ComponentSpec;
use crate::release::{AppDeployerData, Release};
use crate::store::{DeployerDataStore, Store};

/// Deploys components of one release version.
#[derive(Clone)]
pub struct DeployStep {
    registry: Arc<DeployerRegistry>,
    store: Arc<dyn Store>,
}

impl DeployStep {
    pub fn new(registry: Arc<DeployerRegistry>, store: Arc<dyn Store>) -> Self {
        Self { registry, store }
    }

    /// Deploy `components` for `release`, appending each handle to `data`.
    ///
    /// Deploy calls run concurrently; deployer data writes happen one at a time
    /// as results arrive. On failure the remaining calls still complete so
    /// every handle that was created is recorded, and nothing is undeployed.
    pub async fn run(
        &self,
        release: &Release,
        components: &[&ComponentSpec],
        mut data: AppDeployerData,
    ) -> Result<AppDeployerData, StepFailure> {
        let deployer = match self.registry.get(&release.platform) {
            Ok(deployer) => deployer,
            Err(e) => return Err(StepFailure { data, error: e.into() }),
        };
        if let Err(e) = self.store.save_deployer_data(&data).await {
            return Err(StepFailure { data, error: e.into() });
        }

        let mut pending: FuturesUnordered<_> = components
            .iter()
            .map(|spec| {
                let request = DeploymentRequest::for_component(&release.name, release.version, spec);
                let deployer = Arc::clone(&deployer);
                async move {
                    let result = deployer.deploy(&request).await;
                    (request.name, result)
                }
            })
            .collect();

        let mut failure: Option<StepError> = None;
        while let Some((component, result)) = pending.next().await {
            match result {
                Ok(id) => {
                    tracing::info!(
                        release = %release.name,
                        version = release.version,
                        component = %component,
                        deployment_id = %id,
                        "deployed component"
                    );
                    data.record(component, id);
                    if let Err(e) = self.store.save_deployer_data(&data).await {
                        failure.get_or_insert(e.into());
                    }
                }
                Err(source) => {
                    tracing::warn!(
                        release = %release.name,
                        version = release.version,
                        component = %component,
                        error = %source,
                        "component deploy failed"
                    );
                    failure.get_or_insert(StepError::Deploy { component, source });
                }
            }
        }

        match failure {
            Some(error) => Err(StepFailure { data, error }),
            None => Ok(data),
        }
    }
}
