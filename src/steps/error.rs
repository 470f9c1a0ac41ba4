// ABOUTME: Error types for deployment steps.
// ABOUTME: Wraps deployer, registry, store and manifest failures with component context.

use crate::deployer::{DeployerError, RegistryError};
use crate::manifest::ManifestError;
use crate::release::AppDeployerData;
use crate::store::StoreError;

/// Errors that can occur while running a deployment step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// A backend failed to deploy a component.
    #[error("component '{component}' failed to deploy: {source}")]
    Deploy {
        component: String,
        #[source]
        source: DeployerError,
    },

    /// The release's platform has no bound deployer.
    #[error(transparent)]
    Platform(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// A failed deploy step together with the handles it managed to record.
#[derive(Debug)]
pub struct StepFailure {
    pub data: AppDeployerData,
    pub error: StepError,
}
