// ABOUTME: Deployer capability consumed by the deployment steps.
// ABOUTME: Backends implement deploy, status and undeploy; handles are opaque.

mod registry;
mod request;

pub use registry::{DeployerRegistry, RegistryError};
pub use request::{
    ATTR_APPLICATION_NAME, ATTR_RELEASE_NAME, ATTR_RELEASE_VERSION, DeploymentRequest,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::DeploymentId;

/// A platform-specific backend that runs components.
///
/// Implementations are bound to one account at startup and must be safe to
/// call concurrently for different handles.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Launch a component and return the handle identifying it.
    async fn deploy(&self, request: &DeploymentRequest) -> Result<DeploymentId, DeployerError>;

    /// Report the live state of a deployed component.
    async fn status(&self, id: &DeploymentId) -> Result<AppStatus, DeployerError>;

    /// Stop and remove a deployed component.
    async fn undeploy(&self, id: &DeploymentId) -> Result<(), DeployerError>;
}

/// Live state of a deployment as reported by its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    Deploying,
    Deployed,
    Undeployed,
    /// Some instances are deployed, others are not.
    Partial,
    Failed,
    /// The backend could not determine the state.
    Error,
    Unknown,
}

impl DeploymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentState::Deploying => "deploying",
            DeploymentState::Deployed => "deployed",
            DeploymentState::Undeployed => "undeployed",
            DeploymentState::Partial => "partial",
            DeploymentState::Failed => "failed",
            DeploymentState::Error => "error",
            DeploymentState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-instance detail within an [`AppStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStatus {
    pub id: String,
    pub state: DeploymentState,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Health of one deployment handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppStatus {
    pub deployment_id: DeploymentId,
    pub state: DeploymentState,
    #[serde(default)]
    pub instances: Vec<InstanceStatus>,
}

impl AppStatus {
    pub fn new(deployment_id: DeploymentId, state: DeploymentState) -> Self {
        Self {
            deployment_id,
            state,
            instances: Vec::new(),
        }
    }

    pub fn is_deployed(&self) -> bool {
        self.state == DeploymentState::Deployed
    }
}

/// Errors reported by deployer backends.
#[derive(Debug, thiserror::Error)]
pub enum DeployerError {
    /// The backend rejected or failed a deploy request.
    #[error("failed to deploy '{name}': {reason}")]
    DeployFailed { name: String, reason: String },

    /// The handle is not known to the backend.
    #[error("unknown deployment '{0}'")]
    UnknownDeployment(DeploymentId),

    /// The backend failed to undeploy a handle.
    #[error("failed to undeploy '{id}': {reason}")]
    UndeployFailed { id: DeploymentId, reason: String },

    /// The backend could not be reached.
    #[error("deployer unavailable: {0}")]
    Unavailable(String),
}
