// ABOUTME: Orchestrator error types with SNAFU pattern.
// ABOUTME: One error per failure class plus a kind for programmatic handling.

use snafu::Snafu;

use super::lock::LockHolderInfo;
use super::machine::InvalidTransition;
use crate::manifest::ManifestError;
use crate::release::StatusCode;
use crate::steps::StepError;
use crate::store::StoreError;
use crate::types::ReleaseName;

/// Errors returned by orchestrator operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum OrchestratorError {
    #[snafu(display("release '{name}' not found"))]
    NotFound { name: String },

    #[snafu(display("release '{name}' has no version {version}"))]
    VersionNotFound { name: ReleaseName, version: i64 },

    #[snafu(display("release '{name}' already exists (version {version} is {status})"))]
    AlreadyExists {
        name: ReleaseName,
        version: u32,
        status: StatusCode,
    },

    #[snafu(display("invalid argument: {message}"))]
    InvalidArgument { message: String },

    #[snafu(display("release '{name}' is busy: {holder}"))]
    ConflictInProgress {
        name: ReleaseName,
        holder: LockHolderInfo,
    },

    #[snafu(display("deployment of release '{name}' failed: {source}"))]
    Deployment { name: ReleaseName, source: StepError },

    #[snafu(display("invalid manifest: {source}"))]
    ManifestParse { source: ManifestError },

    #[snafu(display("release store failed: {source}"))]
    Store { source: StoreError },

    #[snafu(display("orchestrator reached an invalid state: {source}"))]
    Transition { source: InvalidTransition },

    #[snafu(display("internal error: {message}"))]
    Internal { message: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown release or version.
    NotFound,
    /// A live release with that name already exists.
    AlreadyExists,
    /// The request itself is invalid.
    InvalidArgument,
    /// Another operation holds the release.
    ConflictInProgress,
    /// A backend failed to deploy.
    Deployment,
    /// The rendered manifest or config values are malformed.
    ManifestParse,
    /// The release store failed.
    Store,
    /// An internal invariant was broken.
    Internal,
}

impl OrchestratorError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::NotFound { .. } | OrchestratorError::VersionNotFound { .. } => {
                ErrorKind::NotFound
            }
            OrchestratorError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            OrchestratorError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            OrchestratorError::ConflictInProgress { .. } => ErrorKind::ConflictInProgress,
            OrchestratorError::Deployment { .. } => ErrorKind::Deployment,
            OrchestratorError::ManifestParse { .. } => ErrorKind::ManifestParse,
            OrchestratorError::Store { .. } => ErrorKind::Store,
            OrchestratorError::Transition { .. } | OrchestratorError::Internal { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Returns the lock holder if this is a conflict.
    pub fn holder(&self) -> Option<&LockHolderInfo> {
        match self {
            OrchestratorError::ConflictInProgress { holder, .. } => Some(holder),
            _ => None,
        }
    }

    /// Map a step failure to the error class it belongs to.
    pub(crate) fn from_step(name: &ReleaseName, error: StepError) -> Self {
        match error {
            StepError::Store(source) => OrchestratorError::Store { source },
            StepError::Manifest(source) => OrchestratorError::ManifestParse { source },
            source @ (StepError::Deploy { .. } | StepError::Platform(_)) => {
                OrchestratorError::Deployment {
                    name: name.clone(),
                    source,
                }
            }
        }
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(source: StoreError) -> Self {
        OrchestratorError::Store { source }
    }
}

impl From<ManifestError> for OrchestratorError {
    fn from(source: ManifestError) -> Self {
        OrchestratorError::ManifestParse { source }
    }
}

impl From<InvalidTransition> for OrchestratorError {
    fn from(source: InvalidTransition) -> Self {
        OrchestratorError::Transition { source }
    }
}
