// ABOUTME: Persistence seams for releases and deployer data.
// ABOUTME: Saves use an optimistic revision check; versions are dense and append-only.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::release::{AppDeployerData, Release, StatusCode};
use crate::types::ReleaseName;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("release '{name}' version {version} not found")]
    NotFound { name: ReleaseName, version: u32 },

    /// The record changed since it was read.
    #[error("release '{name}' version {version} was modified concurrently (expected revision {expected}, found {actual})")]
    Conflict {
        name: ReleaseName,
        version: u32,
        expected: u64,
        actual: u64,
    },

    /// A new version must directly follow the highest stored one.
    #[error("release '{name}' must be saved as version {expected}, got {actual}")]
    VersionGap {
        name: ReleaseName,
        expected: u32,
        actual: u32,
    },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Release records keyed by (name, version).
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    async fn get(&self, name: &ReleaseName, version: u32) -> Result<Option<Release>, StoreError>;

    /// Every version of `name`, oldest first.
    async fn list_versions(&self, name: &ReleaseName) -> Result<Vec<Release>, StoreError>;

    async fn list_names(&self) -> Result<Vec<ReleaseName>, StoreError>;

    /// Insert a new version or update an existing one.
    ///
    /// New records must carry revision 0 and the next dense version number;
    /// updates must carry the revision that was read. Returns the stored record
    /// with its bumped revision.
    async fn save(&self, release: Release) -> Result<Release, StoreError>;

    /// Replace the platform status text without touching the status code or revision.
    async fn annotate_platform_status(
        &self,
        name: &ReleaseName,
        version: u32,
        platform_status: &str,
    ) -> Result<Release, StoreError>;

    /// Highest version regardless of status.
    async fn latest(&self, name: &ReleaseName) -> Result<Option<Release>, StoreError> {
        Ok(self.list_versions(name).await?.pop())
    }

    /// Highest version whose status is DEPLOYED.
    async fn latest_deployed(&self, name: &ReleaseName) -> Result<Option<Release>, StoreError> {
        Ok(self
            .list_versions(name)
            .await?
            .into_iter()
            .rev()
            .find(|r| r.code() == StatusCode::Deployed))
    }
}

/// Deployer handles keyed by (release name, version).
#[async_trait]
pub trait DeployerDataStore: Send + Sync {
    async fn get_deployer_data(
        &self,
        name: &ReleaseName,
        version: u32,
    ) -> Result<Option<AppDeployerData>, StoreError>;

    async fn save_deployer_data(&self, data: &AppDeployerData) -> Result<(), StoreError>;
}

/// Everything the orchestrator persists.
pub trait Store: ReleaseStore + DeployerDataStore {}

impl<T: ReleaseStore + DeployerDataStore> Store for T {}

/// Apply the optimistic-save rules shared by every store.
///
/// `existing` is the stored record for the release's version, `highest` the
/// highest stored version of that name.
pub(crate) fn check_save(
    existing: Option<&Release>,
    highest: Option<u32>,
    mut release: Release,
) -> Result<Release, StoreError> {
    match existing {
        Some(stored) => {
            if stored.revision != release.revision {
                return Err(StoreError::Conflict {
                    name: release.name,
                    version: release.version,
                    expected: release.revision,
                    actual: stored.revision,
                });
            }
        }
        None => {
            let expected = highest.map_or(1, |v| v + 1);
            if release.version != expected {
                return Err(StoreError::VersionGap {
                    name: release.name,
                    expected,
                    actual: release.version,
                });
            }
            if release.revision != 0 {
                return Err(StoreError::NotFound {
                    name: release.name,
                    version: release.version,
                });
            }
        }
    }
    release.revision += 1;
    Ok(release)
}
