// ABOUTME: In-memory store for tests and embedded use.
// ABOUTME: Guarded by a parking_lot RwLock; nothing survives a restart.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use super::{DeployerDataStore, ReleaseStore, StoreError, check_save};
use crate::release::{AppDeployerData, Release};
use crate::types::ReleaseName;

#[derive(Debug, Default)]
struct Inner {
    releases: BTreeMap<ReleaseName, BTreeMap<u32, Release>>,
    deployer_data: HashMap<(ReleaseName, u32), AppDeployerData>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReleaseStore for MemoryStore {
    async fn get(&self, name: &ReleaseName, version: u32) -> Result<Option<Release>, StoreError> {
        Ok(self
            .inner
            .read()
            .releases
            .get(name)
            .and_then(|versions| versions.get(&version))
            .cloned())
    }

    async fn list_versions(&self, name: &ReleaseName) -> Result<Vec<Release>, StoreError> {
        Ok(self
            .inner
            .read()
            .releases
            .get(name)
            .map(|versions| versions.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_names(&self) -> Result<Vec<ReleaseName>, StoreError> {
        Ok(self.inner.read().releases.keys().cloned().collect())
    }

    async fn save(&self, release: Release) -> Result<Release, StoreError> {
        let mut inner = self.inner.write();
        let versions = inner.releases.get(&release.name);
        let highest = versions.and_then(|v| v.keys().next_back().copied());
        let existing = versions.and_then(|v| v.get(&release.version));
        let saved = check_save(existing, highest, release)?;
        inner
            .releases
            .entry(saved.name.clone())
            .or_default()
            .insert(saved.version, saved.clone());
        Ok(saved)
    }

    async fn annotate_platform_status(
        &self,
        name: &ReleaseName,
        version: u32,
        platform_status: &str,
    ) -> Result<Release, StoreError> {
        let mut inner = self.inner.write();
        let release = inner
            .releases
            .get_mut(name)
            .and_then(|versions| versions.get_mut(&version))
            .ok_or_else(|| StoreError::NotFound {
                name: name.clone(),
                version,
            })?;
        release.status.platform_status = platform_status.to_string();
        Ok(release.clone())
    }
}

#[async_trait]
impl DeployerDataStore for MemoryStore {
    async fn get_deployer_data(
        &self,
        name: &ReleaseName,
        version: u32,
    ) -> Result<Option<AppDeployerData>, StoreError> {
        Ok(self
            .inner
            .read()
            .deployer_data
            .get(&(name.clone(), version))
            .cloned())
    }

    async fn save_deployer_data(&self, data: &AppDeployerData) -> Result<(), StoreError> {
        self.inner.write().deployer_data.insert(
            (data.release_name.clone(), data.release_version),
            data.clone(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use crate::release::{PackageRef, StatusCode};
    use crate::types::PlatformName;

    fn release(version: u32) -> Release {
        Release::new(
            ReleaseName::new("ticktock").unwrap(),
            version,
            PlatformName::new("local"),
            PackageRef {
                name: "ticktock".to_string(),
                version: "1.0.0".to_string(),
            },
            "",
            Manifest::new("metadata: {name: a}\nspec: {resource: r}\n"),
            StatusCode::Deploying,
        )
    }

    #[tokio::test]
    async fn save_bumps_revision() {
        let store = MemoryStore::new();
        let saved = store.save(release(1)).await.unwrap();
        assert_eq!(saved.revision, 1);

        let updated = store.save(saved).await.unwrap();
        assert_eq!(updated.revision, 2);
    }

    #[tokio::test]
    async fn stale_update_conflicts() {
        let store = MemoryStore::new();
        let saved = store.save(release(1)).await.unwrap();
        store.save(saved.clone()).await.unwrap();

        let result = store.save(saved).await;
        assert!(matches!(
            result,
            Err(StoreError::Conflict {
                expected: 1,
                actual: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn versions_must_be_dense() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.save(release(2)).await,
            Err(StoreError::VersionGap {
                expected: 1,
                actual: 2,
                ..
            })
        ));

        store.save(release(1)).await.unwrap();
        store.save(release(2)).await.unwrap();
        let versions = store.list_versions(&ReleaseName::new("ticktock").unwrap()).await.unwrap();
        assert_eq!(versions.iter().map(|r| r.version).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn latest_deployed_skips_failed_versions() {
        let store = MemoryStore::new();
        let name = ReleaseName::new("ticktock").unwrap();

        let mut v1 = store.save(release(1)).await.unwrap();
        v1.status.transition(StatusCode::Deployed, "Install complete");
        store.save(v1).await.unwrap();

        let mut v2 = store.save(release(2)).await.unwrap();
        v2.status.transition(StatusCode::Failed, "boom");
        store.save(v2).await.unwrap();

        assert_eq!(store.latest(&name).await.unwrap().unwrap().version, 2);
        assert_eq!(store.latest_deployed(&name).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn annotate_keeps_code_and_revision() {
        let store = MemoryStore::new();
        let name = ReleaseName::new("ticktock").unwrap();
        let saved = store.save(release(1)).await.unwrap();

        let annotated = store
            .annotate_platform_status(&name, 1, "1 of 2 applications deployed")
            .await
            .unwrap();

        assert_eq!(annotated.revision, saved.revision);
        assert_eq!(annotated.code(), StatusCode::Deploying);
        assert_eq!(annotated.status.platform_status, "1 of 2 applications deployed");
    }

    #[tokio::test]
    async fn deployer_data_round_trips() {
        let store = MemoryStore::new();
        let name = ReleaseName::new("ticktock").unwrap();
        let mut data = AppDeployerData::new(name.clone(), 1, None);
        data.record("a", crate::types::DeploymentId::new("h1"));

        store.save_deployer_data(&data).await.unwrap();

        assert_eq!(store.get_deployer_data(&name, 1).await.unwrap(), Some(data));
        assert!(store.get_deployer_data(&name, 2).await.unwrap().is_none());
    }
}
