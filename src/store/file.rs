// ABOUTME: Directory-backed store writing one JSON document per release version.
// ABOUTME: Writes go through a temp file and rename; a mutex serializes read-modify-write.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{DeployerDataStore, ReleaseStore, StoreError, check_save};
use crate::release::{AppDeployerData, Release};
use crate::types::ReleaseName;

const RELEASE_PREFIX: &str = "release-";
const DEPLOYER_PREFIX: &str = "deployer-";
const EXTENSION: &str = ".json";

/// Layout: `<root>/<release>/release-<version>.json` and `deployer-<version>.json`.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn release_dir(&self, name: &ReleaseName) -> PathBuf {
        self.root.join(name.as_str())
    }

    fn release_path(&self, name: &ReleaseName, version: u32) -> PathBuf {
        self.release_dir(name)
            .join(format!("{RELEASE_PREFIX}{version}{EXTENSION}"))
    }

    fn deployer_path(&self, name: &ReleaseName, version: u32) -> PathBuf {
        self.release_dir(name)
            .join(format!("{DEPLOYER_PREFIX}{version}{EXTENSION}"))
    }

    async fn stored_versions(&self, name: &ReleaseName) -> Result<Vec<u32>, StoreError> {
        let mut entries = match tokio::fs::read_dir(self.release_dir(name)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(version) = file_name
                .to_str()
                .and_then(|n| n.strip_prefix(RELEASE_PREFIX))
                .and_then(|n| n.strip_suffix(EXTENSION))
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            versions.push(version);
        }
        versions.sort_unstable();
        Ok(versions)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        path: &Path,
    ) -> Result<Option<T>, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl ReleaseStore for FileStore {
    async fn get(&self, name: &ReleaseName, version: u32) -> Result<Option<Release>, StoreError> {
        Self::read_json(&self.release_path(name, version)).await
    }

    async fn list_versions(&self, name: &ReleaseName) -> Result<Vec<Release>, StoreError> {
        let mut releases = Vec::new();
        for version in self.stored_versions(name).await? {
            if let Some(release) = self.get(name, version).await? {
                releases.push(release);
            }
        }
        Ok(releases)
    }

    async fn list_names(&self) -> Result<Vec<ReleaseName>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(name) = entry
                .file_name()
                .to_str()
                .and_then(|n| ReleaseName::new(n).ok())
            else {
                continue;
            };
            if !self.stored_versions(&name).await?.is_empty() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn save(&self, release: Release) -> Result<Release, StoreError> {
        let _guard = self.write_lock.lock().await;
        let highest = self.stored_versions(&release.name).await?.last().copied();
        let existing = self.get(&release.name, release.version).await?;
        let saved = check_save(existing.as_ref(), highest, release)?;
        Self::write_json(&self.release_path(&saved.name, saved.version), &saved).await?;
        Ok(saved)
    }

    async fn annotate_platform_status(
        &self,
        name: &ReleaseName,
        version: u32,
        platform_status: &str,
    ) -> Result<Release, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut release = self
            .get(name, version)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                name: name.clone(),
                version,
            })?;
        release.status.platform_status = platform_status.to_string();
        Self::write_json(&self.release_path(name, version), &release).await?;
        Ok(release)
    }
}

#[async_trait]
impl DeployerDataStore for FileStore {
    async fn get_deployer_data(
        &self,
        name: &ReleaseName,
        version: u32,
    ) -> Result<Option<AppDeployerData>, StoreError> {
        Self::read_json(&self.deployer_path(name, version)).await
    }

    async fn save_deployer_data(&self, data: &AppDeployerData) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        Self::write_json(
            &self.deployer_path(&data.release_name, data.release_version),
            data,
        )
        .await
    }
}
