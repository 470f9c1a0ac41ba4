// ABOUTME: Release orchestrator: install, upgrade, rollback, delete and cancel.
// ABOUTME: Serializes operations per release name and bounds them with a worker pool.

mod error;
mod lock;
pub mod machine;
mod operation;
mod request;

pub use error::{ErrorKind, OrchestratorError};
pub use lock::{InFlight, LockHolderInfo, Operation, ReleaseLock, ReleaseLocks};
pub use machine::State;
pub use request::{InstallRequest, UpgradeRequest};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use self::machine::{Event, UpgradeState};
use self::operation::{Candidate, OperationRun};
use crate::config::BerthConfig;
use crate::deployer::DeployerRegistry;
use crate::diagnostics::Diagnostics;
use crate::manifest::{ConfigValues, Manifest, ManifestRenderer, Package};
use crate::reconciler::{Reconciler, ReconcilerHandle};
use crate::release::{PackageRef, Release, StatusCode};
use crate::steps::{DeleteStep, DeployStep, live_handles, probe};
use crate::store::{ReleaseStore, Store};
use crate::strategy::RedBlackStrategy;
use crate::types::ReleaseName;

/// Floor for polling intervals; a zero interval would busy-loop.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Tunables for the orchestrator and its reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub health_timeout: Duration,
    pub health_interval: Duration,
    pub max_concurrent: usize,
    pub reconciler_enabled: bool,
    pub reconcile_interval: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            health_timeout: Duration::from_secs(300),
            health_interval: Duration::from_secs(5),
            max_concurrent: 4,
            reconciler_enabled: true,
            reconcile_interval: Duration::from_secs(10),
        }
    }
}

impl From<&BerthConfig> for OrchestratorSettings {
    fn from(config: &BerthConfig) -> Self {
        Self {
            health_timeout: config.health_check.timeout,
            health_interval: config.health_check.interval,
            max_concurrent: config.operations.max_concurrent,
            reconciler_enabled: config.reconciler.enabled,
            reconcile_interval: config.reconciler.interval,
        }
    }
}

/// The release an operation produced plus any non-fatal warnings.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub release: Release,
    pub diagnostics: Diagnostics,
}

impl Outcome {
    pub fn into_release(self) -> Release {
        self.release
    }
}

pub(crate) struct Inner {
    settings: OrchestratorSettings,
    registry: Arc<DeployerRegistry>,
    store: Arc<dyn Store>,
    renderer: Arc<dyn ManifestRenderer>,
    strategy: RedBlackStrategy,
    deploy: DeployStep,
    delete: DeleteStep,
    locks: ReleaseLocks,
    permits: Arc<Semaphore>,
}

/// Entry point for every release operation. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Polling intervals below [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn new(
        mut settings: OrchestratorSettings,
        registry: Arc<DeployerRegistry>,
        store: Arc<dyn Store>,
        renderer: Arc<dyn ManifestRenderer>,
    ) -> Self {
        settings.health_interval = settings.health_interval.max(MIN_POLL_INTERVAL);
        settings.reconcile_interval = settings.reconcile_interval.max(MIN_POLL_INTERVAL);
        let strategy = RedBlackStrategy::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            settings.health_interval,
        );
        let deploy = DeployStep::new(Arc::clone(&registry), Arc::clone(&store));
        let delete = DeleteStep::new(Arc::clone(&registry), Arc::clone(&store));
        let permits = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));

        Self {
            inner: Arc::new(Inner {
                settings,
                registry,
                store,
                renderer,
                strategy,
                deploy,
                delete,
                locks: ReleaseLocks::new(),
                permits,
            }),
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.inner.settings
    }

    /// Install version 1 of a release, or the next version after a delete.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if a version that is not DELETED exists,
    /// `ManifestParse` if rendering fails, `Deployment` if a component fails
    /// to deploy (the release is left FAILED with its partial handles).
    pub async fn install(&self, request: InstallRequest) -> Result<Outcome, OrchestratorError> {
        let (lock, permit) = self.begin(&request.name, Operation::Install).await?;

        let platform = match request.platform {
            Some(platform) => platform,
            None => self
                .inner
                .registry
                .default_platform()
                .map_err(|e| invalid(e.to_string()))?
                .clone(),
        };
        if !self.inner.registry.contains(&platform) {
            return Err(invalid(format!("unknown platform '{platform}'")));
        }

        let manifest = self.render(&request.package, &request.values)?;

        let latest = self.inner.store.latest(&request.name).await?;
        if let Some(existing) = &latest
            && !existing.status.is_deleted()
        {
            return Err(OrchestratorError::AlreadyExists {
                name: request.name,
                version: existing.version,
                status: existing.code(),
            });
        }

        let candidate = Candidate {
            manifest,
            package: PackageRef::from(&request.package),
            config_values: request.values.raw().to_string(),
            platform,
            timeout: self.inner.settings.health_timeout,
            force: false,
            rollback_from: None,
        };
        OperationRun::new(&self.inner, lock, permit, latest.map_or(0, |r| r.version))
            .with_candidate(candidate)
            .drive(Event::Install)
            .await
    }

    /// Upgrade the deployed release with red/black semantics.
    ///
    /// Blocks until the new version is promoted or cancelled. A health check
    /// timeout is not an error: the returned release is the new version in
    /// FAILED and the previous version stays DEPLOYED.
    pub async fn upgrade(&self, request: UpgradeRequest) -> Result<Outcome, OrchestratorError> {
        let (lock, permit) = self.begin(&request.name, Operation::Upgrade).await?;

        let latest = self
            .inner
            .store
            .latest(&request.name)
            .await?
            .ok_or_else(|| not_found(&request.name))?;
        let current = self
            .inner
            .store
            .latest_deployed(&request.name)
            .await?
            .ok_or_else(|| not_found(&request.name))?;

        let manifest = self.render(&request.package, &request.values)?;

        let candidate = Candidate {
            manifest,
            package: PackageRef::from(&request.package),
            config_values: request.values.raw().to_string(),
            platform: current.platform.clone(),
            timeout: request.timeout.unwrap_or(self.inner.settings.health_timeout),
            force: request.force,
            rollback_from: None,
        };
        OperationRun::new(&self.inner, lock, permit, latest.version)
            .with_candidate(candidate)
            .with_current(Some(current))
            .drive(Event::Upgrade)
            .await
    }

    /// Replay a historical manifest as a new version.
    ///
    /// `to_version` 0 means the newest earlier version that is DEPLOYED or
    /// DELETED, or the latest itself when it was deleted. An explicit version
    /// in any other status is an `InvalidArgument`. Uses the install path when
    /// nothing is deployed and a forced red/black upgrade otherwise.
    pub async fn rollback(
        &self,
        name: &ReleaseName,
        to_version: i64,
    ) -> Result<Outcome, OrchestratorError> {
        if to_version < 0 {
            return Err(invalid(format!(
                "rollback version must not be negative, got {to_version}"
            )));
        }
        let (lock, permit) = self.begin(name, Operation::Rollback).await?;

        let latest = self
            .inner
            .store
            .latest(name)
            .await?
            .ok_or_else(|| not_found(name))?;
        let historical = if to_version == 0 {
            self.default_rollback_target(&latest).await?
        } else {
            let found = match u32::try_from(to_version) {
                Ok(version) => self.inner.store.get(name, version).await?,
                Err(_) => None,
            };
            let found = found.ok_or_else(|| OrchestratorError::VersionNotFound {
                name: name.clone(),
                version: to_version,
            })?;
            if !is_rollback_source(&found) {
                return Err(invalid(format!(
                    "cannot roll back to version {} of '{name}': it is {}, not DEPLOYED or DELETED",
                    found.version,
                    found.code()
                )));
            }
            found
        };
        let current = self.inner.store.latest_deployed(name).await?;

        tracing::info!(
            release = %name,
            from = latest.version,
            to = historical.version,
            "rollback requested"
        );
        let candidate = Candidate {
            manifest: historical.manifest.clone(),
            package: historical.package.clone(),
            config_values: historical.config_values.clone(),
            platform: historical.platform.clone(),
            timeout: self.inner.settings.health_timeout,
            force: true,
            rollback_from: Some(historical.version),
        };
        OperationRun::new(&self.inner, lock, permit, latest.version)
            .with_candidate(candidate)
            .with_current(current)
            .drive(Event::Rollback)
            .await
    }

    /// Undeploy the current version and mark the release DELETED.
    ///
    /// Deleting an already deleted release returns it unchanged.
    pub async fn delete(&self, name: &ReleaseName) -> Result<Outcome, OrchestratorError> {
        let (lock, permit) = self.begin(name, Operation::Delete).await?;

        let latest = self
            .inner
            .store
            .latest(name)
            .await?
            .ok_or_else(|| not_found(name))?;
        let target = match self.inner.store.latest_deployed(name).await? {
            Some(deployed) => deployed,
            None => latest.clone(),
        };
        if target.status.is_deleted() {
            tracing::info!(release = %name, version = target.version, "release already deleted");
            return Ok(Outcome {
                release: target,
                diagnostics: Diagnostics::default(),
            });
        }

        OperationRun::new(&self.inner, lock, permit, latest.version)
            .with_target(target)
            .drive(Event::Delete)
            .await
    }

    /// Cut short the health wait of an in-flight upgrade.
    ///
    /// Returns `true` if a cancel was delivered, `false` when no upgrade of
    /// `name` is waiting on health.
    pub async fn cancel(&self, name: &ReleaseName) -> Result<bool, OrchestratorError> {
        let waiting = State::Upgrade(UpgradeState::WaitTargetApps);
        if self.inner.locks.request_cancel(name, waiting) {
            tracing::info!(release = %name, "cancel requested");
            return Ok(true);
        }
        if !self.inner.locks.is_held(name) && self.inner.store.latest(name).await?.is_none() {
            return Err(not_found(name));
        }
        Ok(false)
    }

    /// Latest version of `name` with a freshly probed platform status when deployed.
    pub async fn status(&self, name: &ReleaseName) -> Result<Outcome, OrchestratorError> {
        let mut release = self
            .inner
            .store
            .latest(name)
            .await?
            .ok_or_else(|| not_found(name))?;
        let mut diagnostics = Diagnostics::default();

        if release.status.is_deployed() {
            let handles = live_handles(self.inner.store.as_ref(), &release)
                .await
                .map_err(|e| OrchestratorError::from_step(name, e))?;
            match self.inner.registry.get(&release.platform) {
                Ok(deployer) => {
                    let summary =
                        probe(deployer.as_ref(), &release, &handles, &mut diagnostics).await;
                    release.status.platform_status = summary.to_string();
                }
                Err(e) => tracing::warn!(release = %name, error = %e, "cannot probe release"),
            }
        }
        Ok(Outcome {
            release,
            diagnostics,
        })
    }

    /// Every version of `name`, newest first.
    pub async fn history(&self, name: &ReleaseName) -> Result<Vec<Release>, OrchestratorError> {
        let mut versions = self.inner.store.list_versions(name).await?;
        if versions.is_empty() {
            return Err(not_found(name));
        }
        versions.reverse();
        Ok(versions)
    }

    /// The latest version of every release.
    pub async fn list(&self) -> Result<Vec<Release>, OrchestratorError> {
        let mut releases = Vec::new();
        for name in self.inner.store.list_names().await? {
            if let Some(release) = self.inner.store.latest(&name).await? {
                releases.push(release);
            }
        }
        Ok(releases)
    }

    /// The rendered manifest of `version`, or of the latest version.
    pub async fn manifest(
        &self,
        name: &ReleaseName,
        version: Option<u32>,
    ) -> Result<Manifest, OrchestratorError> {
        let release = match version {
            Some(v) => self.inner.store.get(name, v).await?.ok_or_else(|| {
                OrchestratorError::VersionNotFound {
                    name: name.clone(),
                    version: i64::from(v),
                }
            })?,
            None => self
                .inner
                .store
                .latest(name)
                .await?
                .ok_or_else(|| not_found(name))?,
        };
        Ok(release.manifest)
    }

    /// The operation currently holding `name`, if any.
    pub fn in_flight(&self, name: &ReleaseName) -> Option<InFlight> {
        self.inner.locks.in_flight(name)
    }

    /// A reconciler sharing this orchestrator's store, registry, locks and worker pool.
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.registry),
            self.inner.locks.clone(),
            Arc::clone(&self.inner.permits),
            self.inner.settings.reconcile_interval,
        )
    }

    /// Start the background reconciler unless it is disabled in settings.
    pub fn spawn_reconciler(&self) -> Option<ReconcilerHandle> {
        self.inner
            .settings
            .reconciler_enabled
            .then(|| self.reconciler().spawn())
    }

    async fn begin(
        &self,
        name: &ReleaseName,
        operation: Operation,
    ) -> Result<(ReleaseLock, OwnedSemaphorePermit), OrchestratorError> {
        let lock = self.inner.locks.acquire(name, operation).map_err(|holder| {
            tracing::info!(release = %name, %operation, %holder, "release busy");
            OrchestratorError::ConflictInProgress {
                name: name.clone(),
                holder,
            }
        })?;
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|e| OrchestratorError::Internal {
                message: format!("worker pool closed: {e}"),
            })?;
        Ok((lock, permit))
    }

    /// The deleted latest version itself, else the newest earlier version that was deployed or deleted.
    async fn default_rollback_target(&self, latest: &Release) -> Result<Release, OrchestratorError> {
        if latest.status.is_deleted() {
            return Ok(latest.clone());
        }
        self.inner
            .store
            .list_versions(&latest.name)
            .await?
            .into_iter()
            .rev()
            .find(|r| r.version < latest.version && is_rollback_source(r))
            .ok_or_else(|| OrchestratorError::VersionNotFound {
                name: latest.name.clone(),
                version: 0,
            })
    }

    /// Render and parse up front so a bad manifest fails before anything is written.
    fn render(&self, package: &Package, values: &ConfigValues) -> Result<Manifest, OrchestratorError> {
        let manifest = self.inner.renderer.render(package, values)?;
        manifest.components()?;
        Ok(manifest)
    }
}

/// Only versions that once ran cleanly can be replayed.
fn is_rollback_source(release: &Release) -> bool {
    matches!(release.code(), StatusCode::Deployed | StatusCode::Deleted)
}

fn not_found(name: &ReleaseName) -> OrchestratorError {
    OrchestratorError::NotFound {
        name: name.to_string(),
    }
}

fn invalid(message: impl Into<String>) -> OrchestratorError {
    OrchestratorError::InvalidArgument {
        message: message.into(),
    }
}
