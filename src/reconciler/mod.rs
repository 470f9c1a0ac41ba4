// ABOUTME: Background loop that refreshes the platform status of deployed releases.
// ABOUTME: Skips releases with an operation in flight and never changes status codes.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;

use crate::deployer::DeployerRegistry;
use crate::diagnostics::Diagnostics;
use crate::orchestrator::ReleaseLocks;
use crate::steps::{live_handles, probe};
use crate::store::{ReleaseStore, Store, StoreError};

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Deployed releases that were probed.
    pub checked: usize,
    /// Releases whose platform status text changed.
    pub updated: usize,
    /// Releases skipped because an operation held them or probing failed.
    pub skipped: usize,
}

pub struct Reconciler {
    store: Arc<dyn Store>,
    registry: Arc<DeployerRegistry>,
    locks: ReleaseLocks,
    permits: Arc<Semaphore>,
    interval: Duration,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<DeployerRegistry>,
        locks: ReleaseLocks,
        permits: Arc<Semaphore>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            locks,
            permits,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Probe every deployed release once and persist changed summaries.
    ///
    /// # Errors
    ///
    /// Only listing releases can fail the pass; per-release failures are
    /// logged and counted as skipped.
    pub async fn reconcile_once(&self) -> Result<ReconcileReport, StoreError> {
        let mut report = ReconcileReport::default();

        for name in self.store.list_names().await? {
            if self.locks.is_held(&name) {
                tracing::debug!(release = %name, "operation in flight; skipping");
                report.skipped += 1;
                continue;
            }
            let Some(release) = self.store.latest_deployed(&name).await? else {
                continue;
            };
            let Ok(_permit) = Arc::clone(&self.permits).acquire_owned().await else {
                report.skipped += 1;
                continue;
            };

            let deployer = match self.registry.get(&release.platform) {
                Ok(deployer) => deployer,
                Err(e) => {
                    tracing::warn!(release = %name, error = %e, "cannot reconcile release");
                    report.skipped += 1;
                    continue;
                }
            };
            let handles = match live_handles(self.store.as_ref(), &release).await {
                Ok(handles) => handles,
                Err(e) => {
                    tracing::warn!(release = %name, error = %e, "cannot load deployer data");
                    report.skipped += 1;
                    continue;
                }
            };

            let mut diagnostics = Diagnostics::default();
            let summary = probe(deployer.as_ref(), &release, &handles, &mut diagnostics)
                .await
                .to_string();
            report.checked += 1;

            if summary == release.status.platform_status {
                continue;
            }
            // An operation may have started while probing.
            if self.locks.is_held(&name) {
                report.skipped += 1;
                continue;
            }
            self.store
                .annotate_platform_status(&name, release.version, &summary)
                .await?;
            tracing::info!(
                release = %name,
                version = release.version,
                platform_status = %summary,
                "platform status changed"
            );
            report.updated += 1;
        }

        Ok(report)
    }

    /// Run `reconcile_once` every interval until the handle is shut down.
    pub fn spawn(self) -> ReconcilerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            tracing::info!(interval = ?self.interval, "reconciler started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {
                        match self.reconcile_once().await {
                            Ok(report) => tracing::debug!(?report, "reconcile pass complete"),
                            Err(e) => tracing::warn!(error = %e, "reconcile pass failed"),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("reconciler stopped");
        });
        ReconcilerHandle { shutdown, task }
    }
}

pub struct ReconcilerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Stop the loop and wait for the current pass to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "reconciler task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployer::{AppStatus, Deployer, DeployerError, DeploymentRequest, DeploymentState};
    use crate::manifest::{Manifest, Package};
    use crate::orchestrator::Operation;
    use crate::release::{AppDeployerData, PackageRef, Release, StatusCode};
    use crate::store::{DeployerDataStore, MemoryStore};
    use crate::types::{DeploymentId, PlatformName, ReleaseName};
    use async_trait::async_trait;

    struct Fixed(DeploymentState);

    #[async_trait]
    impl Deployer for Fixed {
        async fn deploy(&self, request: &DeploymentRequest) -> Result<DeploymentId, DeployerError> {
            Ok(DeploymentId::new(request.deployment_name()))
        }

        async fn status(&self, id: &DeploymentId) -> Result<AppStatus, DeployerError> {
            Ok(AppStatus::new(id.clone(), self.0))
        }

        async fn undeploy(&self, _id: &DeploymentId) -> Result<(), DeployerError> {
            Ok(())
        }
    }

    const MANIFEST: &str = "apiVersion: berth/v1\nkind: Application\nmetadata:\n  name: web\nspec:\n  resource: registry/web\n  version: 1.0.0\n";

    async fn seeded(state: DeploymentState) -> (Arc<MemoryStore>, Reconciler, ReleaseLocks) {
        let store = Arc::new(MemoryStore::new());
        let name = ReleaseName::new("shop").unwrap();
        let platform = PlatformName::new("local");
        let package = Package::new("shop", "1.0.0", MANIFEST);
        let mut release = Release::new(
            name.clone(),
            1,
            platform.clone(),
            PackageRef::from(&package),
            String::new(),
            Manifest::new(MANIFEST),
            StatusCode::Deployed,
        );
        release.status.transition(StatusCode::Deployed, "Install complete");
        store.save(release).await.unwrap();
        let mut data = AppDeployerData::new(name, 1, None);
        data.record("web", DeploymentId::new("shop-v1-web"));
        store.save_deployer_data(&data).await.unwrap();

        let registry = Arc::new(
            DeployerRegistry::new()
                .with(platform, "fixed", Arc::new(Fixed(state)))
                .unwrap(),
        );
        let locks = ReleaseLocks::new();
        let reconciler = Reconciler::new(
            store.clone(),
            registry,
            locks.clone(),
            Arc::new(Semaphore::new(1)),
            Duration::from_secs(10),
        );
        (store, reconciler, locks)
    }

    #[tokio::test]
    async fn annotates_changed_status_once() {
        let (store, reconciler, _locks) = seeded(DeploymentState::Deployed).await;

        let first = reconciler.reconcile_once().await.unwrap();
        assert_eq!(first, ReconcileReport { checked: 1, updated: 1, skipped: 0 });

        let name = ReleaseName::new("shop").unwrap();
        let release = store.get(&name, 1).await.unwrap().unwrap();
        assert_eq!(
            release.status.platform_status,
            "All applications have been successfully deployed."
        );
        assert_eq!(release.code(), StatusCode::Deployed);

        let second = reconciler.reconcile_once().await.unwrap();
        assert_eq!(second.updated, 0);
    }

    #[tokio::test]
    async fn reports_failed_components() {
        let (store, reconciler, _locks) = seeded(DeploymentState::Failed).await;
        reconciler.reconcile_once().await.unwrap();

        let name = ReleaseName::new("shop").unwrap();
        let release = store.get(&name, 1).await.unwrap().unwrap();
        assert_eq!(release.status.platform_status, "0 of 1 applications deployed: web=failed");
        assert_eq!(release.code(), StatusCode::Deployed);
    }

    #[tokio::test]
    async fn skips_locked_releases() {
        let (_store, reconciler, locks) = seeded(DeploymentState::Deployed).await;
        let _lock = locks
            .acquire(&ReleaseName::new("shop").unwrap(), Operation::Upgrade)
            .unwrap();

        let report = reconciler.reconcile_once().await.unwrap();
        assert_eq!(report, ReconcileReport { checked: 0, updated: 0, skipped: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn loop_stops_on_shutdown() {
        let (store, reconciler, _locks) = seeded(DeploymentState::Deployed).await;
        let handle = reconciler.spawn();

        tokio::time::sleep(Duration::from_secs(11)).await;
        handle.shutdown().await;

        let name = ReleaseName::new("shop").unwrap();
        let release = store.get(&name, 1).await.unwrap().unwrap();
        assert!(!release.status.platform_status.is_empty());
    }
}
