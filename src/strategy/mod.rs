// ABOUTME: Red/black upgrade: deploy changed components beside the old version, verify, then flip.
// ABOUTME: Each phase is a method; the orchestrator's state machine sequences them.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::analysis::{ReleaseAnalysisReport, ReleaseAnalyzer};
use crate::deployer::DeployerRegistry;
use crate::diagnostics::Diagnostics;
use crate::manifest::{Manifest, ManifestError};
use crate::release::{AppDeployerData, Release, StatusCode};
use crate::steps::{
    DeployStep, HealthCheckStep, HealthOutcome, PromoteOrCancelStep, StepError, StepFailure,
    live_handles, select,
};
use crate::store::{DeployerDataStore, ReleaseStore, Store};

/// Composes the deployment steps into the red/black algorithm.
#[derive(Clone)]
pub struct RedBlackStrategy {
    store: Arc<dyn Store>,
    analyzer: ReleaseAnalyzer,
    deploy: DeployStep,
    health: HealthCheckStep,
    promote_or_cancel: PromoteOrCancelStep,
}

impl RedBlackStrategy {
    pub fn new(
        registry: Arc<DeployerRegistry>,
        store: Arc<dyn Store>,
        health_interval: Duration,
    ) -> Self {
        Self {
            analyzer: ReleaseAnalyzer,
            deploy: DeployStep::new(Arc::clone(&registry), Arc::clone(&store)),
            health: HealthCheckStep::new(Arc::clone(&registry), health_interval),
            promote_or_cancel: PromoteOrCancelStep::new(registry, Arc::clone(&store)),
            store,
        }
    }

    /// Compare the current release's manifest with the candidate.
    pub fn plan(
        &self,
        current: &Release,
        candidate: &Manifest,
    ) -> Result<ReleaseAnalysisReport, ManifestError> {
        self.analyzer.analyze(Some(&current.manifest), candidate)
    }

    /// Persist the new version in DEPLOYING with empty deployer data based on `current`.
    pub async fn create_target(
        &self,
        target: Release,
        current: &Release,
    ) -> Result<(Release, AppDeployerData), StepError> {
        let initial = target.status.code;
        let mut target = self.store.save(target).await?;
        if initial != StatusCode::Deploying {
            target.status.transition(
                StatusCode::Deploying,
                format!("Upgrade from v{} in progress", current.version),
            );
            target = self.store.save(target).await?;
        }

        let data = AppDeployerData::new(target.name.clone(), target.version, Some(current.version));
        self.store.save_deployer_data(&data).await?;
        tracing::info!(
            release = %target.name,
            version = target.version,
            base_version = current.version,
            "created target release"
        );
        Ok((target, data))
    }

    /// Deploy only the components the report flagged.
    pub async fn deploy_target(
        &self,
        target: &Release,
        report: &ReleaseAnalysisReport,
        data: AppDeployerData,
    ) -> Result<AppDeployerData, StepFailure> {
        self.deploy.run(target, &report.specs_to_deploy(), data).await
    }

    /// Wait for the target's own handles to become healthy.
    pub async fn check_target(
        &self,
        target: &Release,
        data: &AppDeployerData,
        timeout: Duration,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<HealthOutcome, StepError> {
        self.health.run(target, data, timeout, cancel).await
    }

    /// Promote the target and retire the previous version's replaced and dropped components.
    pub async fn promote(
        &self,
        target: Release,
        current: Release,
        report: &ReleaseAnalysisReport,
        description: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<Release, StepError> {
        let live = live_handles(self.store.as_ref(), &current).await?;
        let retiring = select(
            &live,
            report
                .to_deploy()
                .into_iter()
                .chain(report.retired().iter().map(String::as_str)),
        );
        self.promote_or_cancel
            .promote(target, current, &retiring, description, diagnostics)
            .await
    }

    /// Undeploy the target's own handles and mark it FAILED.
    pub async fn cancel(
        &self,
        target: Release,
        data: &AppDeployerData,
        description: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<Release, StepError> {
        self.promote_or_cancel
            .cancel(target, data, description, diagnostics)
            .await
    }
}
