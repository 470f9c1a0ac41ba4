// ABOUTME: Drives one operation through the state machine, executing each action.
// ABOUTME: Holds the release lock and worker permit for the operation's lifetime.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Instant;

use super::error::OrchestratorError;
use super::lock::ReleaseLock;
use super::machine::{self, Action, Event, State};
use super::{Inner, Outcome};
use crate::analysis::ReleaseAnalysisReport;
use crate::diagnostics::Diagnostics;
use crate::manifest::{ComponentSpec, Manifest};
use crate::release::{AppDeployerData, PackageRef, Release, StatusCode};
use crate::steps::{HealthOutcome, StepError, StepFailure, live_handles};
use crate::store::ReleaseStore;
use crate::types::{PlatformName, ReleaseName};

/// What an install, upgrade or rollback will deploy.
pub(super) struct Candidate {
    pub manifest: Manifest,
    pub package: PackageRef,
    pub config_values: String,
    pub platform: PlatformName,
    pub timeout: Duration,
    pub force: bool,
    /// Version whose manifest is being replayed.
    pub rollback_from: Option<u32>,
}

pub(super) struct OperationRun<'a> {
    inner: &'a Inner,
    lock: ReleaseLock,
    _permit: OwnedSemaphorePermit,
    name: ReleaseName,
    candidate: Option<Candidate>,
    /// Highest stored version when the operation started; 0 for none.
    latest_version: u32,
    /// The DEPLOYED release an upgrade starts from.
    current: Option<Release>,
    target: Option<Release>,
    data: Option<AppDeployerData>,
    report: Option<ReleaseAnalysisReport>,
    failure: Option<StepError>,
    cancel_reason: Option<String>,
    /// When the health wait started.
    health_started: Option<Instant>,
    result: Option<Release>,
    diagnostics: Diagnostics,
}

fn missing(what: &str) -> OrchestratorError {
    OrchestratorError::Internal {
        message: format!("{what} is not available in this state"),
    }
}

impl<'a> OperationRun<'a> {
    pub(super) fn new(
        inner: &'a Inner,
        lock: ReleaseLock,
        permit: OwnedSemaphorePermit,
        latest_version: u32,
    ) -> Self {
        let name = lock.name().clone();
        Self {
            inner,
            lock,
            _permit: permit,
            name,
            candidate: None,
            latest_version,
            current: None,
            target: None,
            data: None,
            report: None,
            failure: None,
            cancel_reason: None,
            health_started: None,
            result: None,
            diagnostics: Diagnostics::default(),
        }
    }

    pub(super) fn with_candidate(mut self, candidate: Candidate) -> Self {
        self.candidate = Some(candidate);
        self
    }

    /// The deployed release an upgrade or rollback replaces.
    pub(super) fn with_current(mut self, current: Option<Release>) -> Self {
        self.current = current;
        self
    }

    /// The existing release a delete acts on.
    pub(super) fn with_target(mut self, target: Release) -> Self {
        self.target = Some(target);
        self
    }

    /// Run from `INITIAL` until the machine comes to rest again.
    pub(super) async fn drive(mut self, event: Event) -> Result<Outcome, OrchestratorError> {
        let mut state = State::Initial;
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let (next, actions) = machine::transition(state, event)?;
            tracing::debug!(release = %self.name, from = %state, to = %next, ?event, "transition");
            state = next;
            self.lock.set_state(state);

            for action in actions {
                match self.execute(action).await {
                    Ok(Some(event)) => queue.push_back(event),
                    Ok(None) => {}
                    Err(error) => {
                        self.abort(&error).await;
                        return Err(error);
                    }
                }
            }
        }

        if let Some(error) = self.failure.take() {
            return Err(OrchestratorError::from_step(&self.name, error));
        }
        let release = self
            .result
            .take()
            .ok_or_else(|| missing("operation result"))?;
        Ok(Outcome {
            release,
            diagnostics: self.diagnostics,
        })
    }

    /// Leave a half-created target FAILED so the release is not stuck in DEPLOYING.
    async fn abort(&mut self, error: &OrchestratorError) {
        let Some(mut target) = self.target.take() else {
            return;
        };
        if !matches!(
            target.code(),
            StatusCode::Deploying | StatusCode::UnknownRollback | StatusCode::Unknown
        ) {
            return;
        }
        target
            .status
            .transition(StatusCode::Failed, format!("Failed: {error}"));
        if let Err(e) = self.inner.store.save(target).await {
            tracing::warn!(release = %self.name, error = %e, "could not mark release failed");
        }
    }

    async fn execute(&mut self, action: Action) -> Result<Option<Event>, OrchestratorError> {
        match action {
            Action::CreateInstallRelease => self.create_install_release().await,
            Action::DeployAllApps => self.deploy_all_apps().await,
            Action::MarkInstalled => self.mark_installed().await,
            Action::MarkInstallFailed => self.mark_install_failed().await,
            Action::AnalyzeUpgrade => self.analyze_upgrade(),
            Action::CreateTargetRelease => self.create_target_release().await,
            Action::DeployTargetApps => self.deploy_target_apps().await,
            Action::WaitForTargetApps => self.wait_for_target_apps().await,
            Action::EvaluateHealth(outcome) => Ok(Some(self.evaluate_health(outcome))),
            Action::PromoteTarget => self.promote_target().await,
            Action::CancelTarget => self.cancel_target().await,
            Action::ResolveRollbackTarget => Ok(Some(self.resolve_rollback_target())),
            Action::DeleteRelease => self.delete_release().await,
        }
    }

    fn step_error(&self, error: StepError) -> OrchestratorError {
        OrchestratorError::from_step(&self.name, error)
    }

    fn is_rollback(&self) -> bool {
        self.candidate
            .as_ref()
            .is_some_and(|c| c.rollback_from.is_some())
    }

    fn new_release(&self, candidate: &Candidate, platform: PlatformName) -> Release {
        let initial = if candidate.rollback_from.is_some() {
            StatusCode::UnknownRollback
        } else {
            StatusCode::Unknown
        };
        Release::new(
            self.name.clone(),
            self.latest_version + 1,
            platform,
            candidate.package.clone(),
            candidate.config_values.clone(),
            candidate.manifest.clone(),
            initial,
        )
    }

    async fn create_install_release(&mut self) -> Result<Option<Event>, OrchestratorError> {
        let candidate = self.candidate.as_ref().ok_or_else(|| missing("candidate"))?;
        let release = self.new_release(candidate, candidate.platform.clone());
        let description = match candidate.rollback_from {
            Some(from) => format!("Rollback to v{from} in progress"),
            None => "Install in progress".to_string(),
        };

        let mut release = self.inner.store.save(release).await?;
        release.status.transition(StatusCode::Deploying, description);
        let release = self.inner.store.save(release).await?;
        tracing::info!(release = %release.name, version = release.version, "created release");

        self.data = Some(AppDeployerData::new(self.name.clone(), release.version, None));
        self.target = Some(release);
        Ok(Some(Event::ReleaseCreated))
    }

    async fn deploy_all_apps(&mut self) -> Result<Option<Event>, OrchestratorError> {
        let target = self.target.as_ref().ok_or_else(|| missing("target release"))?;
        let data = self.data.take().ok_or_else(|| missing("deployer data"))?;
        let components = target.manifest.components()?;
        let specs: Vec<&ComponentSpec> = components.iter().collect();

        match self.inner.deploy.run(target, &specs, data).await {
            Ok(data) => {
                self.data = Some(data);
                Ok(Some(Event::AppsDeployed))
            }
            Err(StepFailure { data, error }) => {
                self.data = Some(data);
                self.failure = Some(error);
                Ok(Some(Event::DeployFailed))
            }
        }
    }

    async fn mark_installed(&mut self) -> Result<Option<Event>, OrchestratorError> {
        let mut target = self.target.take().ok_or_else(|| missing("target release"))?;
        let description = if self.is_rollback() {
            "Rollback complete"
        } else {
            "Install complete"
        };
        target.status.transition(StatusCode::Deployed, description);
        let target = self.inner.store.save(target).await?;
        tracing::info!(release = %target.name, version = target.version, "{description}");
        self.result = Some(target.clone());
        self.target = Some(target);
        Ok(None)
    }

    async fn mark_install_failed(&mut self) -> Result<Option<Event>, OrchestratorError> {
        let mut target = self.target.take().ok_or_else(|| missing("target release"))?;
        let reason = self
            .failure
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        target
            .status
            .transition(StatusCode::Failed, format!("Install failed: {reason}"));
        let target = self.inner.store.save(target).await?;
        tracing::warn!(release = %target.name, version = target.version, %reason, "install failed");
        self.result = Some(target.clone());
        self.target = Some(target);
        Ok(None)
    }

    fn analyze_upgrade(&mut self) -> Result<Option<Event>, OrchestratorError> {
        let current = self.current.as_ref().ok_or_else(|| missing("current release"))?;
        let candidate = self.candidate.as_ref().ok_or_else(|| missing("candidate"))?;
        let report = self.inner.strategy.plan(current, &candidate.manifest)?;

        if report.is_equal() && !candidate.force {
            tracing::info!(
                release = %current.name,
                version = current.version,
                "no changes; release left as is"
            );
            self.result = Some(current.clone());
            return Ok(Some(Event::NoChanges));
        }

        tracing::info!(
            release = %current.name,
            version = current.version,
            summary = %report.summary(),
            "upgrade changes found"
        );
        self.report = Some(report);
        Ok(Some(Event::ChangesFound))
    }

    async fn create_target_release(&mut self) -> Result<Option<Event>, OrchestratorError> {
        let current = self.current.as_ref().ok_or_else(|| missing("current release"))?;
        let candidate = self.candidate.as_ref().ok_or_else(|| missing("candidate"))?;
        let release = self.new_release(candidate, current.platform.clone());

        let (target, data) = self
            .inner
            .strategy
            .create_target(release, current)
            .await
            .map_err(|e| self.step_error(e))?;
        self.target = Some(target);
        self.data = Some(data);
        Ok(None)
    }

    async fn deploy_target_apps(&mut self) -> Result<Option<Event>, OrchestratorError> {
        let target = self.target.as_ref().ok_or_else(|| missing("target release"))?;
        let report = self.report.as_ref().ok_or_else(|| missing("analysis report"))?;
        let data = self.data.take().ok_or_else(|| missing("deployer data"))?;

        match self.inner.strategy.deploy_target(target, report, data).await {
            Ok(data) => {
                self.data = Some(data);
                Ok(Some(Event::AppsDeployed))
            }
            Err(StepFailure { data, error }) => {
                self.data = Some(data);
                self.cancel_reason = Some(format!("Deploy failed: {error}"));
                self.failure = Some(error);
                Ok(Some(Event::DeployFailed))
            }
        }
    }

    async fn wait_for_target_apps(&mut self) -> Result<Option<Event>, OrchestratorError> {
        let target = self.target.as_ref().ok_or_else(|| missing("target release"))?;
        let data = self.data.as_ref().ok_or_else(|| missing("deployer data"))?;
        let timeout = self
            .candidate
            .as_ref()
            .map_or(self.inner.settings.health_timeout, |c| c.timeout);

        self.health_started = Some(Instant::now());
        let outcome = self
            .inner
            .strategy
            .check_target(target, data, timeout, self.lock.cancel_signal())
            .await
            .map_err(|e| OrchestratorError::from_step(&self.name, e))?;
        Ok(Some(Event::HealthCheckCompleted(outcome)))
    }

    fn evaluate_health(&mut self, outcome: HealthOutcome) -> Event {
        match outcome {
            // The state is already CHECK_TARGET_APPS, so no later cancel can be accepted.
            HealthOutcome::Healthy if self.lock.cancel_requested() => {
                let elapsed = self
                    .health_started
                    .map(|started| started.elapsed())
                    .unwrap_or_default();
                self.cancel_reason = Some(format!("Cancelled after {} ms.", elapsed.as_millis()));
                Event::CancelRequested
            }
            HealthOutcome::Healthy => Event::TargetHealthy,
            HealthOutcome::TimedOut { elapsed } => {
                self.cancel_reason = Some(format!(
                    "Did not detect apps in replacing release as healthy after {} ms.",
                    elapsed.as_millis()
                ));
                Event::TargetUnhealthy
            }
            HealthOutcome::Cancelled { elapsed } => {
                self.cancel_reason = Some(format!("Cancelled after {} ms.", elapsed.as_millis()));
                Event::CancelRequested
            }
        }
    }

    async fn promote_target(&mut self) -> Result<Option<Event>, OrchestratorError> {
        let target = self.target.clone().ok_or_else(|| missing("target release"))?;
        let current = self.current.clone().ok_or_else(|| missing("current release"))?;
        let report = self.report.as_ref().ok_or_else(|| missing("analysis report"))?;
        let description = if self.is_rollback() {
            "Rollback complete"
        } else {
            "Upgrade complete"
        };

        let promoted = self
            .inner
            .strategy
            .promote(target, current, report, description, &mut self.diagnostics)
            .await
            .map_err(|e| OrchestratorError::from_step(&self.name, e))?;
        self.result = Some(promoted.clone());
        self.target = Some(promoted);
        Ok(Some(Event::TargetPromoted))
    }

    async fn cancel_target(&mut self) -> Result<Option<Event>, OrchestratorError> {
        let target = self.target.clone().ok_or_else(|| missing("target release"))?;
        let data = self.data.as_ref().ok_or_else(|| missing("deployer data"))?;
        let reason = self.cancel_reason.as_deref().unwrap_or("Cancelled");

        let failed = self
            .inner
            .strategy
            .cancel(target, data, reason, &mut self.diagnostics)
            .await
            .map_err(|e| OrchestratorError::from_step(&self.name, e))?;
        self.result = Some(failed.clone());
        self.target = Some(failed);
        Ok(Some(Event::TargetCancelled))
    }

    fn resolve_rollback_target(&self) -> Event {
        match &self.current {
            Some(current) => {
                tracing::info!(
                    release = %self.name,
                    current = current.version,
                    "rolling back with red/black upgrade"
                );
                Event::RollbackViaUpgrade
            }
            None => {
                tracing::info!(release = %self.name, "no deployed version; rolling back with install");
                Event::RollbackViaInstall
            }
        }
    }

    async fn delete_release(&mut self) -> Result<Option<Event>, OrchestratorError> {
        let target = self.target.clone().ok_or_else(|| missing("target release"))?;
        let store = self.inner.store.as_ref();
        let handles = live_handles(store, &target)
            .await
            .map_err(|e| self.step_error(e))?;

        let deleted = self
            .inner
            .delete
            .run(target, &handles, "Delete complete", &mut self.diagnostics)
            .await
            .map_err(|e| OrchestratorError::from_step(&self.name, e))?;

        for mut release in store.list_versions(&self.name).await? {
            if release.version == deleted.version || release.status.is_deleted() {
                continue;
            }
            release.status.transition(
                StatusCode::Deleted,
                format!("Deleted with v{}", deleted.version),
            );
            store.save(release).await?;
        }

        self.result = Some(deleted);
        Ok(Some(Event::Deleted))
    }
}
