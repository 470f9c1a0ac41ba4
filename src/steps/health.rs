// ABOUTME: Polls a new version's handles until all are deployed, the deadline passes, or a cancel arrives.
// ABOUTME: Timeout and cancellation are outcomes, not errors.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use super::StepError;
use crate::deployer::DeployerRegistry;
use crate::release::{AppDeployerData, Release};

/// Result of waiting for a new version to become healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthOutcome {
    Healthy,
    TimedOut { elapsed: Duration },
    Cancelled { elapsed: Duration },
}

impl HealthOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthOutcome::Healthy)
    }
}

#[derive(Clone)]
pub struct HealthCheckStep {
    registry: Arc<DeployerRegistry>,
    interval: Duration,
}

impl HealthCheckStep {
    pub fn new(registry: Arc<DeployerRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Wait for every handle in `data` to report deployed.
    ///
    /// The deadline is fixed when the wait starts. A `true` on `cancel` ends the
    /// wait within one polling interval. Each handle is polled at most once per
    /// round and rounds never overlap.
    pub async fn run(
        &self,
        release: &Release,
        data: &AppDeployerData,
        timeout: Duration,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<HealthOutcome, StepError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let deployer = self.registry.get(&release.platform)?;
        let handles: Vec<_> = data.all_handles().collect();

        if handles.is_empty() {
            return Ok(HealthOutcome::Healthy);
        }

        // Once the sender is gone no cancel can arrive; stop selecting on it.
        let mut listening = true;

        loop {
            if *cancel.borrow_and_update() {
                let elapsed = started.elapsed();
                tracing::info!(release = %release.name, version = release.version, "health check cancelled");
                return Ok(HealthOutcome::Cancelled { elapsed });
            }

            let statuses = join_all(handles.iter().map(|(_, id)| deployer.status(id))).await;
            let mut healthy = 0;
            for ((component, id), status) in handles.iter().zip(&statuses) {
                match status {
                    Ok(status) if status.is_deployed() => healthy += 1,
                    Ok(status) => tracing::debug!(
                        release = %release.name,
                        version = release.version,
                        component = %component,
                        deployment_id = %id,
                        state = %status.state,
                        "waiting for component"
                    ),
                    Err(e) => tracing::debug!(
                        release = %release.name,
                        version = release.version,
                        component = %component,
                        deployment_id = %id,
                        error = %e,
                        "status check failed"
                    ),
                }
            }

            // A cancel that arrived during the status round wins over a healthy result.
            if healthy == handles.len() && *cancel.borrow_and_update() {
                let elapsed = started.elapsed();
                tracing::info!(release = %release.name, version = release.version, "health check cancelled");
                return Ok(HealthOutcome::Cancelled { elapsed });
            }
            if healthy == handles.len() {
                tracing::info!(release = %release.name, version = release.version, "all components healthy");
                return Ok(HealthOutcome::Healthy);
            }

            let now = Instant::now();
            if now >= deadline {
                let elapsed = started.elapsed();
                tracing::warn!(
                    release = %release.name,
                    version = release.version,
                    healthy,
                    total = handles.len(),
                    "health check timed out"
                );
                return Ok(HealthOutcome::TimedOut { elapsed });
            }

            let wake = (now + self.interval).min(deadline);
            if listening {
                tokio::select! {
                    _ = tokio::time::sleep_until(wake) => {}
                    changed = cancel.changed() => {
                        if changed.is_err() {
                            listening = false;
                        }
                    }
                }
            } else {
                tokio::time::sleep_until(wake).await;
            }
        }
    }
}
