// ABOUTME: Test support utilities.
// ABOUTME: Provides tracing setup, a scriptable in-memory deployer and package fixtures.

use async_trait::async_trait;
use berth::deployer::{
    AppStatus, Deployer, DeployerError, DeployerRegistry, DeploymentRequest, DeploymentState,
};
use berth::manifest::{ConfigValues, OverlayRenderer, Package};
use berth::store::MemoryStore;
use berth::types::{DeploymentId, PlatformName, ReleaseName};
use berth::{Orchestrator, OrchestratorSettings};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::Notify;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("berth=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[derive(Default)]
struct FakeState {
    running: BTreeMap<String, DeploymentState>,
    fail_deploy: HashSet<String>,
    fail_undeploy: HashSet<String>,
    unhealthy: HashSet<String>,
    deploys: Vec<String>,
    undeploys: Vec<String>,
    gates: HashMap<String, StatusGate>,
}

/// Holds the next status call for one deployment until released.
#[derive(Clone, Default)]
pub struct StatusGate {
    /// Notified once the held status call has started.
    pub entered: Arc<Notify>,
    /// Notify to let the held status call return.
    pub release: Arc<Notify>,
}

/// Deployer keyed by deployment name (`<release>-v<version>-<component>`).
///
/// Deployments are healthy unless marked otherwise; failures are scripted
/// per deployment name.
#[derive(Default)]
pub struct FakeDeployer {
    state: Mutex<FakeState>,
}

#[allow(dead_code)]
impl FakeDeployer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_deploy(&self, deployment: &str) {
        self.state.lock().fail_deploy.insert(deployment.to_string());
    }

    pub fn fail_undeploy(&self, deployment: &str) {
        self.state.lock().fail_undeploy.insert(deployment.to_string());
    }

    pub fn mark_unhealthy(&self, deployment: &str) {
        self.state.lock().unhealthy.insert(deployment.to_string());
    }

    pub fn mark_healthy(&self, deployment: &str) {
        self.state.lock().unhealthy.remove(deployment);
    }

    /// Block the next status call for `deployment` until the gate is released.
    pub fn hold_status(&self, deployment: &str) -> StatusGate {
        let gate = StatusGate::default();
        self.state
            .lock()
            .gates
            .insert(deployment.to_string(), gate.clone());
        gate
    }

    /// Set the reported state of a running deployment.
    pub fn set_state(&self, deployment: &str, state: DeploymentState) {
        self.state.lock().running.insert(deployment.to_string(), state);
    }

    /// Names of deployments that are currently running, sorted.
    pub fn running(&self) -> Vec<String> {
        self.state.lock().running.keys().cloned().collect()
    }

    pub fn deploys(&self) -> Vec<String> {
        self.state.lock().deploys.clone()
    }

    pub fn undeploys(&self) -> Vec<String> {
        self.state.lock().undeploys.clone()
    }
}

#[async_trait]
impl Deployer for FakeDeployer {
    async fn deploy(&self, request: &DeploymentRequest) -> Result<DeploymentId, DeployerError> {
        let name = request.deployment_name();
        let mut state = self.state.lock();
        state.deploys.push(name.clone());
        if state.fail_deploy.contains(&name) {
            return Err(DeployerError::DeployFailed {
                name,
                reason: "scripted failure".to_string(),
            });
        }
        let initial = if state.unhealthy.contains(&name) {
            DeploymentState::Deploying
        } else {
            DeploymentState::Deployed
        };
        state.running.insert(name.clone(), initial);
        Ok(DeploymentId::new(name))
    }

    async fn status(&self, id: &DeploymentId) -> Result<AppStatus, DeployerError> {
        let gate = self.state.lock().gates.remove(id.as_str());
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        let state = self.state.lock();
        let current = state
            .running
            .get(id.as_str())
            .ok_or_else(|| DeployerError::UnknownDeployment(id.clone()))?;
        let reported = if state.unhealthy.contains(id.as_str()) {
            DeploymentState::Deploying
        } else {
            *current
        };
        Ok(AppStatus::new(id.clone(), reported))
    }

    async fn undeploy(&self, id: &DeploymentId) -> Result<(), DeployerError> {
        let mut state = self.state.lock();
        state.undeploys.push(id.to_string());
        if state.fail_undeploy.contains(id.as_str()) {
            return Err(DeployerError::UndeployFailed {
                id: id.clone(),
                reason: "scripted failure".to_string(),
            });
        }
        state.running.remove(id.as_str());
        Ok(())
    }
}

pub const TEMPLATE: &str = r#"
apiVersion: berth/v1
kind: Application
metadata:
  name: time
spec:
  resource: registry/time-source
  version: 1.0.0
  applicationProperties:
    trigger.fixed-delay: 1
---
apiVersion: berth/v1
kind: Application
metadata:
  name: log
spec:
  resource: registry/log-sink
  version: 1.0.0
  deploymentProperties:
    memory: 512m
"#;

#[allow(dead_code)]
pub fn package() -> Package {
    Package::new("ticktock", "1.0.0", TEMPLATE)
}

#[allow(dead_code)]
pub fn values(yaml: &str) -> ConfigValues {
    ConfigValues::from_yaml(yaml).unwrap()
}

#[allow(dead_code)]
pub fn name(value: &str) -> ReleaseName {
    ReleaseName::new(value).unwrap()
}

#[allow(dead_code)]
pub fn platform() -> PlatformName {
    PlatformName::new("default")
}

#[allow(dead_code)]
pub fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        health_timeout: Duration::from_secs(30),
        health_interval: Duration::from_secs(1),
        max_concurrent: 4,
        reconciler_enabled: false,
        reconcile_interval: Duration::from_secs(10),
    }
}

/// An orchestrator over a memory store with `deployer` as the only platform.
#[allow(dead_code)]
pub fn orchestrator(deployer: Arc<FakeDeployer>) -> (Orchestrator, Arc<MemoryStore>) {
    orchestrator_with(settings(), deployer)
}

#[allow(dead_code)]
pub fn orchestrator_with(
    settings: OrchestratorSettings,
    deployer: Arc<FakeDeployer>,
) -> (Orchestrator, Arc<MemoryStore>) {
    init_tracing();
    let registry = DeployerRegistry::new()
        .with(platform(), "fake", deployer)
        .unwrap();
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(
        settings,
        Arc::new(registry),
        store.clone(),
        Arc::new(OverlayRenderer),
    );
    (orchestrator, store)
}
