// ABOUTME: Builder-style requests for install and upgrade.
// ABOUTME: Optional fields fall back to orchestrator settings.

use std::time::Duration;

use crate::manifest::{ConfigValues, Package};
use crate::types::{PlatformName, ReleaseName};

#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub name: ReleaseName,
    pub package: Package,
    pub values: ConfigValues,
    /// Deployer account; the registry default when unset.
    pub platform: Option<PlatformName>,
}

impl InstallRequest {
    pub fn new(name: ReleaseName, package: Package) -> Self {
        Self {
            name,
            package,
            values: ConfigValues::default(),
            platform: None,
        }
    }

    pub fn values(mut self, values: ConfigValues) -> Self {
        self.values = values;
        self
    }

    pub fn platform(mut self, platform: PlatformName) -> Self {
        self.platform = Some(platform);
        self
    }
}

#[derive(Debug, Clone)]
pub struct UpgradeRequest {
    pub name: ReleaseName,
    pub package: Package,
    pub values: ConfigValues,
    /// Health check timeout; the configured default when unset.
    pub timeout: Option<Duration>,
    /// Create a new version even when nothing changed.
    pub force: bool,
}

impl UpgradeRequest {
    pub fn new(name: ReleaseName, package: Package) -> Self {
        Self {
            name,
            package,
            values: ConfigValues::default(),
            timeout: None,
            force: false,
        }
    }

    pub fn values(mut self, values: ConfigValues) -> Self {
        self.values = values;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}
