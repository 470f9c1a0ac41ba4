// ABOUTME: Release records: one per (name, version), never removed.
// ABOUTME: Carries the rendered manifest, config values and embedded status.

mod deployer_data;
mod status;

pub use deployer_data::AppDeployerData;
pub use status::{Status, StatusCode};

use serde::{Deserialize, Serialize};

use crate::manifest::{Manifest, Package};
use crate::types::{PlatformName, ReleaseName};

/// Name and version of the package a release was rendered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    pub version: String,
}

impl From<&Package> for PackageRef {
    fn from(package: &Package) -> Self {
        Self {
            name: package.name.clone(),
            version: package.version.clone(),
        }
    }
}

/// One version of a named release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub name: ReleaseName,
    pub version: u32,
    pub platform: PlatformName,
    pub package: PackageRef,
    /// Raw config values the manifest was rendered with.
    #[serde(default)]
    pub config_values: String,
    pub manifest: Manifest,
    pub status: Status,
    /// Optimistic concurrency token, bumped by every successful save.
    #[serde(default)]
    pub revision: u64,
}

impl Release {
    /// A fresh, unsaved release record.
    pub fn new(
        name: ReleaseName,
        version: u32,
        platform: PlatformName,
        package: PackageRef,
        config_values: impl Into<String>,
        manifest: Manifest,
        code: StatusCode,
    ) -> Self {
        Self {
            name,
            version,
            platform,
            package,
            config_values: config_values.into(),
            manifest,
            status: Status::new(code),
            revision: 0,
        }
    }

    pub fn code(&self) -> StatusCode {
        self.status.code
    }
}
