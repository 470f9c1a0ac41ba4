// ABOUTME: Configuration types and parsing for berth.yml.
// ABOUTME: Handles YAML parsing, env var interpolation, and validation.

mod env_value;
mod platform;
mod settings;

pub use env_value::{EnvValue, resolve_env_map};
pub use platform::PlatformConfig;
pub use settings::{HealthCheckConfig, OperationsConfig, ReconcilerConfig};

use crate::error::{ConfigError, Result};
use crate::types::PlatformName;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

pub const CONFIG_FILENAME: &str = "berth.yml";
pub const CONFIG_FILENAME_ALT: &str = "berth.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".berth/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct BerthConfig {
    #[serde(default)]
    pub health_check: HealthCheckConfig,

    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    #[serde(default)]
    pub operations: OperationsConfig,

    #[serde(deserialize_with = "deserialize_platforms")]
    pub platforms: NonEmpty<PlatformConfig>,

    #[serde(default)]
    pub default_platform: Option<PlatformName>,
}

impl BerthConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: BerthConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(ConfigError::ConfigNotFound(dir.to_path_buf()))
    }

    /// Platform used when a request names none: the configured default, else the first.
    pub fn default_platform(&self) -> &PlatformName {
        self.default_platform
            .as_ref()
            .unwrap_or(&self.platforms.first().name)
    }

    pub fn platform(&self, name: &PlatformName) -> Option<&PlatformConfig> {
        self.platforms.iter().find(|p| &p.name == name)
    }

    fn validate(&self) -> Result<()> {
        if self.operations.max_concurrent == 0 {
            return Err(ConfigError::InvalidConfig(
                "operations.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.health_check.interval.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "health_check.interval must be greater than zero".to_string(),
            ));
        }
        if self.reconciler.enabled && self.reconciler.interval.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "reconciler.interval must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for platform in self.platforms.iter() {
            if platform.name.as_str().trim().is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "platform name cannot be empty".to_string(),
                ));
            }
            if !seen.insert(platform.name.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "duplicate platform '{}'",
                    platform.name
                )));
            }
        }

        if let Some(default) = &self.default_platform
            && self.platform(default).is_none()
        {
            return Err(ConfigError::InvalidConfig(format!(
                "default_platform '{default}' is not a configured platform"
            )));
        }

        Ok(())
    }
}

fn deserialize_platforms<'de, D>(
    deserializer: D,
) -> std::result::Result<NonEmpty<PlatformConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let platforms: Vec<PlatformConfig> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(platforms)
        .ok_or_else(|| serde::de::Error::custom("at least one platform is required"))
}
