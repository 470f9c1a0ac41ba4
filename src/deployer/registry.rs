// ABOUTME: Maps platform names to bound deployers.
// ABOUTME: Built once at startup from configuration and read-only afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::Deployer;
use crate::config::{BerthConfig, PlatformConfig};
use crate::error::ConfigError;
use crate::types::PlatformName;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown platform '{0}'")]
    UnknownPlatform(PlatformName),

    #[error("platform '{0}' is registered more than once")]
    DuplicatePlatform(PlatformName),

    #[error("no platforms registered")]
    Empty,
}

struct Registered {
    platform_type: String,
    deployer: Arc<dyn Deployer>,
}

/// Platform name to deployer lookup.
pub struct DeployerRegistry {
    platforms: BTreeMap<PlatformName, Registered>,
    default: Option<PlatformName>,
}

impl std::fmt::Debug for DeployerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployerRegistry")
            .field("platforms", &self.platforms.keys().collect::<Vec<_>>())
            .field("default", &self.default)
            .finish()
    }
}

impl DeployerRegistry {
    pub fn new() -> Self {
        Self {
            platforms: BTreeMap::new(),
            default: None,
        }
    }

    /// Build a registry from configured platforms.
    ///
    /// `factory` receives each platform's config and its resolved options and
    /// binds a backend for it.
    pub fn from_config<F>(config: &BerthConfig, mut factory: F) -> Result<Self, ConfigError>
    where
        F: FnMut(
            &PlatformConfig,
            &BTreeMap<String, String>,
        ) -> Result<Arc<dyn Deployer>, ConfigError>,
    {
        let mut registry = Self::new();
        for platform in config.platforms.iter() {
            let options = platform.resolve_options()?;
            let deployer = factory(platform, &options)?;
            registry
                .register(platform.name.clone(), &platform.platform_type, deployer)
                .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
            tracing::debug!(
                platform = %platform.name,
                platform_type = %platform.platform_type,
                "registered deployer"
            );
        }
        registry.default = Some(config.default_platform().clone());
        Ok(registry)
    }

    /// Bind `deployer` under `name`. The first registered platform becomes the default.
    pub fn register(
        &mut self,
        name: PlatformName,
        platform_type: &str,
        deployer: Arc<dyn Deployer>,
    ) -> Result<(), RegistryError> {
        if self.platforms.contains_key(&name) {
            return Err(RegistryError::DuplicatePlatform(name));
        }
        if self.default.is_none() {
            self.default = Some(name.clone());
        }
        self.platforms.insert(
            name,
            Registered {
                platform_type: platform_type.to_string(),
                deployer,
            },
        );
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(
        mut self,
        name: PlatformName,
        platform_type: &str,
        deployer: Arc<dyn Deployer>,
    ) -> Result<Self, RegistryError> {
        self.register(name, platform_type, deployer)?;
        Ok(self)
    }

    pub fn set_default(&mut self, name: PlatformName) -> Result<(), RegistryError> {
        if !self.platforms.contains_key(&name) {
            return Err(RegistryError::UnknownPlatform(name));
        }
        self.default = Some(name);
        Ok(())
    }

    pub fn get(&self, name: &PlatformName) -> Result<Arc<dyn Deployer>, RegistryError> {
        self.platforms
            .get(name)
            .map(|r| Arc::clone(&r.deployer))
            .ok_or_else(|| RegistryError::UnknownPlatform(name.clone()))
    }

    pub fn contains(&self, name: &PlatformName) -> bool {
        self.platforms.contains_key(name)
    }

    pub fn platform_type(&self, name: &PlatformName) -> Option<&str> {
        self.platforms.get(name).map(|r| r.platform_type.as_str())
    }

    pub fn default_platform(&self) -> Result<&PlatformName, RegistryError> {
        self.default.as_ref().ok_or(RegistryError::Empty)
    }

    pub fn platforms(&self) -> impl Iterator<Item = &PlatformName> {
        self.platforms.keys()
    }
}

impl Default for DeployerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
