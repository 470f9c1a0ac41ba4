// ABOUTME: Deployer platform accounts declared in configuration.
// ABOUTME: Each account names a platform type and its backend options.

use serde::Deserialize;
use std::collections::BTreeMap;

use super::env_value::{EnvValue, resolve_env_map};
use crate::error::Result;
use crate::types::PlatformName;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlatformConfig {
    pub name: PlatformName,
    /// Backend kind, e.g. `local`, `kubernetes` or `cloudfoundry`.
    #[serde(rename = "type")]
    pub platform_type: String,
    #[serde(default)]
    pub options: BTreeMap<String, EnvValue>,
}

impl PlatformConfig {
    /// Resolve every option, reading env-backed values from the environment.
    pub fn resolve_options(&self) -> Result<BTreeMap<String, String>> {
        resolve_env_map(&self.options)
    }
}
