// ABOUTME: Rendered manifests, packages and config values.
// ABOUTME: The renderer seam turns a package plus values into a manifest.

mod component;
mod deserialize;
mod error;
mod render;

pub use component::{API_VERSION, ComponentSpec, KIND_APPLICATION};
pub use error::ManifestError;
pub use render::OverlayRenderer;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::diff::Properties;

/// Rendered, concrete description of every component in one release version.
///
/// The text is stored verbatim; rollback replays it byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(String);

impl Manifest {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the manifest into its components, in document order.
    pub fn components(&self) -> Result<Vec<ComponentSpec>, ManifestError> {
        Ok(component::parse_documents(&self.0)?
            .into_iter()
            .map(|doc| doc.into_spec())
            .collect())
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named, versioned template: the component documents before config values apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub template: String,
}

impl Package {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            template: template.into(),
        }
    }
}

/// Per-component overrides supplied at install or upgrade time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComponentValues {
    #[serde(default, deserialize_with = "deserialize::deserialize_properties")]
    pub application_properties: Properties,
    #[serde(default, deserialize_with = "deserialize::deserialize_properties")]
    pub deployment_properties: Properties,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default, deserialize_with = "deserialize::deserialize_optional_scalar")]
    pub version: Option<String>,
}

/// Raw config values text plus its parsed per-component overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigValues {
    raw: String,
    components: BTreeMap<String, ComponentValues>,
}

impl ConfigValues {
    /// Parse values shaped as `<component>: {applicationProperties, deploymentProperties, count, version}`.
    ///
    /// Blank text yields no overrides.
    pub fn from_yaml(raw: &str) -> Result<Self, ManifestError> {
        let components = if raw.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_yaml::from_str::<Option<BTreeMap<String, ComponentValues>>>(raw)
                .map_err(|e| ManifestError::InvalidValues(e.to_string()))?
                .unwrap_or_default()
        };
        Ok(Self {
            raw: raw.to_string(),
            components,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn component(&self, name: &str) -> Option<&ComponentValues> {
        self.components.get(name)
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }
}

/// Renders a package and its config values into a concrete manifest.
pub trait ManifestRenderer: Send + Sync {
    fn render(&self, package: &Package, values: &ConfigValues) -> Result<Manifest, ManifestError>;
}
