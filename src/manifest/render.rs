// ABOUTME: Default manifest renderer that overlays config values on a package.
// ABOUTME: Values merge per component; no templating language is involved.

use super::component::{parse_documents, write_documents};
use super::{ConfigValues, Manifest, ManifestError, ManifestRenderer, Package};

/// Merges per-component config values over the package's component documents.
///
/// Properties from the values win over the template's; `count` and `version`
/// replace the template's when present.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayRenderer;

impl ManifestRenderer for OverlayRenderer {
    fn render(&self, package: &Package, values: &ConfigValues) -> Result<Manifest, ManifestError> {
        let mut documents = parse_documents(&package.template)?;

        for name in values.component_names() {
            if !documents.iter().any(|doc| doc.metadata.name == name) {
                return Err(ManifestError::UnknownComponent(name.to_string()));
            }
        }

        for document in &mut documents {
            let Some(overlay) = values.component(&document.metadata.name) else {
                continue;
            };
            let spec = &mut document.spec;
            spec.application_properties.extend(
                overlay
                    .application_properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
            spec.deployment_properties.extend(
                overlay
                    .deployment_properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
            if let Some(count) = overlay.count {
                spec.count = count;
            }
            if let Some(version) = &overlay.version {
                spec.version = Some(version.clone());
            }
        }

        tracing::debug!(
            package = %package.name,
            package_version = %package.version,
            components = documents.len(),
            "rendered manifest"
        );
        Ok(Manifest::new(write_documents(&documents)?))
    }
}
