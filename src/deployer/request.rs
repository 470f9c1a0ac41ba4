// ABOUTME: Deployment request sent to a deployer for one component.
// ABOUTME: Scopes the component by a per-version group key and tags it with release attributes.

use std::collections::BTreeMap;

use crate::diff::Properties;
use crate::manifest::ComponentSpec;
use crate::types::ReleaseName;

pub const ATTR_RELEASE_NAME: &str = "berth.release.name";
pub const ATTR_RELEASE_VERSION: &str = "berth.release.version";
pub const ATTR_APPLICATION_NAME: &str = "berth.application.name";

/// Everything a backend needs to launch one component of one release version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    /// `<release>-v<version>`; keeps versions of the same release apart.
    pub group: String,
    pub name: String,
    pub resource: String,
    pub application_properties: Properties,
    pub deployment_properties: Properties,
    pub count: u32,
    pub attributes: BTreeMap<String, String>,
}

impl DeploymentRequest {
    pub fn for_component(release: &ReleaseName, version: u32, spec: &ComponentSpec) -> Self {
        let attributes = BTreeMap::from([
            (ATTR_RELEASE_NAME.to_string(), release.to_string()),
            (ATTR_RELEASE_VERSION.to_string(), version.to_string()),
            (ATTR_APPLICATION_NAME.to_string(), spec.name.clone()),
        ]);
        Self {
            group: release.group_key(version),
            name: spec.name.clone(),
            resource: spec.resource.clone(),
            application_properties: spec.application_properties.clone(),
            deployment_properties: spec.deployment_properties.clone(),
            count: spec.count,
            attributes,
        }
    }

    /// Backend-facing name, unique per release version and component.
    pub fn deployment_name(&self) -> String {
        format!("{}-{}", self.group, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_scoped_by_group_key() {
        let release = ReleaseName::new("ticktock").unwrap();
        let spec = ComponentSpec {
            name: "time".to_string(),
            resource: "maven://time:1.0".to_string(),
            application_properties: Properties::new(),
            deployment_properties: Properties::new(),
            count: 2,
        };

        let request = DeploymentRequest::for_component(&release, 3, &spec);

        assert_eq!(request.group, "ticktock-v3");
        assert_eq!(request.deployment_name(), "ticktock-v3-time");
        assert_eq!(request.count, 2);
        assert_eq!(request.attributes.get(ATTR_RELEASE_NAME).map(String::as_str), Some("ticktock"));
        assert_eq!(request.attributes.get(ATTR_RELEASE_VERSION).map(String::as_str), Some("3"));
        assert_eq!(request.attributes.get(ATTR_APPLICATION_NAME).map(String::as_str), Some("time"));
    }
}
