// ABOUTME: Component documents of a rendered manifest.
// ABOUTME: Parses multi-document YAML into ordered component specs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::ManifestError;
use super::deserialize::{deserialize_optional_scalar, deserialize_properties};
use crate::diff::Properties;

pub const API_VERSION: &str = "berth/v1";
pub const KIND_APPLICATION: &str = "Application";

/// One deployable unit extracted from a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    pub name: String,
    /// Artifact reference, with `:<version>` appended when the document sets one.
    pub resource: String,
    pub application_properties: Properties,
    pub deployment_properties: Properties,
    pub count: u32,
}

/// Serialized form of a single component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ComponentDocument {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub metadata: Metadata,
    pub spec: DocumentSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Metadata {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentSpec {
    pub resource: String,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_properties",
        skip_serializing_if = "Properties::is_empty"
    )]
    pub application_properties: Properties,
    #[serde(
        default,
        deserialize_with = "deserialize_properties",
        skip_serializing_if = "Properties::is_empty"
    )]
    pub deployment_properties: Properties,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND_APPLICATION.to_string()
}

fn default_count() -> u32 {
    1
}

impl ComponentDocument {
    pub fn into_spec(self) -> ComponentSpec {
        let resource = match self.spec.version {
            Some(version) if !version.is_empty() => format!("{}:{}", self.spec.resource, version),
            _ => self.spec.resource,
        };
        ComponentSpec {
            name: self.metadata.name,
            resource,
            application_properties: self.spec.application_properties,
            deployment_properties: self.spec.deployment_properties,
            count: self.spec.count,
        }
    }
}

/// Parse every non-empty YAML document in `text`, rejecting blank or duplicate names.
pub(crate) fn parse_documents(text: &str) -> Result<Vec<ComponentDocument>, ManifestError> {
    let mut documents = Vec::new();
    let mut seen = HashSet::new();

    for document in serde_yaml::Deserializer::from_str(text) {
        let Some(parsed) = Option::<ComponentDocument>::deserialize(document)? else {
            continue;
        };
        let name = parsed.metadata.name.trim();
        if name.is_empty() {
            return Err(ManifestError::MissingName);
        }
        if !seen.insert(name.to_string()) {
            return Err(ManifestError::DuplicateComponent(name.to_string()));
        }
        documents.push(parsed);
    }

    if documents.is_empty() {
        return Err(ManifestError::Empty);
    }
    Ok(documents)
}

/// Serialize documents back into multi-document YAML.
pub(crate) fn write_documents(documents: &[ComponentDocument]) -> Result<String, ManifestError> {
    let mut out = String::new();
    for document in documents {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(document)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_APPS: &str = r#"
apiVersion: berth/v1
kind: Application
metadata:
  name: time
spec:
  resource: maven://org.example:time-source
  version: 1.0.0
  applicationProperties:
    trigger.fixed-delay: 5
  count: 2
---
apiVersion: berth/v1
kind: Application
metadata:
  name: log
spec:
  resource: maven://org.example:log-sink
"#;

    #[test]
    fn parses_documents_in_order() {
        let docs = parse_documents(TWO_APPS).unwrap();
        let specs: Vec<_> = docs.into_iter().map(ComponentDocument::into_spec).collect();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "time");
        assert_eq!(specs[0].resource, "maven://org.example:time-source:1.0.0");
        assert_eq!(specs[0].count, 2);
        assert_eq!(
            specs[0].application_properties.get("trigger.fixed-delay").map(String::as_str),
            Some("5")
        );
        assert_eq!(specs[1].name, "log");
        assert_eq!(specs[1].resource, "maven://org.example:log-sink");
        assert_eq!(specs[1].count, 1);
    }

    #[test]
    fn rejects_duplicate_names() {
        let text = "metadata: {name: a}\nspec: {resource: r}\n---\nmetadata: {name: a}\nspec: {resource: s}\n";
        assert!(matches!(
            parse_documents(text),
            Err(ManifestError::DuplicateComponent(name)) if name == "a"
        ));
    }

    #[test]
    fn rejects_empty_manifest() {
        assert!(matches!(parse_documents(""), Err(ManifestError::Empty)));
        assert!(matches!(parse_documents("---\n---\n"), Err(ManifestError::Empty)));
    }

    #[test]
    fn rejects_blank_name() {
        let text = "metadata: {name: ' '}\nspec: {resource: r}\n";
        assert!(matches!(parse_documents(text), Err(ManifestError::MissingName)));
    }

    #[test]
    fn rejects_missing_resource() {
        let text = "metadata: {name: a}\nspec: {count: 1}\n";
        assert!(matches!(parse_documents(text), Err(ManifestError::Parse(_))));
    }

    #[test]
    fn written_documents_parse_back() {
        let docs = parse_documents(TWO_APPS).unwrap();
        let text = write_documents(&docs).unwrap();
        assert_eq!(parse_documents(&text).unwrap(), docs);
    }
}
