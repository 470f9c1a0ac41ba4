// ABOUTME: Custom serde deserializers for manifest property maps.
// ABOUTME: Normalises YAML scalars (numbers, booleans) to strings.

use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;

use crate::diff::Properties;

/// Render a YAML scalar the way it would be passed to an application.
///
/// Returns `None` for sequences, mappings and tagged values.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}

/// Deserialize an optional mapping of scalars into a `Properties` map.
pub fn deserialize_properties<'de, D>(deserializer: D) -> Result<Properties, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|(key, value)| match scalar_to_string(&value) {
            Some(s) => Ok((key, s)),
            None => Err(serde::de::Error::custom(format!(
                "property '{key}' must be a scalar value"
            ))),
        })
        .collect()
}

/// Deserialize an optional scalar (such as an artifact version) into a string.
pub fn deserialize_optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(deserializer)?;
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_to_string(&value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected a scalar value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "deserialize_properties")]
        props: Properties,
    }

    #[test]
    fn numbers_and_booleans_become_strings() {
        let holder: Holder = serde_yaml::from_str("props:\n  port: 8080\n  debug: true\n  ratio: 0.5\n").unwrap();
        assert_eq!(holder.props.get("port").map(String::as_str), Some("8080"));
        assert_eq!(holder.props.get("debug").map(String::as_str), Some("true"));
        assert_eq!(holder.props.get("ratio").map(String::as_str), Some("0.5"));
    }

    #[test]
    fn null_becomes_empty_string() {
        let holder: Holder = serde_yaml::from_str("props:\n  cleared:\n").unwrap();
        assert_eq!(holder.props.get("cleared").map(String::as_str), Some(""));
    }

    #[test]
    fn missing_map_is_empty() {
        let holder: Holder = serde_yaml::from_str("{}").unwrap();
        assert!(holder.props.is_empty());
    }

    #[test]
    fn nested_values_are_rejected() {
        let result: Result<Holder, _> = serde_yaml::from_str("props:\n  nested:\n    a: 1\n");
        assert!(result.is_err());
    }
}
