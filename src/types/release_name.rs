// ABOUTME: DNS-compatible release name validation.
// ABOUTME: Ensures release names follow RFC 1123 label requirements.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReleaseNameError {
    #[error("release name cannot be empty")]
    Empty,

    #[error("release name exceeds maximum length of 53 characters")]
    TooLong,

    #[error("release name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("release name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("release name must be lowercase")]
    NotLowercase,

    #[error("invalid character in release name: '{0}'")]
    InvalidChar(char),
}

/// Name of a release.
///
/// Deployments are grouped under `<name>-v<version>`, so the name leaves room
/// for the version suffix inside a 63 character DNS label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReleaseName(String);

impl ReleaseName {
    pub const MAX_LEN: usize = 53;

    pub fn new(value: &str) -> Result<Self, ReleaseNameError> {
        if value.is_empty() {
            return Err(ReleaseNameError::Empty);
        }

        if value.len() > Self::MAX_LEN {
            return Err(ReleaseNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(ReleaseNameError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(ReleaseNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(ReleaseNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(ReleaseNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Group key used to scope the deployments of one release version.
    pub fn group_key(&self, version: u32) -> String {
        format!("{}-v{}", self.0, version)
    }
}

impl fmt::Display for ReleaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ReleaseName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ReleaseName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ReleaseName::new(&s).map_err(serde::de::Error::custom)
    }
}
