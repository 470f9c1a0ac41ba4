// ABOUTME: Release status codes and timestamps.
// ABOUTME: Transitions stamp first-deployed, last-deployed and deleted times.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse lifecycle state of one release version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Unknown,
    Deploying,
    Deployed,
    Failed,
    Deleting,
    Deleted,
    UnknownRollback,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Unknown => "UNKNOWN",
            StatusCode::Deploying => "DEPLOYING",
            StatusCode::Deployed => "DEPLOYED",
            StatusCode::Failed => "FAILED",
            StatusCode::Deleting => "DELETING",
            StatusCode::Deleted => "DELETED",
            StatusCode::UnknownRollback => "UNKNOWN_ROLLBACK",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status embedded in a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    /// Human-readable reason for the last transition.
    #[serde(default)]
    pub description: String,
    /// Live summary reported by the deployer backend.
    #[serde(default)]
    pub platform_status: String,
    #[serde(default)]
    pub first_deployed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_deployed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted: Option<DateTime<Utc>>,
}

impl Status {
    pub fn new(code: StatusCode) -> Self {
        Self {
            code,
            description: String::new(),
            platform_status: String::new(),
            first_deployed: None,
            last_deployed: None,
            deleted: None,
        }
    }

    /// Move to `code`, recording `description` and stamping the relevant timestamps.
    pub fn transition(&mut self, code: StatusCode, description: impl Into<String>) {
        let now = Utc::now();
        match code {
            StatusCode::Deploying | StatusCode::UnknownRollback => {
                self.first_deployed.get_or_insert(now);
            }
            StatusCode::Deployed => {
                self.first_deployed.get_or_insert(now);
                self.last_deployed = Some(now);
            }
            StatusCode::Deleted => {
                self.deleted = Some(now);
            }
            StatusCode::Unknown | StatusCode::Failed | StatusCode::Deleting => {}
        }
        self.code = code;
        self.description = description.into();
    }

    pub fn is_deployed(&self) -> bool {
        self.code == StatusCode::Deployed
    }

    pub fn is_deleted(&self) -> bool {
        self.code == StatusCode::Deleted
    }
}
