// ABOUTME: Diagnostics accumulator for non-fatal problems during an operation.
// ABOUTME: Collects warnings that shouldn't fail an operation but should reach the caller.

/// Collects non-fatal warnings during orchestration.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Move every warning from `other` into this accumulator without logging again.
    pub fn absorb(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }
}

/// A non-fatal warning collected during an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Create an undeploy failure warning.
    pub fn undeploy_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::UndeployFailed,
            message: message.into(),
        }
    }

    /// Create a status probe failure warning.
    pub fn status_probe(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::StatusProbe,
            message: message.into(),
        }
    }

    /// Create a manual cleanup warning.
    pub fn manual_cleanup(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ManualCleanup,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A backend failed to undeploy a handle (the deployment may still be running).
    UndeployFailed,
    /// A backend failed to report the status of a handle.
    StatusProbe,
    /// Leftover deployments need an operator to remove them.
    ManualCleanup,
}
