// ABOUTME: Error types for manifest parsing and rendering.
// ABOUTME: Any of these aborts an operation before state is touched.

/// Errors raised while parsing or rendering a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The manifest text is not valid YAML or does not match the component schema.
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The manifest contains no component documents.
    #[error("manifest declares no components")]
    Empty,

    /// Two documents declare the same component name.
    #[error("component '{0}' is declared more than once")]
    DuplicateComponent(String),

    /// A component document has a blank name.
    #[error("component name cannot be empty")]
    MissingName,

    /// Config values reference a component the package does not define.
    #[error("config values reference unknown component '{0}'")]
    UnknownComponent(String),

    /// Config values could not be parsed.
    #[error("invalid config values: {0}")]
    InvalidValues(String),
}
