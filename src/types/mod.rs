// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod id;
mod release_name;

pub use id::{DeploymentId, Id, PlatformName};
pub use release_name::{ReleaseName, ReleaseNameError};
