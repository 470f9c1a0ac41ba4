// ABOUTME: Compile-fail test verifying DeploymentId and PlatformName are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.

use berth::types::{DeploymentId, PlatformName};

fn takes_deployment_id(_id: DeploymentId) {}

fn main() {
    let platform = PlatformName::new("local");
    takes_deployment_id(platform); // ERROR: expected DeploymentId, found PlatformName
}
