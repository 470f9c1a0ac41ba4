// ABOUTME: Library root for berth, a release orchestration control plane.
// ABOUTME: Wires manifests, deployers, storage and the release state machine together.

pub mod analysis;
pub mod config;
pub mod deployer;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod reconciler;
pub mod release;
pub mod steps;
pub mod store;
pub mod strategy;
pub mod types;

pub use orchestrator::{Orchestrator, OrchestratorError, OrchestratorSettings, Outcome};
