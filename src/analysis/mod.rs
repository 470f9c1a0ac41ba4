// ABOUTME: Release analysis: which components of a candidate manifest must be redeployed.
// ABOUTME: Builds on the properties differ to compare component specs.

mod analyzer;
mod report;

pub use analyzer::ReleaseAnalyzer;
pub use report::{ChangeKind, ComponentChange, ReleaseAnalysisReport};
