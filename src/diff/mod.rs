// ABOUTME: Property set comparison used to decide whether a component changed.
// ABOUTME: Exposes PropertiesDiff and the Properties map alias.

mod properties;

pub use properties::{Properties, PropertiesDiff, PropertyChange};
