//! Routing classifier: weighted multi-signal scoring and tier assignment.

mod classifier;

pub use classifier::{RoutingClassifier, RoutingConfig, RoutingWeights};
