//! The scan pipeline: walk, decide, execute, convert, prune, commit.

mod markers;
mod plan_builder;
mod service;
mod tracker;
mod walker;

pub use markers::MARKER_SUFFIX;
pub use service::{CycleStats, DeploymentScanner};
