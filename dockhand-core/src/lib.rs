//! Filesystem deployment scanner for the dockhand platform.
//!
//! The scanner watches a drop directory for deployable content, derives
//! the set of deployment actions needed to reconcile what it observes
//! with what it believes is already handed off, and submits those
//! actions as a [`dockhand_model::DeploymentPlan`] to an external
//! [`DeploymentManager`]. Successful hand-offs are recorded as `.deployed`
//! marker files next to where the content was dropped; the markers are
//! the only persisted state and the in-memory deployed set is rebuilt
//! from them at startup.
//!
//! The host wires the scanner up with three collaborators: a
//! [`FileSystem`] (usually [`RealFs`]), a [`DeploymentRegistry`] exposing
//! the configuration model, and a [`DeploymentManager`] that executes
//! plans against the runtime.

pub mod config;
pub mod error;
pub mod filter;
pub mod fs;
pub mod manager;
pub mod registry;
pub mod scanner;

pub use config::{ConfigError, ScannerConfig};
pub use error::{Result, ScanError};
pub use filter::{AcceptAll, ScanFilter, StandardFilter};
pub use fs::{FileSystem, FsMetadata, InMemoryFs, ReadDirStream, RealFs};
pub use manager::{DeploymentManager, ExecuteError, StageError};
pub use registry::{DeploymentRegistry, RegistryError};
pub use scanner::{CycleStats, DeploymentScanner, MARKER_SUFFIX};
