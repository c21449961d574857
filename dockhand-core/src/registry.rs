//! Configuration-model collaborator.

use std::collections::HashSet;

use async_trait::async_trait;
use dockhand_model::{DeploymentName, RegisteredDeployment};
use thiserror::Error;

/// Errors from the configuration model.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Transport-level failure reaching the model.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The model is present but could not answer.
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of the host's deployment configuration model.
///
/// The scanner consults this to distinguish fresh content from content
/// replacing a registered deployment, and at startup to decide which
/// on-disk markers are still meaningful. It never caches answers across
/// cycles.
#[async_trait]
pub trait DeploymentRegistry: Send + Sync {
    /// Look up a registered deployment by name.
    async fn find_deployment(
        &self,
        name: &DeploymentName,
    ) -> Result<Option<RegisteredDeployment>, RegistryError>;

    /// Names of every registered deployment. Used once at startup to
    /// validate recovered markers.
    async fn deployment_names(&self) -> Result<HashSet<DeploymentName>, RegistryError>;
}
