//! Deployment-execution collaborator.

use async_trait::async_trait;
use dockhand_model::{ContentSummary, DeploymentName, DeploymentPlan, PlanReport};
use thiserror::Error;

/// Errors staging content with the runtime before plan submission.
#[derive(Error, Debug)]
pub enum StageError {
    /// A deployment of this name already exists on the runtime side.
    /// Surfaced when another management actor registered the name
    /// between the scanner's lookup and the upload.
    #[error("a deployment named {0} already exists")]
    DuplicateName(DeploymentName),

    /// Reading or transferring the content failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The runtime refused the content for any other reason.
    #[error("content rejected: {0}")]
    Rejected(String),
}

/// Errors executing a submitted plan.
#[derive(Error, Debug)]
pub enum ExecuteError {
    /// Transport-level failure submitting the plan or awaiting it.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The runtime reported the plan as a whole as failed.
    #[error("execution failed: {0}")]
    Failed(String),

    /// The runtime cancelled the plan before completion.
    #[error("execution cancelled")]
    Cancelled,
}

/// The collaborator that applies deployment plans to the runtime.
///
/// `distribute`/`distribute_replacement` move content to the runtime
/// while a plan is being built; `execute_plan` submits the finished plan
/// and resolves when the runtime has applied it. The scanner treats any
/// `Ok` report as "plan accepted" — per-action failure policy is the
/// implementation's concern.
#[async_trait]
pub trait DeploymentManager: Send + Sync {
    /// Upload content for a fresh deployment. Implementations reject
    /// names the runtime already knows with [`StageError::DuplicateName`].
    async fn distribute(
        &self,
        name: &DeploymentName,
        content: &ContentSummary,
    ) -> Result<(), StageError>;

    /// Upload replacement content for an existing deployment.
    async fn distribute_replacement(
        &self,
        name: &DeploymentName,
        content: &ContentSummary,
    ) -> Result<(), StageError>;

    /// Submit a plan and await the runtime's result. This is the one
    /// long-blocking await in a scan cycle.
    async fn execute_plan(&self, plan: DeploymentPlan) -> Result<PlanReport, ExecuteError>;
}
