//! Per-item deployment decisions.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dockhand_model::{ContentSummary, DeploymentName, DeploymentPlan};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::manager::{DeploymentManager, StageError};
use crate::registry::DeploymentRegistry;

/// Result of deciding one content candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StageOutcome {
    /// Actions were staged; the item joins the newly-handed-off set.
    Staged,
    /// The item could not be staged; its file is left untouched and the
    /// next cycle retries it.
    Failed,
}

/// Decides, per content candidate, which actions belong in the plan,
/// and appends the removal side of the diff after a full walk.
pub(crate) struct PlanBuilder {
    fs: Arc<dyn FileSystem>,
    registry: Arc<dyn DeploymentRegistry>,
    manager: Arc<dyn DeploymentManager>,
}

impl PlanBuilder {
    pub(crate) fn new(
        fs: Arc<dyn FileSystem>,
        registry: Arc<dyn DeploymentRegistry>,
        manager: Arc<dyn DeploymentManager>,
    ) -> Self {
        Self {
            fs,
            registry,
            manager,
        }
    }

    /// Decide what to do with one content candidate and stage the
    /// outcome into `plan`. All failures are contained to this item.
    pub(crate) async fn decide(
        &self,
        name: &DeploymentName,
        path: &Path,
        plan: &mut DeploymentPlan,
    ) -> StageOutcome {
        let content = match self.summarize(path).await {
            Ok(content) => content,
            Err(error) => {
                warn!(
                    deployment = %name,
                    content = %path.display(),
                    %error,
                    "failed to read deployment content; will retry next scan"
                );
                return StageOutcome::Failed;
            }
        };

        let registered = match self.registry.find_deployment(name).await {
            Ok(registered) => registered,
            Err(error) => {
                warn!(
                    deployment = %name,
                    %error,
                    "deployment registry lookup failed; will retry next scan"
                );
                return StageOutcome::Failed;
            }
        };

        match registered {
            None => match self.manager.distribute(name, &content).await {
                Ok(()) => {
                    debug!(deployment = %name, "staging fresh deployment");
                    plan.add_and_deploy(name.clone(), content);
                    StageOutcome::Staged
                }
                Err(StageError::DuplicateName(_)) => {
                    warn!(
                        deployment = %name,
                        "deployment already exists on the runtime; retrying as replacement"
                    );
                    self.stage_replacement(name, content, plan).await
                }
                Err(error) => {
                    warn!(
                        deployment = %name,
                        %error,
                        "failed to distribute deployment content; will retry next scan"
                    );
                    StageOutcome::Failed
                }
            },
            Some(registered) if registered.started => {
                debug!(deployment = %name, "staging content replacement");
                self.stage_replacement(name, content, plan).await
            }
            Some(_) => {
                // Registered but stopped. A plain replace would keep the
                // stopped state and never deploy the new content, so the
                // stale entry is removed and the content added fresh.
                match self.manager.distribute_replacement(name, &content).await {
                    Ok(()) => {
                        debug!(
                            deployment = %name,
                            "staging remove of stopped deployment followed by fresh add"
                        );
                        plan.remove_then_add(name.clone(), content);
                        StageOutcome::Staged
                    }
                    Err(error) => {
                        warn!(
                            deployment = %name,
                            %error,
                            "failed to distribute replacement content; will retry next scan"
                        );
                        StageOutcome::Failed
                    }
                }
            }
        }
    }

    async fn stage_replacement(
        &self,
        name: &DeploymentName,
        content: ContentSummary,
        plan: &mut DeploymentPlan,
    ) -> StageOutcome {
        match self.manager.distribute_replacement(name, &content).await {
            Ok(()) => {
                plan.replace(name.clone(), content);
                StageOutcome::Staged
            }
            Err(error) => {
                warn!(
                    deployment = %name,
                    %error,
                    "failed to distribute replacement content; will retry next scan"
                );
                StageOutcome::Failed
            }
        }
    }

    /// Stage undeploy+remove for every name in the deployed set that the
    /// walk saw neither a marker nor fresh content for. Names are staged
    /// in sorted order so plans are deterministic.
    pub(crate) fn stage_removals(
        &self,
        plan: &mut DeploymentPlan,
        deployed: &HashSet<DeploymentName>,
        markers: &HashMap<DeploymentName, PathBuf>,
        staged: &HashSet<DeploymentName>,
    ) -> usize {
        let mut missing: Vec<&DeploymentName> = deployed
            .iter()
            .filter(|name| !markers.contains_key(*name) && !staged.contains(*name))
            .collect();
        missing.sort();

        for name in &missing {
            debug!(deployment = %name, "content gone; staging undeploy and remove");
            plan.undeploy_and_remove((*name).clone());
        }
        missing.len()
    }

    async fn summarize(&self, path: &Path) -> io::Result<ContentSummary> {
        let bytes = self.fs.read(path).await?;
        let digest = Sha256::digest(&bytes);
        Ok(ContentSummary::new(
            path,
            hex::encode(digest),
            bytes.len() as u64,
        ))
    }
}
