//! The authoritative in-memory set of handed-off deployment names.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

use dockhand_model::DeploymentName;
use tracing::{debug, info, warn};

use super::walker::collect_markers;
use crate::error::Result;
use crate::fs::FileSystem;
use crate::registry::DeploymentRegistry;

/// Immutable-snapshot deployed set: readers clone an `Arc` to the
/// current generation; the scanner swaps in a whole new generation once
/// per cycle. There is no incremental mutation, so a reader can never
/// observe a partially committed set.
pub(crate) struct DeployedSetTracker {
    current: RwLock<Arc<HashSet<DeploymentName>>>,
}

impl DeployedSetTracker {
    pub(crate) fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(HashSet::new())),
        }
    }

    /// The last committed generation.
    pub(crate) fn snapshot(&self) -> Arc<HashSet<DeploymentName>> {
        Arc::clone(&self.current.read().expect("deployed set lock poisoned"))
    }

    /// Commit a new generation wholesale.
    pub(crate) fn replace(&self, next: HashSet<DeploymentName>) {
        *self.current.write().expect("deployed set lock poisoned") = Arc::new(next);
    }

    /// Derive the initial deployed set from the markers on disk,
    /// keeping only names the configuration model confirms. Markers for
    /// unknown names are stale leftovers and are deleted on the spot.
    pub(crate) async fn rebuild_at_startup(
        &self,
        fs: &Arc<dyn FileSystem>,
        registry: &Arc<dyn DeploymentRegistry>,
        root: &Path,
    ) -> Result<()> {
        let markers = collect_markers(fs.as_ref(), root).await?;
        let known = registry.deployment_names().await?;

        let mut recovered = HashSet::new();
        for (name, path) in markers {
            if known.contains(&name) {
                recovered.insert(name);
                continue;
            }
            debug!(
                deployment = %name,
                marker = %path.display(),
                "marker is unknown to the deployment registry; deleting"
            );
            if let Err(error) = fs.remove_file(&path).await {
                warn!(marker = %path.display(), %error, "failed to delete stale marker");
            }
        }

        info!(
            deployments = recovered.len(),
            root = %root.display(),
            "recovered deployed set from markers"
        );
        self.replace(recovered);
        Ok(())
    }
}
