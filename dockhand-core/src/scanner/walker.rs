//! Recursive classification of the watched directory tree.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use dockhand_model::{DeploymentName, DeploymentPlan};
use tracing::{trace, warn};

use super::markers::strip_marker_suffix;
use super::plan_builder::{PlanBuilder, StageOutcome};
use crate::filter::ScanFilter;
use crate::fs::FileSystem;

/// Directory name extensions treated as packaged archives. A directory
/// carrying one of these is an exploded deployment, which the scanner
/// does not process.
const ARCHIVE_EXTENSIONS: &[&str] = &["war", "ear", "jar", "rar", "sar", "mar"];

pub(crate) fn is_archive_name(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ARCHIVE_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

/// One content candidate the plan builder staged this cycle.
#[derive(Debug, Clone)]
pub(crate) struct StagedItem {
    pub(crate) name: DeploymentName,
    pub(crate) path: PathBuf,
}

/// Everything one walk over the tree produced.
#[derive(Default)]
pub(crate) struct ScanAccumulator {
    /// Marker artifacts found, keyed by deployment name.
    pub(crate) markers: HashMap<DeploymentName, PathBuf>,
    /// Content candidates staged into the plan (the newly-handed-off set).
    pub(crate) staged: Vec<StagedItem>,
    /// Content candidates that failed staging and stay on disk.
    pub(crate) failed: usize,
    /// Exploded-archive directories that were skipped.
    pub(crate) exploded: Vec<PathBuf>,
    /// The plan under construction.
    pub(crate) plan: DeploymentPlan,
}

/// Visits the watched tree, classifying every accepted entry and
/// handing content candidates to the plan builder as they are found.
pub(crate) struct DirectoryWalker<'a> {
    fs: &'a dyn FileSystem,
    filter: &'a dyn ScanFilter,
    plan_builder: &'a PlanBuilder,
}

impl<'a> DirectoryWalker<'a> {
    pub(crate) fn new(
        fs: &'a dyn FileSystem,
        filter: &'a dyn ScanFilter,
        plan_builder: &'a PlanBuilder,
    ) -> Self {
        Self {
            fs,
            filter,
            plan_builder,
        }
    }

    /// Walk the tree rooted at `root`. Failing to list the root fails
    /// the cycle; failures below it are logged and skipped.
    pub(crate) async fn walk(&self, root: &Path) -> io::Result<ScanAccumulator> {
        let mut acc = ScanAccumulator::default();
        self.walk_dir(root, &mut acc).await?;
        Ok(acc)
    }

    fn walk_dir<'b>(
        &'b self,
        dir: &'b Path,
        acc: &'b mut ScanAccumulator,
    ) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'b>> {
        Box::pin(async move {
            let mut entries = self.fs.read_dir(dir).await?;

            while let Some(path) = entries.next_entry().await? {
                if !self.filter.accept(&path) {
                    trace!(path = %path.display(), "entry rejected by scan filter");
                    continue;
                }
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    warn!(path = %path.display(), "skipping entry with non-UTF-8 name");
                    continue;
                };

                if let Some(stripped) = strip_marker_suffix(file_name) {
                    acc.markers
                        .insert(DeploymentName::new(stripped), path.clone());
                    continue;
                }

                let metadata = match self.fs.metadata(&path).await {
                    Ok(metadata) => metadata,
                    Err(error) => {
                        warn!(path = %path.display(), %error, "skipping unreadable entry");
                        continue;
                    }
                };

                if metadata.is_dir {
                    if is_archive_name(file_name) {
                        acc.exploded.push(path);
                    } else if let Err(error) = self.walk_dir(&path, acc).await {
                        warn!(
                            path = %path.display(),
                            %error,
                            "failed to scan subdirectory"
                        );
                    }
                    continue;
                }

                // Plain content candidate. The whole decision, including
                // its I/O, completes before the next sibling is visited.
                let name = DeploymentName::new(file_name);
                match self
                    .plan_builder
                    .decide(&name, &path, &mut acc.plan)
                    .await
                {
                    StageOutcome::Staged => acc.staged.push(StagedItem { name, path }),
                    StageOutcome::Failed => acc.failed += 1,
                }
            }
            Ok(())
        })
    }
}

/// Reduced walk used by the startup rebuild: collect markers, recurse
/// into organizational directories, ignore everything else.
pub(crate) async fn collect_markers(
    fs: &dyn FileSystem,
    root: &Path,
) -> io::Result<HashMap<DeploymentName, PathBuf>> {
    let mut markers = HashMap::new();
    collect_markers_in(fs, root, &mut markers).await?;
    Ok(markers)
}

fn collect_markers_in<'a>(
    fs: &'a dyn FileSystem,
    dir: &'a Path,
    markers: &'a mut HashMap<DeploymentName, PathBuf>,
) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = fs.read_dir(dir).await?;
        while let Some(path) = entries.next_entry().await? {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(stripped) = strip_marker_suffix(file_name) {
                markers.insert(DeploymentName::new(stripped), path.clone());
                continue;
            }
            let metadata = match fs.metadata(&path).await {
                Ok(metadata) => metadata,
                Err(_) => continue,
            };
            if metadata.is_dir && !is_archive_name(file_name) {
                collect_markers_in(fs, &path, markers).await?;
            }
        }
        Ok(())
    })
}
