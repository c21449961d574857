//! Deployment marker management.
//!
//! A marker is a sentinel file named `<content>.deployed` sitting next
//! to where the content was dropped. Its existence records "this name
//! was handed off"; its body is the original file name and is purely
//! informational.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dockhand_model::DeploymentName;
use tracing::{debug, warn};

use crate::fs::FileSystem;

/// Suffix appended to a content file name to form its marker name.
pub const MARKER_SUFFIX: &str = ".deployed";

/// Path of the marker recording `content_path`'s hand-off.
pub(crate) fn marker_path(content_path: &Path) -> PathBuf {
    let mut name = content_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(MARKER_SUFFIX);
    content_path.with_file_name(name)
}

/// Strip the marker suffix from a file name, if present.
pub(crate) fn strip_marker_suffix(file_name: &str) -> Option<&str> {
    file_name.strip_suffix(MARKER_SUFFIX)
}

/// Converts handed-off content files into markers and removes markers
/// that no longer correspond to anything known.
pub(crate) struct MarkerManager {
    fs: Arc<dyn FileSystem>,
}

impl MarkerManager {
    pub(crate) fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Record a successful hand-off: write the marker, then delete the
    /// content file. Returns true when both steps held.
    ///
    /// The two steps are not atomic. When the content delete fails the
    /// marker is rolled back so content and marker do not coexist
    /// indefinitely; a failed rollback is left for the next cycle's
    /// prune to resolve.
    pub(crate) async fn commit(&self, name: &DeploymentName, content_path: &Path) -> bool {
        let marker = marker_path(content_path);
        let payload = content_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.as_str().to_owned());

        if let Err(error) = self.fs.write(&marker, payload.as_bytes()).await {
            warn!(
                deployment = %name,
                marker = %marker.display(),
                %error,
                "failed to write deployment marker"
            );
            return false;
        }

        if let Err(error) = self.fs.remove_file(content_path).await {
            warn!(
                deployment = %name,
                content = %content_path.display(),
                %error,
                "failed to remove handed-off content; rolling back marker"
            );
            if let Err(rollback) = self.fs.remove_file(&marker).await {
                warn!(
                    deployment = %name,
                    marker = %marker.display(),
                    error = %rollback,
                    "marker rollback failed; next scan will prune it"
                );
            }
            return false;
        }

        debug!(deployment = %name, marker = %marker.display(), "content converted to marker");
        true
    }

    /// Delete markers that belong to neither the previous deployed set
    /// nor this cycle's freshly staged names, returning the names whose
    /// markers survive.
    pub(crate) async fn prune(
        &self,
        markers: &HashMap<DeploymentName, PathBuf>,
        known: &HashSet<DeploymentName>,
        newly: &HashSet<DeploymentName>,
    ) -> HashSet<DeploymentName> {
        let mut valid = HashSet::new();
        for (name, path) in markers {
            if known.contains(name) || newly.contains(name) {
                valid.insert(name.clone());
                continue;
            }
            match self.fs.remove_file(path).await {
                Ok(()) => {
                    debug!(deployment = %name, marker = %path.display(), "pruned spurious marker")
                }
                Err(error) => warn!(
                    deployment = %name,
                    marker = %path.display(),
                    %error,
                    "failed to prune spurious marker"
                ),
            }
        }
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    fn manager(fs: &InMemoryFs) -> MarkerManager {
        MarkerManager::new(Arc::new(fs.clone()))
    }

    #[test]
    fn marker_path_is_sibling_with_suffix() {
        assert_eq!(
            marker_path(Path::new("/d/sub/app.war")),
            PathBuf::from("/d/sub/app.war.deployed")
        );
    }

    #[test]
    fn strip_marker_suffix_round_trips() {
        assert_eq!(strip_marker_suffix("app.war.deployed"), Some("app.war"));
        assert_eq!(strip_marker_suffix("app.war"), None);
    }

    #[tokio::test]
    async fn commit_replaces_content_with_marker() {
        let fs = InMemoryFs::new();
        fs.add_file("/d/app.war", b"bytes".to_vec());

        let ok = manager(&fs)
            .commit(&"app.war".into(), Path::new("/d/app.war"))
            .await;

        assert!(ok);
        assert!(!fs.contains(Path::new("/d/app.war")));
        assert_eq!(
            fs.file_contents(Path::new("/d/app.war.deployed")).unwrap(),
            b"app.war"
        );
    }

    #[tokio::test]
    async fn commit_rolls_marker_back_when_delete_fails() {
        let fs = InMemoryFs::new();
        fs.add_file("/d/app.war", b"bytes".to_vec());
        fs.fail_removes_for("/d/app.war");

        let ok = manager(&fs)
            .commit(&"app.war".into(), Path::new("/d/app.war"))
            .await;

        assert!(!ok);
        assert!(fs.contains(Path::new("/d/app.war")));
        assert!(!fs.contains(Path::new("/d/app.war.deployed")));
    }

    #[tokio::test]
    async fn commit_reports_failure_when_marker_write_fails() {
        let fs = InMemoryFs::new();
        fs.add_file("/d/app.war", b"bytes".to_vec());
        fs.fail_writes_for("/d/app.war.deployed");

        let ok = manager(&fs)
            .commit(&"app.war".into(), Path::new("/d/app.war"))
            .await;

        assert!(!ok);
        assert!(fs.contains(Path::new("/d/app.war")));
    }

    #[tokio::test]
    async fn prune_deletes_only_spurious_markers() {
        let fs = InMemoryFs::new();
        fs.add_file("/d/known.war.deployed", b"known.war".to_vec());
        fs.add_file("/d/fresh.war.deployed", b"fresh.war".to_vec());
        fs.add_file("/d/stale.war.deployed", b"stale.war".to_vec());

        let markers = HashMap::from([
            ("known.war".into(), PathBuf::from("/d/known.war.deployed")),
            ("fresh.war".into(), PathBuf::from("/d/fresh.war.deployed")),
            ("stale.war".into(), PathBuf::from("/d/stale.war.deployed")),
        ]);
        let known = HashSet::from(["known.war".into()]);
        let newly = HashSet::from(["fresh.war".into()]);

        let valid = manager(&fs).prune(&markers, &known, &newly).await;

        assert_eq!(valid, HashSet::from(["known.war".into(), "fresh.war".into()]));
        assert!(fs.contains(Path::new("/d/known.war.deployed")));
        assert!(fs.contains(Path::new("/d/fresh.war.deployed")));
        assert!(!fs.contains(Path::new("/d/stale.war.deployed")));
    }

    #[tokio::test]
    async fn prune_excludes_marker_even_when_delete_fails() {
        let fs = InMemoryFs::new();
        fs.add_file("/d/stale.war.deployed", b"stale.war".to_vec());
        fs.fail_removes_for("/d/stale.war.deployed");

        let markers = HashMap::from([(
            DeploymentName::from("stale.war"),
            PathBuf::from("/d/stale.war.deployed"),
        )]);

        let valid = manager(&fs)
            .prune(&markers, &HashSet::new(), &HashSet::new())
            .await;

        assert!(valid.is_empty());
        assert!(fs.contains(Path::new("/d/stale.war.deployed")));
    }
}
