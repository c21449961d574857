use std::borrow::Borrow;
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;

/// Identity of one deployment, derived from the content file's name.
///
/// Within a deployed set no two entries, content or marker, may share a
/// name. The name is the final path component of the dropped content
/// file, kept verbatim (`app.war`, `datasource.rar`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DeploymentName(String);

impl DeploymentName {
    /// Wrap an already-derived name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive the deployment name from a content path's final component.
    ///
    /// Returns `None` for paths without a representable file name
    /// (e.g. `..` or a root).
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name().and_then(Self::from_file_name)
    }

    /// Derive the deployment name from a raw file name.
    pub fn from_file_name(file_name: &OsStr) -> Option<Self> {
        file_name.to_str().map(|s| Self(s.to_owned()))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeploymentName {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Borrow<str> for DeploymentName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DeploymentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn derives_from_final_path_component() {
        let name = DeploymentName::from_path(Path::new("/deployments/sub/app.war")).unwrap();
        assert_eq!(name.as_str(), "app.war");
    }

    #[test]
    fn rejects_paths_without_a_file_name() {
        assert!(DeploymentName::from_path(Path::new("/")).is_none());
        assert!(DeploymentName::from_path(Path::new("a/..")).is_none());
    }

    #[test]
    fn borrow_allows_str_lookups() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(DeploymentName::from("app.war"));
        assert!(set.contains("app.war"));
    }

    #[test]
    fn display_is_verbatim() {
        let name = DeploymentName::from_path(&PathBuf::from("ds.rar")).unwrap();
        assert_eq!(name.to_string(), "ds.rar");
    }
}
