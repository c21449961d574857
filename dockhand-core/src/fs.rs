//! Minimal async filesystem abstraction used by the scanner.
//!
//! The real implementation is a thin shim over `tokio::fs`; the
//! in-memory implementation exists for unit tests and supports per-path
//! failure injection so individual content items can be made to fail
//! while the rest of a scan proceeds.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;

/// Lightweight metadata needed by the scanner.
#[derive(Debug, Clone, Copy)]
pub struct FsMetadata {
    /// Entry is a directory.
    pub is_dir: bool,
    /// Entry is a regular file.
    pub is_file: bool,
    /// Size in bytes (0 for directories).
    pub len: u64,
    /// Entry carries a read-only permission bit.
    pub readonly: bool,
    /// Last modified time if available.
    pub modified: Option<SystemTime>,
}

/// Async directory iterator (similar to `tokio::fs::ReadDir`).
#[async_trait]
pub trait ReadDirStream {
    /// Return the next entry's path, or `None` when exhausted.
    async fn next_entry(&mut self) -> io::Result<Option<PathBuf>>;
}

/// Async-capable filesystem abstraction.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Check whether a path exists.
    async fn path_exists(&self, path: &Path) -> bool;

    /// Fetch lightweight metadata for a path.
    async fn metadata(&self, path: &Path) -> io::Result<FsMetadata>;

    /// Open a directory for iteration.
    async fn read_dir(&self, path: &Path) -> io::Result<Box<dyn ReadDirStream + Send>>;

    /// Read a file's bytes.
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Read a file as UTF-8 text.
    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Create or overwrite a file with the given bytes.
    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Delete a file.
    async fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// Real filesystem backed by `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// A new real-filesystem handle.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for RealFs {
    async fn path_exists(&self, path: &Path) -> bool {
        // try_exists maps permission problems to false rather than error
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn metadata(&self, path: &Path) -> io::Result<FsMetadata> {
        let md = tokio::fs::metadata(path).await?;
        Ok(FsMetadata {
            is_dir: md.is_dir(),
            is_file: md.is_file(),
            len: md.len(),
            readonly: md.permissions().readonly(),
            modified: md.modified().ok(),
        })
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Box<dyn ReadDirStream + Send>> {
        let rd = tokio::fs::read_dir(path).await?;
        Ok(Box::new(RealReadDir { inner: rd }))
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

struct RealReadDir {
    inner: tokio::fs::ReadDir,
}

#[async_trait]
impl ReadDirStream for RealReadDir {
    async fn next_entry(&mut self) -> io::Result<Option<PathBuf>> {
        Ok(self.inner.next_entry().await?.map(|entry| entry.path()))
    }
}

#[derive(Clone)]
enum Node {
    Dir,
    File { contents: Vec<u8> },
}

#[derive(Default)]
struct InMemoryState {
    nodes: HashMap<PathBuf, Node>,
    fail_reads: HashSet<PathBuf>,
    fail_writes: HashSet<PathBuf>,
    fail_removes: HashSet<PathBuf>,
}

/// In-memory filesystem for tests.
///
/// Paths are treated literally; callers should use consistent absolute
/// paths. Cloning shares the underlying state, so a test can keep a
/// handle for assertions while the scanner mutates the tree.
#[derive(Default, Clone)]
pub struct InMemoryFs {
    state: Arc<Mutex<InMemoryState>>,
}

impl std::fmt::Debug for InMemoryFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().expect("fs state poisoned");
        f.debug_struct("InMemoryFs")
            .field("entries", &state.nodes.len())
            .finish()
    }
}

impl InMemoryFs {
    /// An empty in-memory tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory (parents are created implicitly).
    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut state = self.state.lock().expect("fs state poisoned");
        ensure_parents(&mut state.nodes, &path);
        state.nodes.entry(path).or_insert(Node::Dir);
    }

    /// Add a file with the given contents (parents are created implicitly).
    pub fn add_file(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        let path = path.into();
        let mut state = self.state.lock().expect("fs state poisoned");
        ensure_parents(&mut state.nodes, &path);
        state.nodes.insert(
            path,
            Node::File {
                contents: contents.into(),
            },
        );
    }

    /// Make subsequent reads of `path` fail with a permission error.
    pub fn fail_reads_for(&self, path: impl Into<PathBuf>) {
        let mut state = self.state.lock().expect("fs state poisoned");
        state.fail_reads.insert(path.into());
    }

    /// Make subsequent writes of `path` fail with a permission error.
    pub fn fail_writes_for(&self, path: impl Into<PathBuf>) {
        let mut state = self.state.lock().expect("fs state poisoned");
        state.fail_writes.insert(path.into());
    }

    /// Make subsequent removals of `path` fail with a permission error.
    pub fn fail_removes_for(&self, path: impl Into<PathBuf>) {
        let mut state = self.state.lock().expect("fs state poisoned");
        state.fail_removes.insert(path.into());
    }

    /// Stop failing removals of `path`.
    pub fn allow_removes_for(&self, path: &Path) {
        let mut state = self.state.lock().expect("fs state poisoned");
        state.fail_removes.remove(path);
    }

    /// Whether the tree currently holds `path`.
    pub fn contains(&self, path: &Path) -> bool {
        let state = self.state.lock().expect("fs state poisoned");
        state.nodes.contains_key(path)
    }

    /// Current contents of a file, if present.
    pub fn file_contents(&self, path: &Path) -> Option<Vec<u8>> {
        let state = self.state.lock().expect("fs state poisoned");
        match state.nodes.get(path) {
            Some(Node::File { contents }) => Some(contents.clone()),
            _ => None,
        }
    }
}

fn ensure_parents(nodes: &mut HashMap<PathBuf, Node>, path: &Path) {
    let mut current = path.parent();
    while let Some(parent) = current {
        if parent.as_os_str().is_empty() {
            break;
        }
        nodes.entry(parent.to_path_buf()).or_insert(Node::Dir);
        current = parent.parent();
    }
}

fn denied(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("injected failure: {}", path.display()),
    )
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such entry: {}", path.display()),
    )
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn path_exists(&self, path: &Path) -> bool {
        self.contains(path)
    }

    async fn metadata(&self, path: &Path) -> io::Result<FsMetadata> {
        let state = self.state.lock().expect("fs state poisoned");
        match state.nodes.get(path) {
            Some(Node::Dir) => Ok(FsMetadata {
                is_dir: true,
                is_file: false,
                len: 0,
                readonly: false,
                modified: None,
            }),
            Some(Node::File { contents }) => Ok(FsMetadata {
                is_dir: false,
                is_file: true,
                len: contents.len() as u64,
                readonly: false,
                modified: None,
            }),
            None => Err(not_found(path)),
        }
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Box<dyn ReadDirStream + Send>> {
        let state = self.state.lock().expect("fs state poisoned");
        match state.nodes.get(path) {
            Some(Node::Dir) => {
                let mut children: Vec<PathBuf> = state
                    .nodes
                    .keys()
                    .filter(|p| p.parent() == Some(path))
                    .cloned()
                    .collect();
                // Stable order keeps unit test expectations deterministic;
                // the scanner itself makes no ordering assumptions.
                children.sort();
                Ok(Box::new(InMemReadDir {
                    queue: children.into(),
                }))
            }
            Some(Node::File { .. }) => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("not a directory: {}", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let state = self.state.lock().expect("fs state poisoned");
        if state.fail_reads.contains(path) {
            return Err(denied(path));
        }
        match state.nodes.get(path) {
            Some(Node::File { contents }) => Ok(contents.clone()),
            Some(Node::Dir) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock().expect("fs state poisoned");
        if state.fail_writes.contains(path) {
            return Err(denied(path));
        }
        ensure_parents(&mut state.nodes, path);
        state.nodes.insert(
            path.to_path_buf(),
            Node::File {
                contents: contents.to_vec(),
            },
        );
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state.lock().expect("fs state poisoned");
        if state.fail_removes.contains(path) {
            return Err(denied(path));
        }
        match state.nodes.get(path) {
            Some(Node::File { .. }) => {
                state.nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }
}

struct InMemReadDir {
    queue: VecDeque<PathBuf>,
}

#[async_trait]
impl ReadDirStream for InMemReadDir {
    async fn next_entry(&mut self) -> io::Result<Option<PathBuf>> {
        Ok(self.queue.pop_front())
    }
}
