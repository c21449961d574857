//! Candidate filtering for scanned directory entries.

use std::path::Path;

/// Policy deciding which filesystem entries are deployment candidates
/// at all. Entries the filter rejects are invisible to the scanner:
/// they are neither treated as content nor recursed into.
pub trait ScanFilter: Send + Sync {
    /// True when the entry should be considered by the scanner.
    fn accept(&self, path: &Path) -> bool;
}

/// Accepts every entry. Useful for tests and embedders with their own
/// upstream filtering.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl ScanFilter for AcceptAll {
    fn accept(&self, _path: &Path) -> bool {
        true
    }
}

/// Default filter: skips editor droppings, backup copies, and other
/// junk an operator's tooling tends to leave next to real content.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardFilter;

const JUNK_PREFIXES: &[&str] = &["#", ".", "%"];
const JUNK_SUFFIXES: &[&str] = &["~", ".bak", ".old", ".orig", ".tmp", ".rej", ",v"];

impl ScanFilter for StandardFilter {
    fn accept(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if JUNK_PREFIXES.iter().any(|p| name.starts_with(p)) {
            return false;
        }
        if JUNK_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            return false;
        }
        true
    }
}
