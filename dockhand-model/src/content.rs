use std::path::PathBuf;

/// Summary of one content file staged for hand-off to the runtime.
///
/// The digest is the hex-encoded SHA-256 of the file bytes at the time
/// the scanner read them; the runtime can use it to verify or
/// content-address the upload. The source path is where the bytes came
/// from and is only meaningful on the scanner's host.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentSummary {
    /// Path of the content file as observed by the scanner.
    pub source: PathBuf,
    /// Hex-encoded SHA-256 digest of the content bytes.
    pub digest: String,
    /// Content size in bytes.
    pub size: u64,
}

impl ContentSummary {
    /// Build a summary from its parts.
    pub fn new(source: impl Into<PathBuf>, digest: impl Into<String>, size: u64) -> Self {
        Self {
            source: source.into(),
            digest: digest.into(),
            size,
        }
    }
}
