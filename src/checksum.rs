//! Checksums over emitted artifacts
//!
//! Every file written into the deployment tree is recorded so the run can
//! finish with a `checksums.sha256` listing.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// SHA256 checksum of file content
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(data)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Writes artifacts under a root directory and remembers their checksums
#[derive(Debug)]
pub struct ArtifactWriter {
    root: PathBuf,
    written: Vec<(PathBuf, Checksum)>,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `content` at `relative` (parents are created).
    pub fn write(&mut self, relative: impl AsRef<Path>, content: &[u8]) -> Result<PathBuf> {
        let relative = relative.as_ref();
        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, content)?;
        self.record(relative, content);
        Ok(target)
    }

    /// Copy a source file to `relative`, preserving its bytes.
    pub fn copy(&mut self, source: &Path, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let content = fs::read(source)?;
        self.write(relative, &content)
    }

    fn record(&mut self, relative: &Path, content: &[u8]) {
        let checksum = Checksum::from_bytes(content);
        match self.written.iter_mut().find(|(p, _)| p == relative) {
            Some(entry) => entry.1 = checksum,
            None => self.written.push((relative.to_path_buf(), checksum)),
        }
    }

    pub fn written(&self) -> &[(PathBuf, Checksum)] {
        &self.written
    }

    /// Render the `sha256sum`-compatible listing, sorted by path.
    pub fn listing(&self) -> String {
        let mut lines: Vec<String> = self
            .written
            .iter()
            .map(|(path, sum)| format!("{}  {}", sum, path.to_string_lossy()))
            .collect();
        lines.sort_by(|a, b| a[66..].cmp(&b[66..]));
        lines.join("\n")
    }

    /// Write the listing to `checksums.sha256` at the root.
    pub fn finish(self) -> Result<PathBuf> {
        let target = self.root.join("checksums.sha256");
        fs::create_dir_all(&self.root)?;
        fs::write(&target, self.listing())?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_checksum_consistency() {
        let a = Checksum::from_bytes(b"{\"Id\": \"Chassis\"}");
        let b = Checksum::from_bytes(b"{\"Id\": \"Chassis\"}");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert_ne!(a, Checksum::from_bytes(b"{}"));
    }

    #[test]
    fn test_rewrite_replaces_recorded_checksum() {
        let dir = tempdir().unwrap();
        let mut writer = ArtifactWriter::new(dir.path());
        writer.write("redfish/v1/index.json", b"first").unwrap();
        writer.write("redfish/v1/index.json", b"second").unwrap();
        assert_eq!(writer.written().len(), 1);
        assert_eq!(writer.written()[0].1, Checksum::from_bytes(b"second"));
    }

    #[test]
    fn test_listing_is_sorted_by_path() {
        let dir = tempdir().unwrap();
        let mut writer = ArtifactWriter::new(dir.path());
        writer.write("b.json", b"b").unwrap();
        writer.write("a.json", b"a").unwrap();
        let listing = writer.listing();
        let paths: Vec<&str> = listing.lines().map(|l| &l[66..]).collect();
        assert_eq!(paths, vec!["a.json", "b.json"]);
        let target = writer.finish().unwrap();
        assert!(target.ends_with("checksums.sha256"));
    }
}
