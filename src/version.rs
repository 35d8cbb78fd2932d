//! Schema version tags
//!
//! Bundle files carry versions as `vMAJOR_MINOR_PATCH` (`Power.v1_7_6.json`),
//! declarations may spell them `1.7.6` or `v1_7_6`. Ordering follows semver.

use semver::Version;
use std::cmp::Ordering;
use std::fmt;

/// A schema version as it appears in bundle file names
#[derive(Debug, Clone)]
pub struct SchemaVersion {
    /// Normalized tag, e.g. `v1_7_6`
    tag: String,
    /// Parsed numeric version used for ordering
    version: Version,
}

impl SchemaVersion {
    /// Parse any of `v1_7_6`, `1_7_6`, `1.7.6`, `v1.7`.
    ///
    /// Returns `None` when the tag carries non-numeric parts.
    pub fn parse(raw: &str) -> Option<Self> {
        let tag = normalize_tag(raw);
        let digits = tag.strip_prefix('v')?;
        let mut parts = digits.split('_').map(|p| p.parse::<u64>());
        let major = parts.next()?.ok()?;
        let minor = match parts.next() {
            Some(p) => p.ok()?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(p) => p.ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            tag,
            version: Version::new(major, minor, patch),
        })
    }

    /// Version from a file stem like `Power.v1_7_6`
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let (_, version) = stem.split_once('.')?;
        Self::parse(version)
    }

    /// The tag string (e.g. `v1_7_6`)
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn major(&self) -> u64 {
        self.version.major
    }

    pub fn minor(&self) -> u64 {
        self.version.minor
    }

    pub fn patch(&self) -> u64 {
        self.version.patch
    }
}

/// Normalize a declared version to the bundle tag form.
///
/// `1.7.6` and `v1.7.6` become `v1_7_6`; already normalized tags pass
/// through unchanged.
pub fn normalize_tag(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('v').unwrap_or(trimmed);
    format!("v{}", digits.replace('.', "_"))
}

/// Split a file stem `Power.v1_7_6` into the schema id and optional tag.
pub fn split_versioned_stem(stem: &str) -> (&str, Option<&str>) {
    match stem.split_once('.') {
        Some((id, version)) => (id, Some(version)),
        None => (stem, None),
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)
    }
}

impl PartialEq for SchemaVersion {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for SchemaVersion {}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        let v = SchemaVersion::parse("v1_7_6").unwrap();
        assert_eq!(v.tag(), "v1_7_6");
        assert_eq!((v.major(), v.minor(), v.patch()), (1, 7, 6));
    }

    #[test]
    fn test_dotted_version_is_normalized() {
        let v = SchemaVersion::parse("1.13.0").unwrap();
        assert_eq!(v.tag(), "v1_13_0");
        assert_eq!(normalize_tag("v1.2"), "v1_2");
    }

    #[test]
    fn test_major_dominates_ordering() {
        let a = SchemaVersion::parse("v1_9_9").unwrap();
        let b = SchemaVersion::parse("v2_0_0").unwrap();
        let c = SchemaVersion::parse("v1_10_0").unwrap();
        assert!(b > a);
        assert!(c > a);
        assert!(b > c);
    }

    #[test]
    fn test_from_file_stem() {
        let v = SchemaVersion::from_file_stem("Power.v1_0_0").unwrap();
        assert_eq!(v.tag(), "v1_0_0");
        assert!(SchemaVersion::from_file_stem("Power").is_none());
        assert!(SchemaVersion::from_file_stem("odata-v4").is_none());
    }

    #[test]
    fn test_split_versioned_stem() {
        assert_eq!(split_versioned_stem("Power.v1_7_6"), ("Power", Some("v1_7_6")));
        assert_eq!(split_versioned_stem("Chassis"), ("Chassis", None));
    }
}
