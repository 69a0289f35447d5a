//! Schema identity: version triples, keys, match types and document generations.

use std::cmp::Ordering;
use std::fmt;

// ============================================================================
// SCHEMA VERSION
// ============================================================================

/// A `read.write.minor` version triple.
///
/// A bump of `read` breaks readers, a bump of `write` breaks writers, and
/// `minor` changes are additive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SchemaVersion {
    pub read: u32,
    pub write: u32,
    pub minor: u32,
}

impl SchemaVersion {
    pub const fn new(read: u32, write: u32, minor: u32) -> Self {
        Self { read, write, minor }
    }

    /// Parse `RR.WW.MM` or the legacy two-part `RR.MM` form.
    ///
    /// The two-part form carries no write version, so `write` is zero.
    pub fn parse(text: &str) -> Option<Self> {
        let parts: Vec<&str> = text.trim().split('.').collect();
        let num = |s: &str| s.trim().parse::<u32>().ok();
        match parts.as_slice() {
            [read, minor] => Some(Self::new(num(read)?, 0, num(minor)?)),
            [read, write, minor] => Some(Self::new(num(read)?, num(write)?, num(minor)?)),
            _ => None,
        }
    }

    /// Legacy two-part rendering (`RR.MM`) used by 2.0 documents.
    pub fn to_legacy_string(&self) -> String {
        format!("{:02}.{:02}", self.read, self.minor)
    }
}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.read, self.write, self.minor).cmp(&(other.read, other.write, other.minor))
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}.{:02}.{:02}", self.read, self.write, self.minor)
    }
}

// ============================================================================
// MATCH TYPES
// ============================================================================

/// How a located schema's key must relate to the requested key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SchemaMatchType {
    /// Name, full version and checksum (when both sides carry one) are equal.
    Identical,
    /// Name and full version are equal.
    #[default]
    Exact,
    /// Same read and write version; minor may be equal or newer.
    LatestWriteCompatible,
    /// Same read version; write/minor may be equal or newer.
    LatestReadCompatible,
    /// Any version with the same name.
    Latest,
}

// ============================================================================
// SCHEMA KEY
// ============================================================================

/// Identity of a schema: name plus version, with an optional checksum.
#[derive(Clone, Debug)]
pub struct SchemaKey {
    pub name: String,
    pub version: SchemaVersion,
    pub checksum: Option<String>,
}

impl SchemaKey {
    pub fn new(name: impl Into<String>, read: u32, write: u32, minor: u32) -> Self {
        Self {
            name: name.into(),
            version: SchemaVersion::new(read, write, minor),
            checksum: None,
        }
    }

    pub fn from_version(name: impl Into<String>, version: SchemaVersion) -> Self {
        Self {
            name: name.into(),
            version,
            checksum: None,
        }
    }

    /// `Name.RR.WW.MM`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.name, self.version)
    }

    /// `Name.RR.MM`, the form 2.0 documents use for custom attribute namespaces.
    pub fn legacy_full_name(&self) -> String {
        format!("{}.{}", self.name, self.version.to_legacy_string())
    }

    /// Parse `Name.RR.WW.MM` or `Name.RR.MM`.
    pub fn parse_full_name(text: &str) -> Option<Self> {
        let (name, version) = text.split_once('.')?;
        if name.is_empty() {
            return None;
        }
        Some(Self::from_version(name, SchemaVersion::parse(version)?))
    }

    /// True when `self` satisfies a request for `desired` under `match_type`.
    pub fn matches(&self, desired: &SchemaKey, match_type: SchemaMatchType) -> bool {
        if !self.name.eq_ignore_ascii_case(&desired.name) {
            return false;
        }
        let (have, want) = (self.version, desired.version);
        match match_type {
            SchemaMatchType::Identical => {
                have == want
                    && match (&self.checksum, &desired.checksum) {
                        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                        _ => true,
                    }
            }
            SchemaMatchType::Exact => have == want,
            SchemaMatchType::LatestWriteCompatible => {
                have.read == want.read && have.write == want.write && have.minor >= want.minor
            }
            SchemaMatchType::LatestReadCompatible => {
                have.read == want.read && (have.write, have.minor) >= (want.write, want.minor)
            }
            SchemaMatchType::Latest => true,
        }
    }
}

impl PartialEq for SchemaKey {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && self.version == other.version
    }
}

impl Eq for SchemaKey {}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

// ============================================================================
// DOCUMENT GENERATIONS
// ============================================================================

/// EC document format generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EcVersion {
    V2_0,
    V3_0,
    V3_1,
    #[default]
    V3_2,
}

/// XML namespace URIs per generation.
pub mod namespace {
    pub const EC_2_0: &str = "http://www.bentley.com/schemas/Bentley.ECXML.2.0";
    pub const EC_3_0: &str = "http://www.bentley.com/schemas/Bentley.ECXML.3.0";
    pub const EC_3_1: &str = "http://www.bentley.com/schemas/Bentley.ECXML.3.1";
    pub const EC_3_2: &str = "http://www.bentley.com/schemas/Bentley.ECXML.3.2";
}

impl EcVersion {
    pub const LATEST: Self = Self::V3_2;

    pub fn namespace(self) -> &'static str {
        match self {
            Self::V2_0 => namespace::EC_2_0,
            Self::V3_0 => namespace::EC_3_0,
            Self::V3_1 => namespace::EC_3_1,
            Self::V3_2 => namespace::EC_3_2,
        }
    }

    pub fn from_namespace(ns: &str) -> Option<Self> {
        match ns.trim() {
            namespace::EC_2_0 => Some(Self::V2_0),
            namespace::EC_3_0 => Some(Self::V3_0),
            namespace::EC_3_1 => Some(Self::V3_1),
            namespace::EC_3_2 => Some(Self::V3_2),
            _ => None,
        }
    }

    /// `(major, minor)` as written in version attributes.
    pub fn numbers(self) -> (u32, u32) {
        match self {
            Self::V2_0 => (2, 0),
            Self::V3_0 => (3, 0),
            Self::V3_1 => (3, 1),
            Self::V3_2 => (3, 2),
        }
    }

    pub fn is_ec3(self) -> bool {
        self >= Self::V3_0
    }

    /// Units, Formats and Phenomena are first-class items from 3.2 onward.
    pub fn supports_units(self) -> bool {
        self >= Self::V3_2
    }
}

impl fmt::Display for EcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor) = self.numbers();
        write!(f, "{major}.{minor}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("01.00.01", Some(SchemaVersion::new(1, 0, 1)))]
    #[case("1.2.3", Some(SchemaVersion::new(1, 2, 3)))]
    #[case("09.06", Some(SchemaVersion::new(9, 0, 6)))]
    #[case("1", None)]
    #[case("a.b.c", None)]
    #[case("1.2.3.4", None)]
    fn test_version_parse(#[case] text: &str, #[case] expected: Option<SchemaVersion>) {
        assert_eq!(SchemaVersion::parse(text), expected);
    }

    #[test]
    fn test_version_display_is_zero_padded() {
        assert_eq!(SchemaVersion::new(1, 0, 1).to_string(), "01.00.01");
        assert_eq!(SchemaVersion::new(9, 0, 6).to_legacy_string(), "09.06");
    }

    #[rstest]
    // exact
    #[case((1, 0, 0), (1, 0, 0), SchemaMatchType::Exact, true)]
    #[case((1, 0, 1), (1, 0, 0), SchemaMatchType::Exact, false)]
    // write compatible
    #[case((1, 0, 5), (1, 0, 2), SchemaMatchType::LatestWriteCompatible, true)]
    #[case((1, 0, 1), (1, 0, 2), SchemaMatchType::LatestWriteCompatible, false)]
    #[case((1, 1, 0), (1, 0, 2), SchemaMatchType::LatestWriteCompatible, false)]
    // read compatible
    #[case((1, 1, 0), (1, 0, 2), SchemaMatchType::LatestReadCompatible, true)]
    #[case((1, 0, 2), (1, 0, 2), SchemaMatchType::LatestReadCompatible, true)]
    #[case((1, 0, 1), (1, 0, 2), SchemaMatchType::LatestReadCompatible, false)]
    #[case((2, 0, 0), (1, 0, 0), SchemaMatchType::LatestReadCompatible, false)]
    // latest
    #[case((9, 9, 9), (1, 0, 0), SchemaMatchType::Latest, true)]
    fn test_key_matches(
        #[case] have: (u32, u32, u32),
        #[case] want: (u32, u32, u32),
        #[case] match_type: SchemaMatchType,
        #[case] expected: bool,
    ) {
        let have = SchemaKey::new("Units", have.0, have.1, have.2);
        let want = SchemaKey::new("units", want.0, want.1, want.2);
        assert_eq!(have.matches(&want, match_type), expected);
    }

    #[test]
    fn test_key_never_matches_other_name() {
        let have = SchemaKey::new("Units", 1, 0, 0);
        let want = SchemaKey::new("Formats", 1, 0, 0);
        assert!(!have.matches(&want, SchemaMatchType::Latest));
    }

    #[test]
    fn test_parse_full_name() {
        let key = SchemaKey::parse_full_name("BaseElementSchema.01.00").unwrap();
        assert_eq!(key.name, "BaseElementSchema");
        assert_eq!(key.version, SchemaVersion::new(1, 0, 0));

        let key = SchemaKey::parse_full_name("ECv3ConversionAttributes.01.00.01").unwrap();
        assert_eq!(key.version, SchemaVersion::new(1, 0, 1));
        assert_eq!(key.full_name(), "ECv3ConversionAttributes.01.00.01");
    }

    #[test]
    fn test_ec_version_namespace_roundtrip() {
        for v in [EcVersion::V2_0, EcVersion::V3_0, EcVersion::V3_1, EcVersion::V3_2] {
            assert_eq!(EcVersion::from_namespace(v.namespace()), Some(v));
        }
        assert!(EcVersion::V3_1.is_ec3());
        assert!(!EcVersion::V2_0.is_ec3());
        assert!(!EcVersion::V3_1.supports_units());
    }
}
