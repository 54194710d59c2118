//! Server version parsing and comparison
//!
//! The platform reports its revision in several shapes ("2.41", "2.40.3.1",
//! "2.39-SNAPSHOT"). Everything past the (major, minor, patch) triple is
//! display-only and never participates in ordering.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Comparable server version parsed from a raw version string
///
/// Ordering is lexicographic on `(major, minor, patch)`. The suffix keeps
/// whatever trailed the triple in the raw string (a `-SNAPSHOT` tag, a
/// fourth numeric segment) so the original form can be displayed, but it is
/// excluded from comparison and equality.
#[derive(Debug, Clone)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub suffix: Option<String>,
}

impl ApiVersion {
    /// Create a version with no suffix
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            suffix: None,
        }
    }

    /// Parse a raw version string
    ///
    /// Accepts a numeric major segment, optional minor and patch segments
    /// (defaulting to 0), extra numeric segments (folded into the display
    /// suffix), and a trailing `-TAG`. An optional leading `v` is stripped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when no numeric major segment is found or a
    /// present minor/patch segment is not a number.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let (numeric, mut suffix) = match stripped.find('-') {
            Some(pos) => (&stripped[..pos], Some(stripped[pos..].to_string())),
            None => (stripped, None),
        };

        let mut segments = numeric.split('.');
        let major = segments
            .next()
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| parse_error(raw, "no numeric major segment"))?;
        let minor = parse_segment(segments.next(), raw, "minor")?;
        let patch = parse_segment(segments.next(), raw, "patch")?;

        // Segments beyond patch are kept for display only.
        let extra: Vec<&str> = segments.collect();
        if !extra.is_empty() {
            let folded = format!(".{}", extra.join("."));
            suffix = Some(match suffix {
                Some(tail) => format!("{}{}", folded, tail),
                None => folded,
            });
        }

        Ok(Self {
            major,
            minor,
            patch,
            suffix,
        })
    }

    /// True iff this version is at or above `major.minor`
    pub fn is_at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }

    /// Display-only tail of the raw version string, if any
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }
}

fn parse_segment(segment: Option<&str>, raw: &str, name: &str) -> Result<u32> {
    match segment {
        None => Ok(0),
        Some(s) => s
            .parse::<u32>()
            .map_err(|_| parse_error(raw, &format!("{} segment '{}' is not a number", name, s))),
    }
}

fn parse_error(input: &str, message: &str) -> Error {
    Error::Parse {
        input: input.to_string(),
        message: message.to_string(),
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref suffix) = self.suffix {
            write!(f, "{}", suffix)?;
        }
        Ok(())
    }
}

impl FromStr for ApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// Equality and ordering ignore the suffix.
impl PartialEq for ApiVersion {
    fn eq(&self, other: &Self) -> bool {
        (self.major, self.minor, self.patch) == (other.major, other.minor, other.patch)
    }
}

impl Eq for ApiVersion {}

impl Hash for ApiVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.major, self.minor, self.patch).hash(state);
    }
}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl Serialize for ApiVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ApiVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Right-open version range `[min, max)`
///
/// `max: None` means the range is open-ended upward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRange {
    pub min: ApiVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<ApiVersion>,
}

impl VersionRange {
    /// Bounded range `[min, max)`
    pub fn bounded(min: ApiVersion, max: ApiVersion) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    /// Open-ended range `[min, )`
    pub fn from(min: ApiVersion) -> Self {
        Self { min, max: None }
    }

    /// True iff `version` falls inside the range
    pub fn contains(&self, version: &ApiVersion) -> bool {
        *version >= self.min && self.max.as_ref().map_or(true, |max| version < max)
    }

    /// True iff the range contains no version at all
    pub fn is_empty(&self) -> bool {
        self.max.as_ref().map_or(false, |max| *max <= self.min)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.max {
            Some(max) => write!(f, "[{}, {})", self.min, max),
            None => write!(f, "[{}, )", self.min),
        }
    }
}
