//! Semantic report version.
//!
//! Every encoded report starts with its version string. Decoders compare the
//! decoded version against known thresholds ("field X exists from 0.1.4 on")
//! instead of carrying per-field format tags, so the ordering implemented
//! here is what drives schema evolution.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::utils::error::CodecError;

/// A `major.minor.patch` report version with total ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl ReportVersion {
    /// Create a version from its three components
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ReportVersion {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::InvalidVersion(s.to_string());

        let mut parts = s.split('.');
        let mut next = || -> Result<u16, CodecError> {
            parts
                .next()
                .ok_or_else(invalid)?
                .parse::<u16>()
                .map_err(|_| invalid())
        };

        let version = Self {
            major: next()?,
            minor: next()?,
            patch: next()?,
        };

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(version)
    }
}

impl Serialize for ReportVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ReportVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|_| D::Error::custom("invalid report version"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let version: ReportVersion = "0.1.4".parse().unwrap();
        assert_eq!(version, ReportVersion::new(0, 1, 4));
        assert_eq!(version.to_string(), "0.1.4");
    }

    #[test]
    fn test_ordering() {
        let old: ReportVersion = "0.1.3".parse().unwrap();
        let new: ReportVersion = "0.1.4".parse().unwrap();
        assert!(old < new);
        assert!("0.2.0".parse::<ReportVersion>().unwrap() > new);
        assert!("1.0.0".parse::<ReportVersion>().unwrap() > new);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<ReportVersion>().is_err());
        assert!("0.1".parse::<ReportVersion>().is_err());
        assert!("0.1.4.2".parse::<ReportVersion>().is_err());
        assert!("a.b.c".parse::<ReportVersion>().is_err());
    }
}
