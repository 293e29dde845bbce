//! Firmware / hardware version comparator.
//!
//! Versions come off the wire as two raw bytes and are shown as
//! `"<major>.<minor>"`. Comparison is on the integer pair, so `"2.10"`
//! sorts after `"2.6"` and `"1.35"` after `"1.34"`.

use crate::error::VersionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    /// Build from the two raw version bytes as sent by the transmitter.
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || VersionError::Malformed(s.to_string());
        let (major, minor) = s.trim().split_once('.').ok_or_else(malformed)?;
        let major = major.parse::<u8>().map_err(|_| malformed())?;
        let minor = minor.parse::<u8>().map_err(|_| malformed())?;
        Ok(Self::new(major, minor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_keeps_minor_digits() {
        assert_eq!(Version::new(1, 10).to_string(), "1.10");
        assert_eq!(Version::new(2, 3).to_string(), "2.3");
    }

    #[test]
    fn test_integer_pair_ordering() {
        let v = |s: &str| s.parse::<Version>().unwrap();
        assert!(v("1.35") > v("1.34"));
        assert!(v("2.10") > v("2.6"));
        assert!(v("2.6") >= v("2.6"));
        assert!(v("1.99") < v("2.0"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Version>().is_err());
        assert!("2".parse::<Version>().is_err());
        assert!("2.x".parse::<Version>().is_err());
        assert!("2.6.1".parse::<Version>().is_err());
        assert!("256.0".parse::<Version>().is_err());
    }
}
