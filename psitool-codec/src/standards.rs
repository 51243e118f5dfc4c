//! Signalization standards.
//!
//! Tag spaces of the standards bodies overlap, so every registration carries
//! the set of standards that define it and every lookup carries the set of
//! standards currently in effect.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// A set of signalization standards.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Standards: u16 {
        const MPEG  = 0x0001;
        const DVB   = 0x0002;
        const SCTE  = 0x0004;
        const ATSC  = 0x0008;
        const ISDB  = 0x0010;
        const JAPAN = 0x0020;
        const ABNT  = 0x0040;
    }
}

/// Error returned when parsing an unknown standard name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown standard: {0}")]
pub struct UnknownStandard(pub String);

impl Standards {
    /// Standards that are implied by another one.
    ///
    /// Japanese and Brazilian variants are built on ISDB.
    pub fn with_implied(self) -> Standards {
        let mut all = self;
        if self.intersects(Standards::JAPAN | Standards::ABNT) {
            all |= Standards::ISDB;
        }
        all
    }
}

impl Default for Standards {
    fn default() -> Self {
        Standards::empty()
    }
}

impl FromStr for Standards {
    type Err = UnknownStandard;

    /// Parse a comma or space separated list of names, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut standards = Standards::empty();
        for name in s.split(|c: char| c == ',' || c.is_whitespace()) {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let flag = Standards::from_name(&name.to_ascii_uppercase())
                .ok_or_else(|| UnknownStandard(name.to_string()))?;
            standards |= flag;
        }
        Ok(standards)
    }
}

impl fmt::Display for Standards {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        for (i, (name, _)) in self.iter_names().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let s: Standards = "dvb, ISDB".parse().unwrap();
        assert_eq!(s, Standards::DVB | Standards::ISDB);
        assert_eq!("".parse::<Standards>().unwrap(), Standards::empty());
    }

    #[test]
    fn test_parse_unknown() {
        let err = "dvb,dab".parse::<Standards>().unwrap_err();
        assert_eq!(err, UnknownStandard("dab".to_string()));
    }

    #[test]
    fn test_display() {
        assert_eq!((Standards::MPEG | Standards::SCTE).to_string(), "MPEG, SCTE");
        assert_eq!(Standards::empty().to_string(), "none");
    }

    #[test]
    fn test_japan_implies_isdb() {
        assert!(Standards::JAPAN.with_implied().contains(Standards::ISDB));
        assert_eq!(Standards::DVB.with_implied(), Standards::DVB);
    }
}
