//! Leveled logging severities and verbosity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Verbosity level used to gate `V(n)` logging. A node logs at `V(n)` only if
/// its configured verbosity is at least `n`.
pub type VerbosityLevel = i32;

/// Severity of a leveled log entry, in increasing order.
///
/// A consumer asking for entries at a given severity also receives everything
/// more severe: an ERROR entry is visible to readers filtering at INFO or
/// WARNING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    /// All severities, least severe first.
    pub const ALL: [Severity; 4] = [
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Fatal,
    ];

    /// Single-character glog form (`I`, `W`, `E`, `F`).
    pub fn as_char(self) -> char {
        match self {
            Severity::Info => 'I',
            Severity::Warning => 'W',
            Severity::Error => 'E',
            Severity::Fatal => 'F',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'I' => Some(Severity::Info),
            'W' => Some(Severity::Warning),
            'E' => Some(Severity::Error),
            'F' => Some(Severity::Fatal),
            _ => None,
        }
    }

    /// Whether this severity is `other` or more severe.
    pub fn at_least(self, other: Severity) -> bool {
        self >= other
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Error returned when parsing an unknown severity string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity {0:?}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    /// Accepts the glog character or the full name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "I" | "INFO" => Ok(Severity::Info),
            "W" | "WARN" | "WARNING" => Ok(Severity::Warning),
            "E" | "ERROR" => Ok(Severity::Error),
            "F" | "FATAL" => Ok(Severity::Fatal),
            _ => Err(UnknownSeverity(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Severity::Error.at_least(Severity::Warning));
        assert!(Severity::Warning.at_least(Severity::Warning));
        assert!(!Severity::Info.at_least(Severity::Warning));
        assert!(Severity::Fatal.at_least(Severity::Info));
    }

    #[test]
    fn test_parse() {
        assert_eq!("W".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!("error".parse::<Severity>().unwrap(), Severity::Error);
        assert!("verbose".parse::<Severity>().is_err());
        for s in Severity::ALL {
            assert_eq!(Severity::from_char(s.as_char()), Some(s));
        }
    }
}
