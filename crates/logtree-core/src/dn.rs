//! Distinguished names.
//!
//! A DN is a dot-delimited path addressing a logger within a [`LogTree`]. For
//! example `svc.cache.gc` designates the `gc` logger under `svc.cache`, which
//! in turn lives under `svc`. The empty string is the root of the tree.
//!
//! [`LogTree`]: crate::LogTree

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{LogTreeError, LogTreeResult};

/// A validated, immutable distinguished name.
///
/// Cloning is cheap: the underlying string is shared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dn(Arc<str>);

impl Dn {
    /// Parse and validate a DN.
    ///
    /// Every dot-delimited segment must be non-empty and consist only of ASCII
    /// alphanumerics, `-` or `_`. `foo..bar`, `.foo`, `foo.` and `foo bar` are
    /// all rejected.
    pub fn new(dn: impl AsRef<str>) -> LogTreeResult<Self> {
        let dn = dn.as_ref();
        if !dn.is_empty() && !dn.split('.').all(is_valid_segment) {
            return Err(LogTreeError::InvalidDn(dn.to_string()));
        }
        Ok(Self(Arc::from(dn)))
    }

    /// The root DN.
    pub fn root() -> Self {
        Self(Arc::from(""))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Segments of this DN. The root has none.
    pub fn path(&self) -> Vec<&str> {
        if self.is_root() {
            Vec::new()
        } else {
            self.0.split('.').collect()
        }
    }

    /// The DN one level up, or `None` for the root.
    pub fn parent(&self) -> Option<Dn> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind('.') {
            Some(idx) => Self(Arc::from(&self.0[..idx])),
            None => Self::root(),
        })
    }

    /// Append a single segment to this DN.
    pub fn child(&self, segment: &str) -> LogTreeResult<Dn> {
        if !is_valid_segment(segment) {
            return Err(LogTreeError::InvalidDn(segment.to_string()));
        }
        if self.is_root() {
            Ok(Self(Arc::from(segment)))
        } else {
            Ok(Self(Arc::from(format!("{}.{}", self.0, segment))))
        }
    }

    /// Whether `other` is this DN or lives below it.
    ///
    /// `foo.bar` contains `foo.bar` and `foo.bar.baz`, but not `foo` or
    /// `foo.barr`. The root contains every DN.
    pub fn contains(&self, other: &Dn) -> bool {
        if self.is_root() {
            return true;
        }
        match other.0.strip_prefix(&*self.0) {
            Some("") => true,
            Some(rest) => rest.starts_with('.'),
            None => false,
        }
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

impl FromStr for Dn {
    type Err = LogTreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dn::new(s)
    }
}

impl TryFrom<&str> for Dn {
    type Error = LogTreeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Dn::new(value)
    }
}

impl TryFrom<String> for Dn {
    type Error = LogTreeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Dn::new(value)
    }
}

impl AsRef<str> for Dn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Pass through so width/alignment flags apply to the DN text.
        f.pad(&self.0)
    }
}

impl fmt::Debug for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dn({:?})", &*self.0)
    }
}
