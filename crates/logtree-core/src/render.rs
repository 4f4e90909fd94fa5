//! Human-readable rendering of entries.
//!
//! Two forms exist: the canonical one (`Display`), which carries the full DN,
//! timestamp and source location, and the concise one meant for narrow
//! terminals such as a serial console.

use std::collections::HashMap;
use std::fmt;

use crate::dn::Dn;
use crate::entry::{LeveledPayload, LogEntry, Payload};

/// Replacement rules for DN segments, applied before shortening.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortenDictionary(HashMap<String, String>);

impl ShortenDictionary {
    /// An empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replacements for the segment names used across a typical node's tree.
    pub fn standard() -> Self {
        [
            ("controlplane", "cplane"),
            ("map-cluster-membership", "map-membership"),
            ("cluster-membership", "cluster"),
            ("controller-manager", "controllers"),
            ("networking", "net"),
            ("network", "net"),
            ("interfaces", "ifaces"),
            ("kubernetes", "k8s"),
        ]
        .into_iter()
        .collect()
    }

    pub fn insert(&mut self, segment: impl Into<String>, replacement: impl Into<String>) {
        self.0.insert(segment.into(), replacement.into());
    }

    fn apply<'a>(&'a self, segment: &'a str) -> &'a str {
        self.0.get(segment).map_or(segment, String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ShortenDictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Dn {
    /// A short, space-delimited form of this DN of at most `max_len` bytes.
    ///
    /// Segments are replaced through `dict`, a leading `root` is dropped, and
    /// `role.x.y.z` collapses to `x z`. Anything still too long keeps its end,
    /// prefixed with `...` when `max_len` leaves room for it.
    pub fn shorten(&self, dict: &ShortenDictionary, max_len: usize) -> String {
        let mut path: Vec<&str> = self.path().into_iter().map(|p| dict.apply(p)).collect();
        if path.is_empty() {
            return "?".to_string();
        }
        if path.len() > 1 && path[0] == "root" {
            path.remove(0);
        }
        if path[0] == "role" && path.len() > 1 {
            path = if path.len() == 2 {
                vec![path[1]]
            } else {
                vec![path[1], path[path.len() - 1]]
            };
        }

        let s = path.join(" ");
        if s.len() <= max_len {
            return s;
        }
        let ellipsis = if max_len >= 3 { "..." } else { "" };
        let mut cut = s.len() - max_len + ellipsis.len();
        while !s.is_char_boundary(cut) {
            cut += 1;
        }
        format!("{ellipsis}{}", &s[cut..])
    }
}

impl fmt::Display for LeveledPayload {
    /// Prefix and message, once per message line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (prefix, lines) = self.strings();
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{prefix}{line}")?;
        }
        Ok(())
    }
}

impl LogEntry {
    /// Canonical prefix, including the DN padded to 32 columns, and the lines
    /// it applies to.
    ///
    /// ```text
    /// svc.cache                        I1102 17:20:06.921395 gc.rs:42] current tags:
    /// ```
    pub fn strings(&self) -> (String, Vec<String>) {
        match &self.payload {
            Payload::Leveled(p) => {
                let (prefix, lines) = p.strings();
                (format!("{:<32} {}", self.dn, prefix), lines.to_vec())
            }
            Payload::Raw(line) => (format!("{:<32} R ", self.dn), vec![line.to_string()]),
        }
    }

    /// Compact rendering for constrained terminals.
    ///
    /// With `max_width > 0` lines are word-wrapped to that width. A column
    /// with the shortened DN is shown when `max_width` is at least 60 (or not
    /// limited). Extra message lines and wrapped text continue after `| `.
    ///
    /// ```text
    ///        k8s apiserver W Something went wrong and here are the
    ///                      | details of this particular issue.
    ///   some component R raw line from a subprocess
    /// ```
    pub fn concise(&self, dict: &ShortenDictionary, max_width: i32) -> String {
        let dn_width = match max_width {
            w if w >= 80 => 20,
            w if w >= 60 => 16,
            w if w <= 0 => 20,
            _ => 0,
        };
        let column = if dn_width > 0 {
            format!("{:>dn_width$} ", self.dn.shorten(dict, dn_width))
        } else {
            String::new()
        };

        let prefix = match &self.payload {
            Payload::Leveled(p) => format!("{column}{} ", p.severity().as_char()),
            Payload::Raw(_) => format!("{column}R "),
        };
        let continuation = format!("{}| ", " ".repeat(column.len()));
        let wrap_at = usize::try_from(max_width).unwrap_or(0);
        let limit = wrap_at.saturating_sub(prefix.len());

        let messages: Vec<String> = match &self.payload {
            Payload::Leveled(p) => p.messages().to_vec(),
            Payload::Raw(line) => vec![line.to_string()],
        };

        let mut out: Vec<String> = Vec::new();
        for message in &messages {
            let wrapped = if wrap_at > 0 {
                word_wrap(message, limit)
            } else {
                vec![message.clone()]
            };
            for part in wrapped.into_iter().filter(|p| !p.is_empty()) {
                let lead = if out.is_empty() { &prefix } else { &continuation };
                out.push(format!("{lead}{part}"));
            }
        }
        if out.is_empty() {
            out.push(prefix.trim_end().to_string());
        }
        out.join("\n")
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (prefix, lines) = self.strings();
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{prefix}{line}")?;
        }
        Ok(())
    }
}

/// Greedy word wrap on spaces. Words longer than `limit` get a line of their
/// own.
fn word_wrap(text: &str, limit: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split(' ') {
        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() <= limit {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    lines.push(current);
    lines
}
