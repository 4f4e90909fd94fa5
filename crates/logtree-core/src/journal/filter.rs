//! Entry predicates shared by backlog scans and live subscribers.

use crate::dn::Dn;
use crate::entry::{LogEntry, Payload};
use crate::severity::Severity;

/// A predicate deciding whether a reader or subscriber wants an entry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Filter {
    /// Entries logged exactly at this DN.
    Exact(Dn),
    /// Entries logged at this DN or anywhere below it.
    Subtree(Dn),
    /// Leveled entries at or above this severity. Raw entries pass.
    MinSeverity(Severity),
    OnlyRaw,
    OnlyLeveled,
}

impl Filter {
    pub(crate) fn matches(&self, entry: &LogEntry) -> bool {
        match self {
            Filter::Exact(dn) => entry.dn == *dn,
            Filter::Subtree(root) => root.contains(&entry.dn),
            Filter::MinSeverity(min) => match &entry.payload {
                Payload::Leveled(p) => p.severity().at_least(*min),
                Payload::Raw(_) => true,
            },
            Filter::OnlyRaw => matches!(entry.payload, Payload::Raw(_)),
            Filter::OnlyLeveled => matches!(entry.payload, Payload::Leveled(_)),
        }
    }
}

/// An ordered conjunction of filters. An empty chain accepts everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FilterChain(Vec<Filter>);

impl FilterChain {
    pub(crate) fn new(filters: Vec<Filter>) -> Self {
        Self(filters)
    }

    pub(crate) fn matches(&self, entry: &LogEntry) -> bool {
        self.0.iter().all(|f| f.matches(entry))
    }
}
