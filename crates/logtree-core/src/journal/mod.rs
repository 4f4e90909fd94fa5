//! In-memory journal of log entries.
//!
//! Every entry lives in exactly one arena slot and is threaded onto two
//! intrusive lists: the global list spanning all DNs and the local list of
//! the DN it was logged at. Per-DN quotas are enforced on the local list, and
//! evictions unlink from both.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Journal                                                        │
//! │  ├── slots: Vec<Slot>          arena, addressed by EntryId      │
//! │  │   └── EntryId { index, generation }                          │
//! │  │                                                              │
//! │  ├── head / tail               global list, newest / oldest     │
//! │  ├── locals: Dn → LocalList    per-DN list, newest / oldest     │
//! │  ├── quotas: Dn → Quota        created on first append          │
//! │  │                                                              │
//! │  └── subscribers               notified inside the append lock  │
//! └─────────────────────────────────────────────────────────────────┘
//!
//!   older ◄── prev ──  entry  ── next ──► newer
//! ```
//!
//! All state sits behind one `RwLock`. Appends, subscription and quota
//! changes take it exclusively; backlog scans share it.

mod filter;
mod subscriber;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::dn::Dn;
use crate::entry::LogEntry;
use crate::error::{LogTreeError, LogTreeResult};

pub(crate) use filter::{Filter, FilterChain};
pub(crate) use subscriber::{Subscriber, SubscriberHandle};

/// Default number of entries retained per DN.
pub const DEFAULT_QUOTA: usize = 8192;

/// Arena address of an entry. The generation detects use of a slot after
/// the entry it held has been evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EntryId {
    index: u32,
    generation: u32,
}

struct Slot {
    generation: u32,
    node: Option<EntryNode>,
}

struct EntryNode {
    entry: Arc<LogEntry>,
    /// Position within the local list, contiguous from its oldest entry.
    seq_local: u64,
    prev_global: Option<EntryId>,
    next_global: Option<EntryId>,
    prev_local: Option<EntryId>,
    next_local: Option<EntryId>,
}

/// Ends of a non-empty local list.
#[derive(Debug, Clone, Copy)]
struct LocalList {
    head: EntryId,
    tail: EntryId,
}

#[derive(Debug, Clone, Copy)]
struct Quota {
    max_entries: usize,
}

/// Counters describing the journal contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalStats {
    /// Entries currently retained.
    pub entries: usize,
    /// DNs with at least one retained entry.
    pub dns: usize,
    /// Registered live subscribers, including ones not yet pruned.
    pub subscribers: usize,
}

struct JournalState {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
    head: Option<EntryId>,
    tail: Option<EntryId>,
    locals: HashMap<Dn, LocalList>,
    quotas: HashMap<Dn, Quota>,
    subscribers: Vec<Subscriber>,
    default_quota: usize,
}

/// Request for a combined backlog snapshot and live subscription.
pub(crate) struct ReadRequest {
    /// Entries logged exactly at `dn`, or anywhere in its subtree.
    pub(crate) dn: Dn,
    pub(crate) recursive: bool,
    /// `None` for no backlog, `Some(None)` for everything retained.
    pub(crate) backlog: Option<Option<usize>>,
    /// Channel capacity, if a stream was requested.
    pub(crate) stream: Option<usize>,
    pub(crate) filters: Vec<Filter>,
}

/// The in-memory journal shared by every node of a tree.
pub(crate) struct Journal {
    state: RwLock<JournalState>,
}

impl Journal {
    pub(crate) fn new(default_quota: usize) -> Self {
        Self {
            state: RwLock::new(JournalState {
                slots: Vec::new(),
                free: Vec::new(),
                len: 0,
                head: None,
                tail: None,
                locals: HashMap::new(),
                quotas: HashMap::new(),
                subscribers: Vec::new(),
                default_quota: default_quota.max(1),
            }),
        }
    }

    /// Commit an entry, enforce its DN's quota and notify subscribers.
    pub(crate) fn append(&self, entry: LogEntry) -> Arc<LogEntry> {
        let entry = Arc::new(entry);
        let mut state = self.state.write();
        state.push(entry.clone());
        state.notify(&entry);
        entry
    }

    /// Snapshot the backlog and register a subscriber atomically, so that the
    /// stream starts exactly after the last backlog entry.
    pub(crate) fn read(
        &self,
        mut request: ReadRequest,
    ) -> (Vec<Arc<LogEntry>>, Option<SubscriberHandle>) {
        let scope = if request.recursive {
            Filter::Subtree(request.dn.clone())
        } else {
            Filter::Exact(request.dn.clone())
        };
        let mut filters = Vec::with_capacity(request.filters.len() + 1);
        filters.push(scope);
        filters.extend(std::mem::take(&mut request.filters));
        let chain = FilterChain::new(filters);

        if request.stream.is_none() {
            let state = self.state.read();
            let backlog = state.backlog(&request, &chain);
            return (backlog, None);
        }

        let mut state = self.state.write();
        let backlog = state.backlog(&request, &chain);
        let handle = request.stream.map(|buffer_size| {
            let (subscriber, handle) = Subscriber::new(chain, buffer_size);
            state.subscribers.push(subscriber);
            debug!(dn = %request.dn, recursive = request.recursive, buffer_size, "Registered log subscriber");
            handle
        });
        (backlog, handle)
    }

    /// Change the number of entries retained at `dn`, evicting immediately if
    /// it now holds more.
    pub(crate) fn set_quota(&self, dn: &Dn, max_entries: usize) -> LogTreeResult<()> {
        if max_entries == 0 {
            return Err(LogTreeError::InvalidQuota(max_entries));
        }
        let mut state = self.state.write();
        state
            .quotas
            .insert(dn.clone(), Quota { max_entries });
        let evicted = state.enforce_quota(dn);
        debug!(dn = %dn, max_entries, evicted, "Quota updated");
        Ok(())
    }

    pub(crate) fn stats(&self) -> JournalStats {
        let state = self.state.read();
        JournalStats {
            entries: state.len,
            dns: state.locals.len(),
            subscribers: state.subscribers.len(),
        }
    }

    #[cfg(test)]
    fn check_consistency(&self) {
        self.state.read().check_consistency();
    }
}

impl JournalState {
    fn node(&self, id: EntryId) -> &EntryNode {
        let slot = &self.slots[id.index as usize];
        match &slot.node {
            Some(node) if slot.generation == id.generation => node,
            _ => panic!("journal: dangling entry reference {id:?}"),
        }
    }

    fn node_mut(&mut self, id: EntryId) -> &mut EntryNode {
        let slot = &mut self.slots[id.index as usize];
        match &mut slot.node {
            Some(node) if slot.generation == id.generation => node,
            _ => panic!("journal: dangling entry reference {id:?}"),
        }
    }

    fn alloc(&mut self, node: EntryNode) -> EntryId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return EntryId {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).expect("journal: arena index overflow");
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        EntryId {
            index,
            generation: 0,
        }
    }

    fn release(&mut self, id: EntryId) -> EntryNode {
        let slot = &mut self.slots[id.index as usize];
        if slot.generation != id.generation {
            panic!("journal: dangling entry reference {id:?}");
        }
        let node = slot
            .node
            .take()
            .unwrap_or_else(|| panic!("journal: double release of {id:?}"));
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        node
    }

    fn local_len(&self, dn: &Dn) -> usize {
        match self.locals.get(dn) {
            Some(list) => {
                let newest = self.node(list.head).seq_local;
                let oldest = self.node(list.tail).seq_local;
                (newest - oldest + 1) as usize
            }
            None => 0,
        }
    }

    fn push(&mut self, entry: Arc<LogEntry>) {
        let dn = entry.dn.clone();
        let local = self.locals.get(&dn).copied();
        let seq_local = match local {
            Some(list) => self.node(list.head).seq_local + 1,
            None => 0,
        };

        let id = self.alloc(EntryNode {
            entry,
            seq_local,
            prev_global: self.head,
            next_global: None,
            prev_local: local.map(|l| l.head),
            next_local: None,
        });

        match self.head {
            Some(old) => self.node_mut(old).next_global = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);

        match local {
            Some(list) => {
                self.node_mut(list.head).next_local = Some(id);
                self.locals.insert(
                    dn.clone(),
                    LocalList {
                        head: id,
                        tail: list.tail,
                    },
                );
            }
            None => {
                self.locals.insert(dn.clone(), LocalList { head: id, tail: id });
            }
        }

        let default_quota = self.default_quota;
        self.quotas.entry(dn.clone()).or_insert(Quota {
            max_entries: default_quota,
        });
        self.enforce_quota(&dn);
    }

    /// Evict the oldest entries at `dn` until it fits its quota.
    fn enforce_quota(&mut self, dn: &Dn) -> usize {
        let max = match self.quotas.get(dn) {
            Some(q) => q.max_entries,
            None => return 0,
        };
        let mut evicted = 0;
        while self.local_len(dn) > max {
            let tail = match self.locals.get(dn) {
                Some(list) => list.tail,
                None => panic!("journal: local list for {dn} vanished during eviction"),
            };
            self.unlink(tail);
            evicted += 1;
        }
        if evicted > 0 {
            trace!(dn = %dn, evicted, "Evicted entries over quota");
        }
        evicted
    }

    /// Remove an entry from both lists and free its slot.
    fn unlink(&mut self, id: EntryId) {
        let node = self.release(id);

        match node.prev_global {
            Some(prev) => self.node_mut(prev).next_global = node.next_global,
            None => {
                assert_eq!(self.tail, Some(id), "journal: global tail mismatch");
                self.tail = node.next_global;
            }
        }
        match node.next_global {
            Some(next) => self.node_mut(next).prev_global = node.prev_global,
            None => {
                assert_eq!(self.head, Some(id), "journal: global head mismatch");
                self.head = node.prev_global;
            }
        }

        let dn = &node.entry.dn;
        let mut list = match self.locals.get(dn) {
            Some(list) => *list,
            None => panic!("journal: entry at {dn} has no local list"),
        };
        match node.prev_local {
            Some(prev) => self.node_mut(prev).next_local = node.next_local,
            None => {
                assert_eq!(list.tail, id, "journal: local tail mismatch at {dn}");
                match node.next_local {
                    Some(next) => list.tail = next,
                    None => {
                        self.locals.remove(dn);
                        return;
                    }
                }
            }
        }
        match node.next_local {
            Some(next) => self.node_mut(next).prev_local = node.prev_local,
            None => {
                assert_eq!(list.head, id, "journal: local head mismatch at {dn}");
                // prev_local is Some here, otherwise the list was removed above.
                if let Some(prev) = node.prev_local {
                    list.head = prev;
                }
            }
        }
        self.locals.insert(dn.clone(), list);
    }

    fn backlog(&self, request: &ReadRequest, chain: &FilterChain) -> Vec<Arc<LogEntry>> {
        let limit = match request.backlog {
            None => return Vec::new(),
            Some(limit) => limit,
        };
        if request.recursive {
            self.scan_entries(limit, chain)
        } else {
            self.get_entries(limit, &request.dn, chain)
        }
    }

    /// Walk the global list newest to oldest, keeping up to `limit` matching
    /// entries. Returned oldest first.
    fn scan_entries(&self, limit: Option<usize>, chain: &FilterChain) -> Vec<Arc<LogEntry>> {
        self.collect(self.head, limit, chain, |node| node.prev_global)
    }

    /// Like `scan_entries`, but walks only the local list of `dn`.
    fn get_entries(
        &self,
        limit: Option<usize>,
        dn: &Dn,
        chain: &FilterChain,
    ) -> Vec<Arc<LogEntry>> {
        let start = self.locals.get(dn).map(|list| list.head);
        self.collect(start, limit, chain, |node| node.prev_local)
    }

    fn collect(
        &self,
        start: Option<EntryId>,
        limit: Option<usize>,
        chain: &FilterChain,
        older: impl Fn(&EntryNode) -> Option<EntryId>,
    ) -> Vec<Arc<LogEntry>> {
        let mut res = Vec::new();
        let mut cur = start;
        while let Some(id) = cur {
            if limit.is_some_and(|l| res.len() >= l) {
                break;
            }
            let node = self.node(id);
            if chain.matches(&node.entry) {
                res.push(node.entry.clone());
            }
            cur = older(node);
        }
        res.reverse();
        res
    }

    fn notify(&mut self, entry: &Arc<LogEntry>) {
        if self.subscribers.is_empty() {
            return;
        }
        let before = self.subscribers.len();
        self.subscribers.retain(|sub| sub.deliver(entry));
        let removed = before - self.subscribers.len();
        if removed > 0 {
            debug!(removed, remaining = self.subscribers.len(), "Pruned log subscribers");
        }
    }

    #[cfg(test)]
    fn check_consistency(&self) {
        // Global list, both directions.
        let mut forward = Vec::new();
        let mut cur = self.tail;
        let mut prev = None;
        while let Some(id) = cur {
            let node = self.node(id);
            assert_eq!(node.prev_global, prev);
            forward.push(id);
            prev = Some(id);
            cur = node.next_global;
        }
        assert_eq!(self.head, prev);
        assert_eq!(forward.len(), self.len);

        // Every local list holds exactly the global entries at its DN, with
        // contiguous sequence numbers.
        let mut per_dn: HashMap<Dn, Vec<EntryId>> = HashMap::new();
        for id in &forward {
            per_dn
                .entry(self.node(*id).entry.dn.clone())
                .or_default()
                .push(*id);
        }
        assert_eq!(per_dn.len(), self.locals.len());
        for (dn, ids) in per_dn {
            let list = self.locals[&dn];
            let mut local = Vec::new();
            let mut cur = Some(list.tail);
            let mut prev = None;
            while let Some(id) = cur {
                let node = self.node(id);
                assert_eq!(node.prev_local, prev);
                if let Some(p) = prev {
                    assert_eq!(node.seq_local, self.node(p).seq_local + 1);
                }
                local.push(id);
                prev = Some(id);
                cur = node.next_local;
            }
            assert_eq!(prev, Some(list.head));
            assert_eq!(local, ids);
            let quota = self.quotas[&dn].max_entries;
            assert!(local.len() <= quota);
            assert_eq!(self.local_len(&dn), local.len());
        }
    }
}
