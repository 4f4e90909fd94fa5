//! The tree of named loggers and the [`LogTree`] handle tying it to a journal.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  LogTree (cheap to clone)                                       │
//! │  ├── journal: Arc<Journal>     every entry from every node      │
//! │  ├── root: Arc<Node>                                            │
//! │  │   └── children: Mutex<segment → Arc<Node>>                   │
//! │  │       └── ... created on first reference, never removed      │
//! │  └── config: LogTreeConfig                                      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each node guards its own child map, so resolving DNs in sibling subtrees
//! never contends, and resolution never touches the journal lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::LogTreeConfig;
use crate::dn::Dn;
use crate::entry::{LogEntry, Payload};
use crate::error::LogTreeResult;
use crate::journal::{Journal, JournalStats};
use crate::leveled::LeveledLogger;
use crate::linebuffer::{Line, LineBuffer};
use crate::raw::RawWriter;
use crate::severity::VerbosityLevel;

pub(crate) type RawSink = Box<dyn FnMut(Line) + Send>;

/// One logger in the tree, identified by its DN.
pub struct Node {
    dn: Dn,
    verbosity: AtomicI32,
    children: Mutex<HashMap<String, Arc<Node>>>,
    pub(crate) journal: Arc<Journal>,
    /// Shared by every raw writer of this DN.
    pub(crate) raw: Mutex<LineBuffer<RawSink>>,
}

impl Node {
    fn new(dn: Dn, journal: Arc<Journal>, raw_line_length: usize) -> Self {
        let sink: RawSink = {
            let journal = journal.clone();
            let dn = dn.clone();
            Box::new(move |line: Line| {
                journal.append(LogEntry {
                    dn: dn.clone(),
                    payload: Payload::Raw(line),
                });
            })
        };
        Self {
            dn,
            verbosity: AtomicI32::new(0),
            children: Mutex::new(HashMap::new()),
            journal,
            raw: Mutex::new(LineBuffer::new(raw_line_length, sink)),
        }
    }

    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    /// Current `V(n)` threshold of this node.
    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity.load(Ordering::Relaxed)
    }

    pub fn set_verbosity(&self, level: VerbosityLevel) {
        self.verbosity.store(level, Ordering::Relaxed);
    }

    /// Names of the direct children created so far, sorted.
    pub fn children(&self) -> Vec<String> {
        let mut names: Vec<String> = self.children.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Get or create the child node for `segment`. Concurrent callers observe
    /// the same node.
    fn child(&self, segment: &str, raw_line_length: usize) -> LogTreeResult<Arc<Node>> {
        let mut children = self.children.lock();
        if let Some(child) = children.get(segment) {
            return Ok(child.clone());
        }
        let dn = self.dn.child(segment)?;
        trace!(dn = %dn, "Creating log tree node");
        let child = Arc::new(Node::new(dn, self.journal.clone(), raw_line_length));
        children.insert(segment.to_string(), child.clone());
        Ok(child)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("dn", &self.dn)
            .field("verbosity", &self.verbosity())
            .finish()
    }
}

struct TreeInner {
    journal: Arc<Journal>,
    root: Arc<Node>,
    config: LogTreeConfig,
}

/// A hierarchical, in-memory log store.
///
/// Producers obtain per-DN handles ([`LeveledLogger`], [`RawWriter`]) and
/// consumers query and stream entries with [`LogTree::read`]. Clones share
/// the same tree.
///
/// # Example
///
/// ```
/// use logtree_core::{Backlog, LogTree, ReadOption};
///
/// let tree = LogTree::new();
/// let logger = tree.leveled_for("svc.cache").unwrap();
/// logger.info("cache warmed");
///
/// let reader = tree
///     .read("svc", &[ReadOption::WithChildren, ReadOption::WithBacklog(Backlog::All)])
///     .unwrap();
/// assert_eq!(reader.backlog.len(), 1);
/// ```
#[derive(Clone)]
pub struct LogTree {
    inner: Arc<TreeInner>,
}

impl LogTree {
    pub fn new() -> Self {
        Self::with_config(LogTreeConfig::default())
    }

    pub fn with_config(config: LogTreeConfig) -> Self {
        let journal = Arc::new(Journal::new(config.default_quota));
        let root = Arc::new(Node::new(
            Dn::root(),
            journal.clone(),
            config.raw_line_length,
        ));
        debug!(
            default_quota = config.default_quota,
            stream_buffer_size = config.stream_buffer_size,
            raw_line_length = config.raw_line_length,
            "Created log tree"
        );
        Self {
            inner: Arc::new(TreeInner {
                journal,
                root,
                config,
            }),
        }
    }

    pub fn config(&self) -> &LogTreeConfig {
        &self.inner.config
    }

    pub(crate) fn journal(&self) -> &Journal {
        &self.inner.journal
    }

    /// Find the node at `dn`, creating it and any missing ancestors.
    ///
    /// The DN is validated before any node is created.
    pub fn resolve(&self, dn: impl AsRef<str>) -> LogTreeResult<Arc<Node>> {
        let dn = Dn::new(dn)?;
        let raw_line_length = self.inner.config.raw_line_length;
        let mut cur = self.inner.root.clone();
        for segment in dn.path() {
            cur = cur.child(segment, raw_line_length)?;
        }
        Ok(cur)
    }

    /// Set the verbosity of exactly one node. Descendants are not affected.
    pub fn set_verbosity(&self, dn: impl AsRef<str>, level: VerbosityLevel) -> LogTreeResult<()> {
        let node = self.resolve(dn)?;
        node.set_verbosity(level);
        debug!(dn = %node.dn(), level, "Verbosity updated");
        Ok(())
    }

    /// Set how many entries are retained at exactly `dn`.
    pub fn set_quota(&self, dn: impl AsRef<str>, max_entries: usize) -> LogTreeResult<()> {
        let dn = Dn::new(dn)?;
        self.inner.journal.set_quota(&dn, max_entries)
    }

    /// Leveled logger for `dn`.
    pub fn leveled_for(&self, dn: impl AsRef<str>) -> LogTreeResult<LeveledLogger> {
        Ok(LeveledLogger::new(self.resolve(dn)?))
    }

    /// Raw line writer for `dn`. All writers of one DN share a line buffer.
    pub fn raw_for(&self, dn: impl AsRef<str>) -> LogTreeResult<RawWriter> {
        Ok(RawWriter::new(self.resolve(dn)?))
    }

    pub fn stats(&self) -> JournalStats {
        self.inner.journal.stats()
    }
}

impl Default for LogTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogTree")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}
