//! Reading from a log tree: backlog queries and live streams.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dn::Dn;
use crate::entry::LogEntry;
use crate::error::{LogTreeError, LogTreeResult};
use crate::journal::{Filter, ReadRequest};
use crate::severity::Severity;
use crate::tree::LogTree;

/// How much history a read returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backlog {
    /// At most this many of the newest matching entries.
    Count(usize),
    /// Every retained matching entry.
    All,
}

/// Options accepted by [`LogTree::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOption {
    /// Include entries from the whole subtree below the DN.
    WithChildren,
    /// Stream entries appended after the read.
    WithStream,
    /// Return history.
    WithBacklog(Backlog),
    /// Only raw entries. Cannot be combined with `OnlyLeveled`.
    OnlyRaw,
    /// Only leveled entries. Cannot be combined with `OnlyRaw`.
    OnlyLeveled,
    /// Leveled entries below this severity are skipped. Raw entries pass.
    LeveledWithMinimumSeverity(Severity),
    /// Channel capacity for the stream, overriding the tree default.
    StreamBuffer(usize),
}

/// Result of a read: the backlog and, if requested, a live stream.
///
/// Backlog and stream share the read's filters. Together they deliver every
/// matching entry exactly once: the stream starts right after the last
/// backlog entry. Dropping the reader cancels its subscription.
pub struct LogReader {
    /// Matching history, oldest first.
    pub backlog: Vec<Arc<LogEntry>>,
    stream: Option<Stream>,
}

struct Stream {
    receiver: mpsc::Receiver<Arc<LogEntry>>,
    cancel: CancellationToken,
    missed: Arc<AtomicU64>,
}

impl LogReader {
    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Wait for the next streamed entry. Returns `None` once the stream is
    /// closed, or immediately if no stream was requested.
    pub async fn recv(&mut self) -> Option<Arc<LogEntry>> {
        match &mut self.stream {
            Some(stream) => stream.receiver.recv().await,
            None => None,
        }
    }

    /// Take a streamed entry if one is ready.
    pub fn try_recv(&mut self) -> Option<Arc<LogEntry>> {
        self.stream
            .as_mut()
            .and_then(|stream| stream.receiver.try_recv().ok())
    }

    /// Blocking variant of [`recv`](Self::recv) for use outside an async
    /// runtime.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_recv(&mut self) -> Option<Arc<LogEntry>> {
        match &mut self.stream {
            Some(stream) => stream.receiver.blocking_recv(),
            None => None,
        }
    }

    /// Number of stream deliveries dropped because the channel was full.
    /// Never decreases.
    pub fn missed(&self) -> u64 {
        self.stream
            .as_ref()
            .map_or(0, |stream| stream.missed.load(Ordering::Relaxed))
    }

    /// Stop the stream. Entries already buffered can still be received; after
    /// them `recv` returns `None`.
    pub fn close(&mut self) {
        if let Some(stream) = &mut self.stream {
            stream.cancel.cancel();
            stream.receiver.close();
        }
    }
}

impl Drop for LogReader {
    fn drop(&mut self) {
        if let Some(stream) = &self.stream {
            stream.cancel.cancel();
        }
    }
}

impl fmt::Debug for LogReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogReader")
            .field("backlog", &self.backlog.len())
            .field("stream", &self.has_stream())
            .field("missed", &self.missed())
            .finish()
    }
}

impl LogTree {
    /// Read entries at `dn`, optionally with its subtree, history and a live
    /// stream.
    ///
    /// Fails with `InvalidDn` or `IncompatibleFilters` before touching the
    /// journal.
    pub fn read(&self, dn: impl AsRef<str>, options: &[ReadOption]) -> LogTreeResult<LogReader> {
        let dn = Dn::new(dn)?;

        let mut recursive = false;
        let mut stream = false;
        let mut backlog = None;
        let mut only_raw = false;
        let mut only_leveled = false;
        let mut min_severity = None;
        let mut buffer_size = self.config().stream_buffer_size;
        for option in options {
            match *option {
                ReadOption::WithChildren => recursive = true,
                ReadOption::WithStream => stream = true,
                ReadOption::WithBacklog(Backlog::Count(n)) => backlog = Some(Some(n)),
                ReadOption::WithBacklog(Backlog::All) => backlog = Some(None),
                ReadOption::OnlyRaw => only_raw = true,
                ReadOption::OnlyLeveled => only_leveled = true,
                ReadOption::LeveledWithMinimumSeverity(s) => min_severity = Some(s),
                ReadOption::StreamBuffer(n) => buffer_size = n,
            }
        }
        if only_raw && only_leveled {
            return Err(LogTreeError::IncompatibleFilters);
        }

        let mut filters = Vec::new();
        if only_raw {
            filters.push(Filter::OnlyRaw);
        }
        if only_leveled {
            filters.push(Filter::OnlyLeveled);
        }
        if let Some(min) = min_severity {
            filters.push(Filter::MinSeverity(min));
        }

        debug!(dn = %dn, recursive, stream, ?backlog, filters = filters.len(), "Reading log tree");
        let (backlog, handle) = self.journal().read(ReadRequest {
            dn,
            recursive,
            backlog,
            stream: stream.then_some(buffer_size),
            filters,
        });

        Ok(LogReader {
            backlog,
            stream: handle.map(|h| Stream {
                receiver: h.receiver,
                cancel: h.cancel,
                missed: h.missed,
            }),
        })
    }
}
