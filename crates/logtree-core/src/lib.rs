//! Hierarchical in-memory log aggregation.
//!
//! ## Overview
//!
//! A [`LogTree`] is a tree of named loggers addressed by dot-delimited
//! distinguished names ([`Dn`]), backed by one bounded in-memory journal.
//! Producers publish leveled (severity, source location, multi-line message)
//! or raw (unstructured line) entries at a DN; consumers read the retained
//! backlog of a DN or a whole subtree and can follow new entries live.
//!
//! Every DN keeps at most a fixed number of entries (its quota, 8192 by
//! default), so a chatty logger never pushes out the history of a quiet one.
//! Live readers never slow producers down: a reader that falls behind loses
//! entries and can see how many through [`LogReader::missed`].
//!
//! ## Quick Start
//!
//! ```
//! use logtree_core::{Backlog, LogTree, ReadOption, Severity};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> logtree_core::LogTreeResult<()> {
//! let tree = LogTree::new();
//!
//! let cache = tree.leveled_for("svc.cache")?;
//! cache.info("warming up");
//! cache.warning(format_args!("{} entries evicted", 12));
//!
//! // History of the whole `svc` subtree, then everything that follows.
//! let mut reader = tree.read(
//!     "svc",
//!     &[
//!         ReadOption::WithChildren,
//!         ReadOption::WithBacklog(Backlog::All),
//!         ReadOption::WithStream,
//!         ReadOption::LeveledWithMinimumSeverity(Severity::Warning),
//!     ],
//! )?;
//! assert_eq!(reader.backlog.len(), 1);
//!
//! tree.leveled_for("svc.gc")?.error("out of space");
//! let entry = reader.recv().await.unwrap();
//! assert_eq!(entry.message(), "out of space");
//! # Ok(())
//! # }
//! ```
//!
//! External sources come in through the [`ingest`] adapters, and `tracing`
//! events through [`logging::LogTreeLayer`].

pub mod access;
pub mod config;
pub mod dn;
pub mod entry;
pub mod error;
pub mod ingest;
pub mod leveled;
pub mod linebuffer;
pub mod logging;
pub mod raw;
pub mod render;
pub mod severity;
pub mod tree;
pub mod wire;

mod journal;

// Re-exports
pub use access::{Backlog, LogReader, ReadOption};
pub use config::{LogTreeConfig, DEFAULT_STREAM_BUFFER_SIZE};
pub use dn::Dn;
pub use entry::{ExternalLeveledPayload, LeveledPayload, LogEntry, Payload};
pub use error::{LogTreeError, LogTreeResult};
pub use ingest::{
    parse_klog, parse_kmsg, Converter, InvalidLinePolicy, KlogParseError, KlogParser,
    KmsgParseError, KmsgPipe, LeveledWriter,
};
pub use journal::{JournalStats, DEFAULT_QUOTA};
pub use leveled::{LeveledLogger, VerboseLogger};
pub use linebuffer::{Line, LineBuffer, DEFAULT_MAX_LINE_LENGTH};
pub use logging::LogTreeLayer;
pub use raw::RawWriter;
pub use render::ShortenDictionary;
pub use severity::{Severity, UnknownSeverity, VerbosityLevel};
pub use tree::{LogTree, Node};
pub use wire::{LeveledMessage, LogEntryMessage, RawMessage, WireTimestamp};
