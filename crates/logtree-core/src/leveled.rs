//! Leveled (glog-style) publishing.
//!
//! Each call records the severity, the emission time and the caller's source
//! location. Messages take anything implementing [`Display`], so formatted
//! logging is `logger.info(format_args!("took {}ms", ms))`.

use std::fmt::{self, Display};
use std::panic::Location;
use std::sync::Arc;

use chrono::Utc;

use crate::dn::Dn;
use crate::entry::{ExternalLeveledPayload, LeveledPayload, LogEntry, Payload};
use crate::linebuffer::Line;
use crate::severity::{Severity, VerbosityLevel};
use crate::tree::Node;

/// Leveled logging handle for one DN. Cheap to clone.
#[derive(Clone)]
pub struct LeveledLogger {
    node: Arc<Node>,
}

impl LeveledLogger {
    pub(crate) fn new(node: Arc<Node>) -> Self {
        Self { node }
    }

    pub fn dn(&self) -> &Dn {
        self.node.dn()
    }

    #[track_caller]
    pub fn info(&self, msg: impl Display) {
        self.emit(Severity::Info, &msg, Location::caller());
    }

    #[track_caller]
    pub fn warning(&self, msg: impl Display) {
        self.emit(Severity::Warning, &msg, Location::caller());
    }

    #[track_caller]
    pub fn error(&self, msg: impl Display) {
        self.emit(Severity::Error, &msg, Location::caller());
    }

    /// Record a FATAL entry. The process keeps running; terminating is left
    /// to the caller.
    #[track_caller]
    pub fn fatal(&self, msg: impl Display) {
        self.emit(Severity::Fatal, &msg, Location::caller());
    }

    #[track_caller]
    pub fn log(&self, severity: Severity, msg: impl Display) {
        self.emit(severity, &msg, Location::caller());
    }

    /// A logger that only emits if this node's verbosity is at least `level`.
    ///
    /// The gate is evaluated now, not when the returned logger is used.
    pub fn v(&self, level: VerbosityLevel) -> VerboseLogger<'_> {
        VerboseLogger {
            logger: self,
            enabled: self.node.verbosity() >= level,
        }
    }

    /// Record a payload from an external source after sanitizing it.
    pub fn log_external(&self, payload: &ExternalLeveledPayload) {
        self.append_payload(payload.sanitize());
    }

    fn emit(&self, severity: Severity, msg: &dyn Display, location: &Location<'_>) {
        let payload = LeveledPayload::from_message(
            severity,
            &msg.to_string(),
            location.file(),
            location.line(),
            Utc::now(),
        );
        self.append_payload(payload);
    }

    /// Commit an already-built payload, bypassing caller capture.
    pub(crate) fn append_payload(&self, payload: LeveledPayload) {
        self.append(Payload::Leveled(payload));
    }

    /// Commit a raw line at this logger's DN.
    pub(crate) fn append_raw(&self, line: Line) {
        self.append(Payload::Raw(line));
    }

    fn append(&self, payload: Payload) {
        self.node.journal.append(LogEntry {
            dn: self.node.dn().clone(),
            payload,
        });
    }
}

impl fmt::Debug for LeveledLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeveledLogger")
            .field("dn", self.dn())
            .finish()
    }
}

/// Verbosity-gated logger returned by [`LeveledLogger::v`].
#[derive(Debug, Clone, Copy)]
pub struct VerboseLogger<'a> {
    logger: &'a LeveledLogger,
    enabled: bool,
}

impl VerboseLogger<'_> {
    /// Whether calls on this logger produce entries. Useful to skip building
    /// expensive messages.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Record an INFO entry if enabled.
    #[track_caller]
    pub fn info(&self, msg: impl Display) {
        if self.enabled {
            self.logger.emit(Severity::Info, &msg, Location::caller());
        }
    }
}
