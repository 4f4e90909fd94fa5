//! Log entry types.
//!
//! Every entry combines leveled and raw logging into a single stream of
//! events: a [`LogEntry`] carries its origin DN and exactly one [`Payload`].

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::dn::Dn;
use crate::linebuffer::Line;
use crate::severity::Severity;

/// A committed log event. Entries are immutable once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// DN of the logger this entry was emitted to.
    pub dn: Dn,
    pub payload: Payload,
}

/// The kind-specific body of a [`LogEntry`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Leveled(LeveledPayload),
    Raw(Line),
}

impl LogEntry {
    pub fn leveled(&self) -> Option<&LeveledPayload> {
        match &self.payload {
            Payload::Leveled(p) => Some(p),
            Payload::Raw(_) => None,
        }
    }

    pub fn raw(&self) -> Option<&Line> {
        match &self.payload {
            Payload::Raw(l) => Some(l),
            Payload::Leveled(_) => None,
        }
    }

    /// The message text of this entry, lines joined by `\n`.
    pub fn message(&self) -> String {
        match &self.payload {
            Payload::Leveled(p) => p.messages_joined(),
            Payload::Raw(l) => l.data.clone(),
        }
    }
}

/// A leveled (glog-style) log record.
#[derive(Debug, Clone, PartialEq)]
pub struct LeveledPayload {
    /// The logged message, split on newlines.
    pub(crate) messages: Vec<String>,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) severity: Severity,
    /// File name of the caller that emitted this message.
    pub(crate) file: String,
    pub(crate) line: u32,
}

impl LeveledPayload {
    /// Build a payload from a message emitted by a native producer.
    ///
    /// Leading and trailing newlines are stripped before the message is split,
    /// so `"one\ntwo\n"` becomes `["one", "two"]`.
    pub(crate) fn from_message(
        severity: Severity,
        message: &str,
        file: &str,
        line: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            messages: message
                .trim_matches('\n')
                .split('\n')
                .map(str::to_string)
                .collect(),
            timestamp,
            severity,
            file: file_name(file).to_string(),
            line,
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn messages_joined(&self) -> String {
        self.messages.join("\n")
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Source location as `file:line`.
    pub fn location(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }

    /// glog-style prefix (`I1102 17:20:06.921395 foo.rs:42] `) and the
    /// message lines it applies to.
    pub fn strings(&self) -> (String, &[String]) {
        let ts = self.timestamp;
        let prefix = format!(
            "{}{:02}{:02} {:02}:{:02}:{:02}.{:06} {}:{}] ",
            self.severity.as_char(),
            ts.month(),
            ts.day(),
            ts.hour(),
            ts.minute(),
            ts.second(),
            ts.nanosecond() / 1000 % 1_000_000,
            self.file,
            self.line,
        );
        (prefix, &self.messages)
    }
}

/// Strip directories and drive prefixes from a source path, keeping the file
/// name. The result never contains `:`, which delimits wire locations.
fn file_name(path: &str) -> &str {
    path.rsplit(|c: char| matches!(c, '/' | '\\' | ':'))
        .next()
        .unwrap_or(path)
}

/// A leveled payload received from an external source, eg. parsed from the
/// output of a third-party program.
///
/// External data is sanitized into a [`LeveledPayload`] before it reaches the
/// journal, so that buggy emitters or converters cannot pollute the tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalLeveledPayload {
    /// Log message. Newlines split it into multiple lines; empty lines are
    /// kept verbatim.
    pub message: String,
    /// When the source emitted this payload. Missing or zero (the Unix epoch)
    /// means the conversion time.
    pub timestamp: Option<DateTime<Utc>>,
    /// Severity as reported by the source (`I`, `WARNING`, ...). Defaults to
    /// INFO when missing or unrecognized.
    pub severity: Option<String>,
    /// Originating file, reduced to its file name. Defaults to `unknown`.
    pub file: Option<String>,
    /// Line in `file`. Zero means unknown; negative values are clamped to it.
    pub line: i64,
}

impl ExternalLeveledPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub(crate) fn sanitize(&self) -> LeveledPayload {
        let severity = self
            .severity
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Severity::Info);
        let file = match self.file.as_deref().map(file_name) {
            Some(f) if !f.is_empty() => f.to_string(),
            _ => "unknown".to_string(),
        };
        LeveledPayload {
            messages: self.message.split('\n').map(str::to_string).collect(),
            timestamp: self
                .timestamp
                .filter(|ts| ts.timestamp() != 0 || ts.timestamp_subsec_nanos() != 0)
                .unwrap_or_else(Utc::now),
            severity,
            file,
            line: u32::try_from(self.line.max(0)).unwrap_or(u32::MAX),
        }
    }
}
