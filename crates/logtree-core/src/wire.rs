//! Transport representation of log entries.
//!
//! A [`LogEntryMessage`] is what ships entries off a node. Unlike
//! [`LogEntry`], it can describe invalid states (no payload, or both), which
//! are rejected when converting back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dn::Dn;
use crate::entry::{LeveledPayload, LogEntry, Payload};
use crate::error::{LogTreeError, LogTreeResult};
use crate::linebuffer::Line;
use crate::severity::Severity;

/// Wire form of a [`LogEntry`]. Exactly one of `leveled` and `raw` must be
/// set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntryMessage {
    pub dn: String,
    #[serde(default)]
    pub leveled: Option<LeveledMessage>,
    #[serde(default)]
    pub raw: Option<RawMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeveledMessage {
    pub lines: Vec<String>,
    pub timestamp: WireTimestamp,
    pub severity: Severity,
    /// `file:line`
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub data: String,
    pub original_length: u64,
}

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTimestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl From<DateTime<Utc>> for WireTimestamp {
    fn from(ts: DateTime<Utc>) -> Self {
        Self {
            seconds: ts.timestamp(),
            nanos: ts.timestamp_subsec_nanos(),
        }
    }
}

impl TryFrom<WireTimestamp> for DateTime<Utc> {
    type Error = LogTreeError;

    fn try_from(ts: WireTimestamp) -> LogTreeResult<Self> {
        DateTime::from_timestamp(ts.seconds, ts.nanos).ok_or_else(|| {
            LogTreeError::Conversion(format!(
                "timestamp out of range: {}s {}ns",
                ts.seconds, ts.nanos
            ))
        })
    }
}

impl From<&LogEntry> for LogEntryMessage {
    fn from(entry: &LogEntry) -> Self {
        let mut msg = Self {
            dn: entry.dn.to_string(),
            leveled: None,
            raw: None,
        };
        match &entry.payload {
            Payload::Leveled(p) => msg.leveled = Some(p.into()),
            Payload::Raw(line) => {
                msg.raw = Some(RawMessage {
                    data: line.data.clone(),
                    original_length: line.original_length as u64,
                })
            }
        }
        msg
    }
}

impl From<&LeveledPayload> for LeveledMessage {
    fn from(p: &LeveledPayload) -> Self {
        Self {
            lines: p.messages().to_vec(),
            timestamp: p.timestamp().into(),
            severity: p.severity(),
            location: p.location(),
        }
    }
}

impl TryFrom<LeveledMessage> for LeveledPayload {
    type Error = LogTreeError;

    fn try_from(msg: LeveledMessage) -> LogTreeResult<Self> {
        let parts: Vec<&str> = msg.location.split(':').collect();
        let [file, line] = parts[..] else {
            return Err(LogTreeError::Conversion(format!(
                "invalid location {:?}, must be two :-delimited parts",
                msg.location
            )));
        };
        let line = line.parse::<u32>().map_err(|e| {
            LogTreeError::Conversion(format!("invalid location line number: {e}"))
        })?;
        Ok(LeveledPayload {
            messages: msg.lines,
            timestamp: msg.timestamp.try_into()?,
            severity: msg.severity,
            file: file.to_string(),
            line,
        })
    }
}

impl TryFrom<RawMessage> for Line {
    type Error = LogTreeError;

    fn try_from(msg: RawMessage) -> LogTreeResult<Self> {
        let original_length = usize::try_from(msg.original_length).map_err(|_| {
            LogTreeError::Conversion("original_length larger than native size".to_string())
        })?;
        if original_length < msg.data.len() {
            return Err(LogTreeError::Conversion(
                "original_length smaller than length of data".to_string(),
            ));
        }
        Ok(Line {
            data: msg.data,
            original_length,
        })
    }
}

impl TryFrom<LogEntryMessage> for LogEntry {
    type Error = LogTreeError;

    fn try_from(msg: LogEntryMessage) -> LogTreeResult<Self> {
        let dn = Dn::new(&msg.dn)?;
        let payload = match (msg.leveled, msg.raw) {
            (Some(leveled), None) => Payload::Leveled(leveled.try_into()?),
            (None, Some(raw)) => Payload::Raw(raw.try_into()?),
            (None, None) => {
                return Err(LogTreeError::Conversion(
                    "message has neither leveled nor raw payload".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(LogTreeError::Conversion(
                    "message has both leveled and raw payload".to_string(),
                ))
            }
        };
        Ok(LogEntry { dn, payload })
    }
}

impl LogEntryMessage {
    /// Encode with postcard.
    pub fn to_bytes(&self) -> LogTreeResult<Vec<u8>> {
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> LogTreeResult<Self> {
        Ok(postcard::from_bytes(bytes)?)
    }

    pub fn to_json(&self) -> LogTreeResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> LogTreeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
