//! Ingestion of glog/klog-formatted output from external programs.
//!
//! Lines look like
//!
//! ```text
//! I0312 14:20:04.240540     204 shared_informer.go:247] Caches are synced
//! ```
//!
//! The format carries no year, so it is inferred from the time of parsing.
//! V-levels are not part of the format: anything the emitter logs as info is
//! ingested as INFO.

use std::fmt;
use std::io;
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Utc};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::entry::LeveledPayload;
use crate::error::LogTreeResult;
use crate::leveled::LeveledLogger;
use crate::linebuffer::{Line, LineBuffer, DEFAULT_MAX_LINE_LENGTH};
use crate::severity::Severity;

/// Why a line could not be parsed as klog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KlogParseError {
    #[error("line does not match the klog format")]
    Format,
    #[error("invalid timestamp {0:?}")]
    Timestamp(String),
    #[error("timestamp {0} is too far in the future")]
    Future(DateTime<Utc>),
    #[error("invalid line number {0:?}")]
    LineNumber(String),
}

fn klog_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([IEWF])(\d{4})\s+(\d{2}:\d{2}:\d{2}(\.\d+)?)\s+(\d+)\s+([^:]+):(\d+)]\s+(.+)$")
            .expect("klog regex is valid")
    })
}

/// Parse a single klog line as seen at `now`.
///
/// The year of `now` is assumed. A timestamp more than an hour in the future
/// that lies within two days of one year from now was logged late last year
/// and is re-parsed with the previous year; any other future timestamp is
/// rejected.
pub fn parse_klog(now: DateTime<Utc>, line: &str) -> Result<LeveledPayload, KlogParseError> {
    let caps = klog_regex().captures(line).ok_or(KlogParseError::Format)?;
    let severity = caps[1]
        .chars()
        .next()
        .and_then(Severity::from_char)
        .ok_or(KlogParseError::Format)?;
    let date = &caps[2];
    let time = &caps[3];
    let file = &caps[6];
    let line_number = &caps[7];
    let message = &caps[8];

    let year = now.year();
    let mut ts = parse_klog_time(year, date, time)?;
    if ts > now && ts - now > Duration::hours(1) {
        let one_year_from_now = now + Duration::days(365);
        if (ts - one_year_from_now).abs() < Duration::days(2) {
            ts = parse_klog_time(year - 1, date, time)?;
        } else {
            return Err(KlogParseError::Future(ts));
        }
    }

    let line_number = line_number
        .parse::<u32>()
        .map_err(|_| KlogParseError::LineNumber(line_number.to_string()))?;

    Ok(LeveledPayload {
        messages: vec![message.to_string()],
        timestamp: ts,
        severity,
        file: file.to_string(),
        line: line_number,
    })
}

/// Parse `MMDD` and `HH:MM:SS[.f]` at the given year, as UTC.
fn parse_klog_time(year: i32, date: &str, time: &str) -> Result<DateTime<Utc>, KlogParseError> {
    let s = format!("{year} {date} {time}");
    let format = if time.contains('.') {
        "%Y %m%d %H:%M:%S%.f"
    } else {
        "%Y %m%d %H:%M:%S"
    };
    NaiveDateTime::parse_from_str(&s, format)
        .map(|naive| naive.and_utc())
        .map_err(|_| KlogParseError::Timestamp(format!("{date} {time}")))
}

/// What [`KlogParser`] does with lines that are not valid klog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvalidLinePolicy {
    /// Log an ERROR entry quoting the line.
    #[default]
    Report,
    /// Store the line as a raw entry at the same DN.
    Raw,
    /// Discard the line.
    Drop,
}

/// Writer that parses klog output and logs it as if it was emitted locally.
///
/// `close` must be called once the source is done, to parse a final line
/// lacking a newline.
pub struct KlogParser {
    buffer: LineBuffer<Box<dyn FnMut(Line) + Send>>,
    policy: InvalidLinePolicy,
}

impl KlogParser {
    pub fn new(logger: LeveledLogger) -> Self {
        Self::with_policy(logger, InvalidLinePolicy::default())
    }

    pub fn with_policy(logger: LeveledLogger, policy: InvalidLinePolicy) -> Self {
        let consume: Box<dyn FnMut(Line) + Send> = Box::new(move |line: Line| {
            let err = match parse_klog(Utc::now(), &line.data) {
                Ok(payload) => return logger.append_payload(payload),
                Err(e) => e,
            };
            debug!(dn = %logger.dn(), error = %err, ?policy, "Invalid klog line");
            match policy {
                InvalidLinePolicy::Report => {
                    logger.error(format_args!("Invalid klog line: {}", line.data))
                }
                InvalidLinePolicy::Raw => logger.append_raw(line),
                InvalidLinePolicy::Drop => {}
            }
        });
        Self {
            buffer: LineBuffer::new(DEFAULT_MAX_LINE_LENGTH, consume),
            policy,
        }
    }

    pub fn policy(&self) -> InvalidLinePolicy {
        self.policy
    }

    pub fn close(&mut self) -> LogTreeResult<()> {
        self.buffer.close()
    }
}

impl io::Write for KlogParser {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .write(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for KlogParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KlogParser")
            .field("buffer", &self.buffer)
            .field("policy", &self.policy)
            .finish()
    }
}
