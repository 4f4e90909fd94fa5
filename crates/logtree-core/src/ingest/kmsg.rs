//! Kernel log ingestion from `/dev/kmsg`.
//!
//! Each read from `/dev/kmsg` returns one record of the form
//! `<level>,<seq>,<usec>,<flags>[,...];<message>\n`, optionally followed by
//! continuation lines which are ignored here.

use std::fmt;
use std::io::{self, Read};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::entry::LeveledPayload;
use crate::error::{LogTreeError, LogTreeResult};
use crate::leveled::LeveledLogger;
use crate::severity::Severity;

/// Largest record the kernel emits (`PRINTK_MESSAGE_MAX`).
const KMSG_RECORD_MAX: usize = 2048;

/// Why a kmsg record could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KmsgParseError {
    #[error("record has no ';' separator")]
    MissingSeparator,
    #[error("record message is not newline-terminated")]
    Unterminated,
    #[error("record has {0} metadata fields, expected at least 4")]
    MissingFields(usize),
    #[error("invalid log level {0:?}")]
    Level(String),
    #[error("invalid timestamp {0:?}")]
    Timestamp(String),
}

/// Parse one kmsg record.
///
/// Records carry a `CLOCK_MONOTONIC_RAW` timestamp. It is placed on the wall
/// clock by its distance from `monotonic_now`, the same clock read at `now`.
/// Syslog levels map to severities as 0-1 FATAL, 2-3 ERROR, 4 WARNING and
/// anything else INFO.
pub fn parse_kmsg(
    now: DateTime<Utc>,
    monotonic_now: Duration,
    record: &[u8],
) -> Result<LeveledPayload, KmsgParseError> {
    let sep = record
        .iter()
        .position(|&b| b == b';')
        .ok_or(KmsgParseError::MissingSeparator)?;
    let (meta, message) = (&record[..sep], &record[sep + 1..]);
    let end = message
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(KmsgParseError::Unterminated)?;
    let message = String::from_utf8_lossy(&message[..end]).into_owned();

    let meta = String::from_utf8_lossy(meta);
    let fields: Vec<&str> = meta.split(',').filter(|f| !f.is_empty()).collect();
    if fields.len() < 4 {
        return Err(KmsgParseError::MissingFields(fields.len()));
    }
    let level: u64 = fields[0]
        .parse()
        .map_err(|_| KmsgParseError::Level(fields[0].to_string()))?;
    let usec = fields[2]
        .parse::<u64>()
        .ok()
        .and_then(|u| i64::try_from(u).ok())
        .ok_or_else(|| KmsgParseError::Timestamp(fields[2].to_string()))?;

    let since_boot = i64::try_from(monotonic_now.as_micros()).unwrap_or(i64::MAX);
    let timestamp = now
        .checked_add_signed(chrono::Duration::microseconds(usec.saturating_sub(since_boot)))
        .ok_or_else(|| KmsgParseError::Timestamp(fields[2].to_string()))?;

    let severity = match level {
        0 | 1 => Severity::Fatal,
        2 | 3 => Severity::Error,
        4 => Severity::Warning,
        _ => Severity::Info,
    };

    Ok(LeveledPayload {
        messages: vec![message],
        timestamp,
        severity,
        file: "kmsg".to_string(),
        line: 0,
    })
}

/// Reads of the raw monotonic clock.
pub type MonotonicClock = fn() -> io::Result<Duration>;

#[cfg(target_os = "linux")]
fn monotonic_raw() -> io::Result<Duration> {
    use nix::time::{clock_gettime, ClockId};

    let ts = clock_gettime(ClockId::CLOCK_MONOTONIC_RAW)?;
    Ok(Duration::new(ts.tv_sec() as u64, ts.tv_nsec() as u32))
}

#[cfg(not(target_os = "linux"))]
fn monotonic_raw() -> io::Result<Duration> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "CLOCK_MONOTONIC_RAW is only available on Linux",
    ))
}

/// Pumps kernel log records into a leveled logger.
///
/// [`run`](KmsgPipe::run) blocks on reads; from async code, drive it with
/// `tokio::task::spawn_blocking`. Cancellation is checked after every read.
pub struct KmsgPipe<R> {
    reader: R,
    logger: LeveledLogger,
    cancel: CancellationToken,
    clock: MonotonicClock,
    last_overflow: Option<Instant>,
}

#[cfg(target_os = "linux")]
impl KmsgPipe<std::fs::File> {
    /// Pipe the running kernel's log from `/dev/kmsg`.
    pub fn open(logger: LeveledLogger, cancel: CancellationToken) -> LogTreeResult<Self> {
        let file = std::fs::File::open("/dev/kmsg")?;
        Ok(Self::new(file, logger, cancel))
    }
}

impl<R: Read> KmsgPipe<R> {
    pub fn new(reader: R, logger: LeveledLogger, cancel: CancellationToken) -> Self {
        Self {
            reader,
            logger,
            cancel,
            clock: monotonic_raw,
            last_overflow: None,
        }
    }

    /// Replace the monotonic clock, eg. for records that were not produced by
    /// the running kernel.
    pub fn with_clock(mut self, clock: MonotonicClock) -> Self {
        self.clock = clock;
        self
    }

    /// Read records until cancelled or the reader is exhausted.
    pub fn run(mut self) -> LogTreeResult<()> {
        let mut buf = vec![0u8; KMSG_RECORD_MAX];
        debug!(dn = %self.logger.dn(), "Starting kmsg pipe");
        loop {
            let res = self.reader.read(&mut buf);
            if self.cancel.is_cancelled() {
                debug!(dn = %self.logger.dn(), "kmsg pipe cancelled");
                return Ok(());
            }
            let n = match res {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    // EPIPE: the ring buffer overwrote records we had not read yet.
                    self.report_overflow();
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(LogTreeError::Io(e)),
            };
            let monotonic_now = (self.clock)()?;
            match parse_kmsg(Utc::now(), monotonic_now, &buf[..n]) {
                Ok(payload) => self.logger.append_payload(payload),
                Err(e) => debug!(error = %e, "Skipping unparseable kmsg record"),
            }
        }
    }

    /// At most one warning per second.
    fn report_overflow(&mut self) {
        let now = Instant::now();
        if self
            .last_overflow
            .is_some_and(|last| now.duration_since(last) < Duration::from_secs(1))
        {
            return;
        }
        self.last_overflow = Some(now);
        warn!(dn = %self.logger.dn(), "kmsg ring buffer overflow");
        self.logger
            .warning("Lost messages due to kernel ring buffer overflow");
    }
}

impl<R> fmt::Debug for KmsgPipe<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmsgPipe")
            .field("logger", &self.logger)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
