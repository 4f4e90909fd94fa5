//! Conversion of unstructured text into leveled entries with a custom parser.

use std::fmt;
use std::io;

use crate::entry::ExternalLeveledPayload;
use crate::error::LogTreeResult;
use crate::leveled::LeveledLogger;
use crate::linebuffer::{Line, LineBuffer, DEFAULT_MAX_LINE_LENGTH};

/// Handed to a converter's parser to emit leveled payloads for a line.
pub struct LeveledWriter<'a> {
    logger: &'a LeveledLogger,
    emitted: usize,
}

impl LeveledWriter<'_> {
    /// Emit one payload. Missing fields get defaults when it is sanitized.
    pub fn emit(&mut self, payload: &ExternalLeveledPayload) {
        self.logger.log_external(payload);
        self.emitted += 1;
    }

    /// Payloads emitted for the current line so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

/// An `io::Write` that splits input into lines and hands each to a parser,
/// which may emit any number of leveled payloads for it, including none.
///
/// ```
/// use std::io::Write;
/// use logtree_core::{Converter, ExternalLeveledPayload, LogTree};
///
/// let tree = LogTree::new();
/// let mut converter = Converter::new(tree.leveled_for("ext").unwrap(), |line, out| {
///     if let Some(rest) = line.data.strip_prefix("ERR ") {
///         let mut payload = ExternalLeveledPayload::new(rest);
///         payload.severity = Some("E".into());
///         out.emit(&payload);
///     }
/// });
/// converter.write_all(b"ERR disk failed\nnoise\n").unwrap();
/// assert_eq!(tree.stats().entries, 1);
/// ```
pub struct Converter {
    buffer: LineBuffer<Box<dyn FnMut(Line) + Send>>,
}

impl Converter {
    pub fn new<P>(logger: LeveledLogger, parser: P) -> Self
    where
        P: FnMut(&Line, &mut LeveledWriter<'_>) + Send + 'static,
    {
        Self::with_max_line_length(logger, DEFAULT_MAX_LINE_LENGTH, parser)
    }

    /// Lines longer than `max_line_length` are truncated before parsing.
    pub fn with_max_line_length<P>(logger: LeveledLogger, max_line_length: usize, mut parser: P) -> Self
    where
        P: FnMut(&Line, &mut LeveledWriter<'_>) + Send + 'static,
    {
        let consume: Box<dyn FnMut(Line) + Send> = Box::new(move |line: Line| {
            let mut writer = LeveledWriter {
                logger: &logger,
                emitted: 0,
            };
            parser(&line, &mut writer);
        });
        Self {
            buffer: LineBuffer::new(max_line_length, consume),
        }
    }

    /// Parse a pending partial line and refuse further input.
    pub fn close(&mut self) -> LogTreeResult<()> {
        self.buffer.close()
    }
}

impl io::Write for Converter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .write(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("buffer", &self.buffer)
            .finish()
    }
}
