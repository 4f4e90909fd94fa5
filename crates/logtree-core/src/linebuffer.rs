//! Line splitting for raw byte streams.
//!
//! [`LineBuffer`] turns arbitrary writes into discrete [`Line`]s, each capped
//! at a maximum length so that a producer that never emits a newline cannot
//! grow memory without bound.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

use crate::error::{LogTreeError, LogTreeResult};

/// Default maximum line length for raw loggers and ingestion adapters.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

/// A single line of text, possibly truncated to fit a length limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Displayed content, at most the buffer's maximum line length in bytes.
    pub data: String,
    /// Length in bytes of the line as originally written.
    pub original_length: usize,
}

impl Line {
    pub fn new(data: impl Into<String>) -> Self {
        let data = data.into();
        let original_length = data.len();
        Self {
            data,
            original_length,
        }
    }

    /// Whether this line was truncated to fit limits.
    pub fn truncated(&self) -> bool {
        self.original_length > self.data.len()
    }
}

impl fmt::Display for Line {
    /// Renders the data, followed by an ellipsis if the line was truncated.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.truncated() {
            write!(f, "{}...", self.data)
        } else {
            f.write_str(&self.data)
        }
    }
}

/// Splits written bytes into lines and hands every completed line to a
/// callback.
///
/// The callback must not write back into the same buffer.
pub struct LineBuffer<F> {
    max_line_length: usize,
    callback: F,
    current: Vec<u8>,
    /// Bytes written to the current line so far, including truncated ones.
    length: usize,
    closed: bool,
}

impl<F: FnMut(Line)> LineBuffer<F> {
    pub fn new(max_line_length: usize, callback: F) -> Self {
        Self {
            max_line_length,
            callback,
            current: Vec::new(),
            length: 0,
            closed: false,
        }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Feed bytes into the buffer, emitting one line per `\n` seen.
    ///
    /// A trailing partial line is kept until more data or [`close`] arrives.
    ///
    /// [`close`]: LineBuffer::close
    pub fn write(&mut self, data: &[u8]) -> LogTreeResult<usize> {
        if self.closed {
            return Err(LogTreeError::AlreadyClosed);
        }

        let mut rest = data;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.write_limited(&rest[..pos]);
            self.commit_line();
            rest = &rest[pos + 1..];
        }
        self.write_limited(rest);

        Ok(data.len())
    }

    /// Flush a pending partial line and refuse further writes.
    pub fn close(&mut self) -> LogTreeResult<()> {
        if self.closed {
            return Err(LogTreeError::AlreadyClosed);
        }
        self.closed = true;
        if self.length > 0 {
            self.commit_line();
        }
        Ok(())
    }

    fn write_limited(&mut self, data: &[u8]) {
        self.length += data.len();
        let room = self.max_line_length.saturating_sub(self.current.len());
        let take = data.len().min(room);
        self.current.extend_from_slice(&data[..take]);
    }

    fn commit_line(&mut self) {
        let mut bytes = std::mem::take(&mut self.current);
        if self.length > bytes.len() {
            // Truncation may have split a multi-byte character.
            if let Err(e) = std::str::from_utf8(&bytes) {
                if e.error_len().is_none() {
                    bytes.truncate(e.valid_up_to());
                }
            }
        }
        let line = Line {
            data: String::from_utf8_lossy(&bytes).into_owned(),
            original_length: self.length,
        };
        self.length = 0;
        (self.callback)(line);
    }
}

impl<F: FnMut(Line)> io::Write for LineBuffer<F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        LineBuffer::write(self, buf).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<F> fmt::Debug for LineBuffer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineBuffer")
            .field("max_line_length", &self.max_line_length)
            .field("pending", &self.length)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn collector(max: usize) -> (LineBuffer<impl FnMut(Line)>, Rc<RefCell<Vec<Line>>>) {
        let lines = Rc::new(RefCell::new(Vec::new()));
        let sink = lines.clone();
        let buffer = LineBuffer::new(max, move |l| sink.borrow_mut().push(l));
        (buffer, lines)
    }

    #[test]
    fn test_split_across_writes() {
        let (mut buf, lines) = collector(1024);
        buf.write(b"hello ").unwrap();
        buf.write(b"world\nsecond").unwrap();
        assert_eq!(lines.borrow().len(), 1);
        buf.write(b" line\nthird\n").unwrap();

        let got: Vec<_> = lines.borrow().iter().map(|l| l.data.clone()).collect();
        assert_eq!(got, vec!["hello world", "second line", "third"]);
    }

    #[test]
    fn test_empty_lines_kept() {
        let (mut buf, lines) = collector(1024);
        buf.write(b"a\n\nb\n").unwrap();
        let got: Vec<_> = lines.borrow().iter().map(|l| l.data.clone()).collect();
        assert_eq!(got, vec!["a", "", "b"]);
    }

    #[test]
    fn test_truncation() {
        let (mut buf, lines) = collector(8);
        buf.write(b"0123456789abcdef\nshort\n").unwrap();

        let lines = lines.borrow();
        assert_eq!(lines[0].data, "01234567");
        assert_eq!(lines[0].original_length, 16);
        assert!(lines[0].truncated());
        assert_eq!(lines[0].to_string(), "01234567...");

        assert_eq!(lines[1].data, "short");
        assert!(!lines[1].truncated());
        assert_eq!(lines[1].to_string(), "short");
    }

    #[test]
    fn test_truncation_across_writes() {
        let (mut buf, lines) = collector(4);
        buf.write(b"ab").unwrap();
        buf.write(b"cdef").unwrap();
        buf.write(b"gh\n").unwrap();
        assert_eq!(lines.borrow()[0].data, "abcd");
        assert_eq!(lines.borrow()[0].original_length, 8);
    }

    #[test]
    fn test_truncation_on_char_boundary() {
        let (mut buf, lines) = collector(4);
        buf.write("abcé\n".as_bytes()).unwrap();
        assert_eq!(lines.borrow()[0].data, "abc");
        assert_eq!(lines.borrow()[0].original_length, 5);
    }

    #[test]
    fn test_close_flushes_partial_line() {
        let (mut buf, lines) = collector(1024);
        buf.write(b"done\npartial").unwrap();
        assert_eq!(lines.borrow().len(), 1);
        buf.close().unwrap();
        assert_eq!(lines.borrow().len(), 2);
        assert_eq!(lines.borrow()[1].data, "partial");
    }

    #[test]
    fn test_close_without_pending_data() {
        let (mut buf, lines) = collector(1024);
        buf.write(b"done\n").unwrap();
        buf.close().unwrap();
        assert_eq!(lines.borrow().len(), 1);
    }

    #[test]
    fn test_closed_rejects() {
        let (mut buf, _lines) = collector(1024);
        buf.close().unwrap();
        assert!(matches!(buf.write(b"x"), Err(LogTreeError::AlreadyClosed)));
        assert!(matches!(buf.close(), Err(LogTreeError::AlreadyClosed)));
    }
}
