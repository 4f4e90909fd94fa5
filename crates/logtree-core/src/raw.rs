//! Raw (unstructured) line publishing.

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::dn::Dn;
use crate::error::LogTreeResult;
use crate::tree::Node;

/// Byte-stream writer whose completed lines become raw entries.
///
/// Every writer for the same DN feeds one shared line buffer, so partial
/// lines from clones are joined. Closing any of them flushes the pending
/// partial line and closes the buffer for all.
///
/// ```
/// use std::io::Write;
/// let tree = logtree_core::LogTree::new();
/// let mut raw = tree.raw_for("proc.stdout").unwrap();
/// raw.write_all(b"first\nsecond").unwrap();
/// raw.close().unwrap();
/// ```
#[derive(Clone)]
pub struct RawWriter {
    node: Arc<Node>,
}

impl RawWriter {
    pub(crate) fn new(node: Arc<Node>) -> Self {
        Self { node }
    }

    pub fn dn(&self) -> &Dn {
        self.node.dn()
    }

    /// Feed bytes, committing one entry per completed line.
    pub fn write_bytes(&self, data: &[u8]) -> LogTreeResult<usize> {
        self.node.raw.lock().write(data)
    }

    /// Flush the pending partial line and close the DN's raw stream.
    pub fn close(&self) -> LogTreeResult<()> {
        self.node.raw.lock().close()
    }

    pub fn is_closed(&self) -> bool {
        self.node.raw.lock().is_closed()
    }
}

impl io::Write for RawWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for RawWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawWriter").field("dn", self.dn()).finish()
    }
}
