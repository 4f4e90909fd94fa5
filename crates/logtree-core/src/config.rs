//! Tree-wide configuration.

use serde::Deserialize;

use crate::journal::DEFAULT_QUOTA;
use crate::linebuffer::DEFAULT_MAX_LINE_LENGTH;

/// Default capacity of a streaming reader's channel.
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 128;

/// Configuration for a [`LogTree`](crate::LogTree).
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// # use logtree_core::LogTreeConfig;
/// let config: LogTreeConfig = serde_json::from_str(r#"{"default_quota": 64}"#).unwrap();
/// assert_eq!(config.default_quota, 64);
/// assert_eq!(config.stream_buffer_size, 128);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogTreeConfig {
    /// Entries retained per DN unless overridden with `set_quota`.
    pub default_quota: usize,
    /// Channel capacity of streaming readers that do not pick their own.
    pub stream_buffer_size: usize,
    /// Maximum length of a raw line before it is truncated.
    pub raw_line_length: usize,
}

impl Default for LogTreeConfig {
    fn default() -> Self {
        Self {
            default_quota: DEFAULT_QUOTA,
            stream_buffer_size: DEFAULT_STREAM_BUFFER_SIZE,
            raw_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl LogTreeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_quota(mut self, quota: usize) -> Self {
        self.default_quota = quota;
        self
    }

    pub fn with_stream_buffer_size(mut self, size: usize) -> Self {
        self.stream_buffer_size = size;
        self
    }

    pub fn with_raw_line_length(mut self, length: usize) -> Self {
        self.raw_line_length = length;
        self
    }
}
