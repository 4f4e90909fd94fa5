//! Adapters feeding output of external sources into a tree.

pub mod klog;
pub mod kmsg;
pub mod unraw;

pub use klog::{parse_klog, InvalidLinePolicy, KlogParseError, KlogParser};
pub use kmsg::{parse_kmsg, KmsgParseError, KmsgPipe, MonotonicClock};
pub use unraw::{Converter, LeveledWriter};
