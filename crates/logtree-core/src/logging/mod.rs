//! Bridging `tracing` into a log tree.
//!
//! ## Usage
//!
//! ```ignore
//! use logtree_core::{logging::LogTreeLayer, LogTree};
//! use tracing_subscriber::prelude::*;
//!
//! let tree = LogTree::new();
//! let subscriber = tracing_subscriber::registry()
//!     .with(LogTreeLayer::with_prefix(tree.clone(), "rust")?)
//!     .with(tracing_subscriber::fmt::layer());
//!
//! tracing::subscriber::set_global_default(subscriber)?;
//!
//! // Lands at `rust.my_app.net` as a WARNING entry.
//! tracing::warn!(target: "my_app::net", "link down");
//! ```

pub mod layer;

pub use layer::LogTreeLayer;
