//! Tracing Layer that records events into a log tree.
//!
//! Each event lands at a DN derived from its target, so `my_app::net::dhcp`
//! becomes `my_app.net.dhcp` (below an optional prefix). Levels map to
//! severities as ERROR → ERROR, WARN → WARNING and INFO → INFO. DEBUG and
//! TRACE are verbose INFO, recorded only if the node's verbosity is at least
//! 1 or 2 respectively.

use std::fmt::Write as FmtWrite;

use chrono::Utc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::dn::Dn;
use crate::entry::LeveledPayload;
use crate::error::LogTreeResult;
use crate::severity::{Severity, VerbosityLevel};
use crate::tree::LogTree;

/// Events from this crate are never recorded: they are emitted while the
/// journal is locked.
const OWN_TARGET: &str = "logtree_core";

/// A tracing Layer that appends events as leveled entries.
pub struct LogTreeLayer {
    tree: LogTree,
    prefix: Dn,
}

impl LogTreeLayer {
    /// Record events at DNs derived from their targets, directly below the
    /// root.
    pub fn new(tree: LogTree) -> Self {
        Self {
            tree,
            prefix: Dn::root(),
        }
    }

    /// Record events below `prefix` instead of the root.
    pub fn with_prefix(tree: LogTree, prefix: impl AsRef<str>) -> LogTreeResult<Self> {
        Ok(Self {
            tree,
            prefix: Dn::new(prefix)?,
        })
    }

    /// DN an event with this target is recorded at.
    pub fn dn_for_target(&self, target: &str) -> Dn {
        let mut dn = self.prefix.clone();
        for segment in target.split("::").flat_map(|s| s.split('.')) {
            let segment: String = segment
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            if let Ok(child) = dn.child(&segment) {
                dn = child;
            }
        }
        dn
    }
}

/// Severity and minimum node verbosity for a tracing level.
fn map_level(level: &Level) -> (Severity, VerbosityLevel) {
    if *level == Level::ERROR {
        (Severity::Error, 0)
    } else if *level == Level::WARN {
        (Severity::Warning, 0)
    } else if *level == Level::INFO {
        (Severity::Info, 0)
    } else if *level == Level::DEBUG {
        (Severity::Info, 1)
    } else {
        (Severity::Info, 2)
    }
}

impl<S> Layer<S> for LogTreeLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();
        if target == OWN_TARGET || target.starts_with("logtree_core::") {
            return;
        }

        let (severity, verbosity) = map_level(metadata.level());
        let Ok(node) = self.tree.resolve(self.dn_for_target(target)) else {
            return;
        };
        if node.verbosity() < verbosity {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let mut message = visitor.message.unwrap_or_default();
        if let Some(scope) = ctx.event_scope(event) {
            let spans: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            if !spans.is_empty() {
                message = format!("{}: {}", spans.join(" > "), message);
            }
        }
        message.push_str(&visitor.fields);

        let payload = LeveledPayload::from_message(
            severity,
            &message,
            metadata.file().unwrap_or("unknown"),
            metadata.line().unwrap_or(0),
            Utc::now(),
        );
        crate::leveled::LeveledLogger::new(node).append_payload(payload);
    }
}

/// Visitor collecting the message and rendering other fields as ` key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        let _ = write!(self.fields, " {}={}", field.name(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Backlog, ReadOption};
    use tracing_subscriber::prelude::*;

    fn messages(tree: &LogTree, dn: &str) -> Vec<(Severity, String)> {
        tree.read(dn, &[ReadOption::WithChildren, ReadOption::WithBacklog(Backlog::All)])
            .unwrap()
            .backlog
            .iter()
            .map(|e| (e.leveled().unwrap().severity(), e.message()))
            .collect()
    }

    #[test]
    fn test_dn_for_target() {
        let layer = LogTreeLayer::with_prefix(LogTree::new(), "rust").unwrap();
        assert_eq!(layer.dn_for_target("my_app::net::dhcp").as_str(), "rust.my_app.net.dhcp");
        assert_eq!(layer.dn_for_target("weird target!").as_str(), "rust.weird_target_");
        assert_eq!(layer.dn_for_target("a::::b").as_str(), "rust.a.b");
    }

    #[test]
    fn test_layer_captures_events() {
        let tree = LogTree::new();
        let subscriber = tracing_subscriber::registry().with(LogTreeLayer::new(tree.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "app::db", "connected");
            tracing::warn!(target: "app::db", count = 42, "slow query");
            tracing::error!(target: "app", "boom");
            tracing::debug!(target: "app::db", "hidden");
        });

        assert_eq!(
            messages(&tree, "app"),
            vec![
                (Severity::Info, "connected".to_string()),
                (Severity::Warning, "slow query count=42".to_string()),
                (Severity::Error, "boom".to_string()),
            ]
        );
    }

    #[test]
    fn test_debug_follows_verbosity() {
        let tree = LogTree::new();
        tree.set_verbosity("app", 1).unwrap();
        let subscriber = tracing_subscriber::registry().with(LogTreeLayer::new(tree.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(target: "app", "shown");
            tracing::trace!(target: "app", "still hidden");
        });

        assert_eq!(messages(&tree, "app"), vec![(Severity::Info, "shown".to_string())]);
    }

    #[test]
    fn test_span_names_prefix_message() {
        let tree = LogTree::new();
        let subscriber = tracing_subscriber::registry().with(LogTreeLayer::new(tree.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("startup");
            let _guard = span.enter();
            tracing::info!(target: "app", "ready");
        });

        assert_eq!(
            messages(&tree, "app"),
            vec![(Severity::Info, "startup: ready".to_string())]
        );
    }

    #[test]
    fn test_own_events_ignored() {
        let tree = LogTree::new();
        let subscriber = tracing_subscriber::registry().with(LogTreeLayer::new(tree.clone()));

        tracing::subscriber::with_default(subscriber, || {
            // Emits debug events from inside the journal lock.
            tree.leveled_for("x").unwrap().info("direct");
            tree.read("x", &[ReadOption::WithStream]).unwrap();
        });

        assert_eq!(tree.stats().dns, 1);
    }
}
