//! Live subscribers fed by the journal on every append.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::filter::FilterChain;
use crate::entry::LogEntry;

/// Journal-side half of a subscription.
pub(crate) struct Subscriber {
    filters: FilterChain,
    sender: mpsc::Sender<Arc<LogEntry>>,
    cancel: CancellationToken,
    missed: Arc<AtomicU64>,
}

/// Reader-side half of a subscription.
pub(crate) struct SubscriberHandle {
    pub(crate) receiver: mpsc::Receiver<Arc<LogEntry>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) missed: Arc<AtomicU64>,
}

impl Subscriber {
    pub(crate) fn new(filters: FilterChain, buffer_size: usize) -> (Self, SubscriberHandle) {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let cancel = CancellationToken::new();
        let missed = Arc::new(AtomicU64::new(0));
        let subscriber = Self {
            filters,
            sender,
            cancel: cancel.clone(),
            missed: missed.clone(),
        };
        let handle = SubscriberHandle {
            receiver,
            cancel,
            missed,
        };
        (subscriber, handle)
    }

    /// Offer an entry without blocking. Returns false once this subscriber
    /// should be removed from the registry, which drops the sender and closes
    /// the reader's channel.
    pub(crate) fn deliver(&self, entry: &Arc<LogEntry>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if !self.filters.matches(entry) {
            return true;
        }
        match self.sender.try_send(entry.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let missed = self.missed.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(dn = %entry.dn, missed, "Subscriber channel full, dropping entry");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}
