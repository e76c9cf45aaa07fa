//! Path change notifications from a selector to its telemetry consumer.
//!
//! The channel holds a single slot with the latest selection. Publishing never
//! blocks and never fails, so a selector can announce its choice before anyone
//! listens; a slow consumer simply skips to the most recent value.

use std::sync::Arc;

use tokio::sync::watch;

use crate::types::Path;

/// Create a connected publisher/subscriber pair.
pub fn path_channel() -> (PathPublisher, PathSubscriber) {
    let publisher = PathPublisher::new();
    let subscriber = publisher.subscribe();
    (publisher, subscriber)
}

/// Sending half. `None` announces that no path is currently selected.
#[derive(Debug, Clone)]
pub struct PathPublisher {
    tx: Arc<watch::Sender<Option<Path>>>,
}

impl PathPublisher {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the slot's value and wake subscribers.
    pub fn publish(&self, path: Option<Path>) {
        self.tx.send_replace(path);
    }

    /// Attach a new subscriber. A value published before subscribing is
    /// still delivered once.
    pub fn subscribe(&self) -> PathSubscriber {
        let rx = self.tx.subscribe();
        let pending = rx.borrow().is_some();
        PathSubscriber { rx, pending }
    }

    /// The most recently published value.
    pub fn current(&self) -> Option<Path> {
        self.tx.borrow().clone()
    }
}

impl Default for PathPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half.
#[derive(Debug)]
pub struct PathSubscriber {
    rx: watch::Receiver<Option<Path>>,
    pending: bool,
}

impl PathSubscriber {
    /// Wait for a new selection. Returns `false` once every publisher is gone.
    pub async fn changed(&mut self) -> bool {
        if self.pending {
            self.pending = false;
            return true;
        }
        self.rx.changed().await.is_ok()
    }

    /// Take the latest selection, marking it as seen.
    pub fn latest(&mut self) -> Option<Path> {
        self.pending = false;
        self.rx.borrow_and_update().clone()
    }
}
