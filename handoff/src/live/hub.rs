use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use super::query::Collection;

pub const DEFAULT_HUB_CAPACITY: usize = 256;

/// One committed write to a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: Collection,
    /// Hub-wide sequence number, strictly increasing across events.
    pub version: u64,
}

/// Fan-out of change notifications from the write path to live queries.
///
/// Events carry no payload; receivers re-run their query on each one, so a
/// lagged receiver only has to re-fetch once.
#[derive(Debug, Clone)]
pub struct ChangeHub {
    inner: Arc<HubInner>,
}

#[derive(Debug)]
struct HubInner {
    next_version: AtomicU64,
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_CAPACITY)
    }
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(HubInner {
                next_version: AtomicU64::new(0),
                sender,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.sender.subscribe()
    }

    pub fn notify(&self, collection: Collection) -> ChangeEvent {
        let version = self.inner.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        let event = ChangeEvent {
            collection,
            version,
        };

        // No receivers is the normal idle state.
        let receivers = self.inner.sender.send(event).unwrap_or(0);
        tracing::debug!(%collection, version, receivers, "Published change");

        event
    }

    /// Latest published version, 0 before the first write.
    pub fn version(&self) -> u64 {
        self.inner.next_version.load(Ordering::SeqCst)
    }

    pub fn receiver_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const TEST_TIMEOUT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_notify_reaches_every_subscriber_in_order() {
        let hub = ChangeHub::default();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        hub.notify(Collection::HelpRequests);
        hub.notify(Collection::KnowledgeBase);

        for rx in [&mut first, &mut second] {
            let a = timeout(TEST_TIMEOUT, rx.recv()).await.unwrap().unwrap();
            let b = timeout(TEST_TIMEOUT, rx.recv()).await.unwrap().unwrap();
            assert_eq!(a.collection, Collection::HelpRequests);
            assert_eq!(b.collection, Collection::KnowledgeBase);
            assert!(b.version > a.version);
        }
    }

    #[test]
    fn test_notify_without_subscribers_still_advances_version() {
        let hub = ChangeHub::new(4);
        assert_eq!(hub.version(), 0);
        assert_eq!(hub.notify(Collection::HelpRequests).version, 1);
        assert_eq!(hub.version(), 1);
        assert_eq!(hub.receiver_count(), 0);
    }
}
