use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast::error::RecvError, watch};
use tokio_util::sync::CancellationToken;

use super::query::{LiveQuery, LiveRecord};
use super::source::{ChangeFeed, QuerySource};

/// Complete result set of a query at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    /// Change-hub version the items were read at. Every source reports the
    /// backend hub's counter, so local, HTTP and SSE snapshots agree; within a
    /// channel it never decreases.
    pub version: u64,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    Loading,
    /// An empty snapshot is a real answer, distinct from `Loading`.
    Loaded(Snapshot<T>),
    Failed(String),
}

impl<T> ViewState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn items(&self) -> Option<&[T]> {
        match self {
            Self::Loaded(snapshot) => Some(&snapshot.items),
            _ => None,
        }
    }
}

pub struct LiveQueryChannel;

impl LiveQueryChannel {
    /// Opens a subscription and starts delivering snapshots of `query`.
    ///
    /// Invalid queries do not panic; the subscription moves to
    /// [`ViewState::Failed`].
    pub fn subscribe<T: LiveRecord>(
        source: Arc<dyn QuerySource<T>>,
        query: LiveQuery,
    ) -> Subscription<T> {
        let (tx, rx) = watch::channel(ViewState::Loading);
        let token = CancellationToken::new();

        tokio::spawn(run_channel(source, query, tx, token.clone()));

        Subscription { rx, token }
    }
}

async fn run_channel<T: LiveRecord>(
    source: Arc<dyn QuerySource<T>>,
    query: LiveQuery,
    tx: watch::Sender<ViewState<T>>,
    token: CancellationToken,
) {
    let collection = query.collection;
    if collection != T::COLLECTION {
        tx.send_replace(ViewState::Failed(format!(
            "query targets {collection} but the channel carries {}",
            T::COLLECTION
        )));
        return;
    }
    if let Err(e) = query.plan() {
        tracing::warn!(%collection, error = %e, "Rejected live query");
        tx.send_replace(ViewState::Failed(e.to_string()));
        return;
    }

    let mut feed = source.changes();
    let mut delivered = 0u64;

    loop {
        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            fetched = source.fetch(&query) => fetched,
        };

        if token.is_cancelled() {
            return;
        }

        match fetched {
            Ok(Snapshot { version, items }) => {
                delivered = delivered.max(version);
                tracing::debug!(%collection, version = delivered, count = items.len(), "Delivering snapshot");
                tx.send_replace(ViewState::Loaded(Snapshot {
                    version: delivered,
                    items,
                }));
            }
            Err(e) => {
                tracing::warn!(%collection, error = %e, "Live query fetch failed");
                tx.send_replace(ViewState::Failed(e.to_string()));
            }
        }

        if !wait_for_change(&mut feed, &query, &token).await {
            return;
        }
    }
}

/// Returns false once the channel should stop.
async fn wait_for_change(
    feed: &mut ChangeFeed,
    query: &LiveQuery,
    token: &CancellationToken,
) -> bool {
    match feed {
        ChangeFeed::Poll(interval) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => false,
                _ = tokio::time::sleep(*interval) => true,
            }
        }
        ChangeFeed::Push(rx) => loop {
            let received = tokio::select! {
                biased;
                _ = token.cancelled() => return false,
                received = rx.recv() => received,
            };

            match received {
                Ok(event) if event.collection == query.collection => {
                    // Later events are covered by the fetch we are about to do.
                    while rx.try_recv().is_ok() {}
                    return true;
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(collection = %query.collection, skipped, "Change feed lagged");
                    return true;
                }
                Err(RecvError::Closed) => {
                    token.cancelled().await;
                    return false;
                }
            }
        },
    }
}

/// Handle to a running live query. Dropping it cancels the channel.
pub struct Subscription<T> {
    rx: watch::Receiver<ViewState<T>>,
    token: CancellationToken,
}

impl<T: LiveRecord> Subscription<T> {
    /// Waits for the next state change. Intermediate snapshots that were
    /// superseded before this call are skipped. Returns `None` once the
    /// subscription is cancelled.
    pub async fn next(&mut self) -> Option<ViewState<T>> {
        if self.token.is_cancelled() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            changed = self.rx.changed() => match changed {
                Ok(()) => Some(self.rx.borrow_and_update().clone()),
                Err(_) => None,
            },
        }
    }

    pub fn current(&self) -> ViewState<T> {
        self.rx.borrow().clone()
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Hands every future state to `callback` on a background task.
    ///
    /// The callback must not cancel its own handle from inside the call.
    pub fn observe<F>(mut self, callback: F) -> ObserverHandle
    where
        F: FnMut(ViewState<T>) + Send + 'static,
    {
        let slot: Arc<Mutex<Option<F>>> = Arc::new(Mutex::new(Some(callback)));
        let token = self.token.clone();

        let delivery_slot = Arc::clone(&slot);
        tokio::spawn(async move {
            while let Some(state) = self.next().await {
                let mut guard = delivery_slot.lock().unwrap_or_else(|e| e.into_inner());
                match guard.as_mut() {
                    Some(callback) => callback(state),
                    None => break,
                }
            }
        });

        let detach_slot = Arc::clone(&slot);
        ObserverHandle {
            token,
            detach: Box::new(move || {
                detach_slot
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .take();
            }),
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Cancels an [`observe`](Subscription::observe) registration.
///
/// Once `cancel` returns the callback will not run again, even if a delivery
/// was racing the cancellation.
pub struct ObserverHandle {
    token: CancellationToken,
    detach: Box<dyn Fn() + Send + Sync>,
}

impl ObserverHandle {
    /// Idempotent. Blocks while a callback is mid-flight.
    pub fn cancel(&self) {
        self.token.cancel();
        (self.detach)();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
