use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde::Serialize;

use crate::live::{LiveRecord, Subscription, ViewState};

/// Streams every snapshot of `subscription` as a `snapshot` event and every
/// failure as an `error` event. The subscription is cancelled when the client
/// goes away and the stream is dropped.
pub(crate) fn snapshot_events<T, D, F>(
    mut subscription: Subscription<T>,
    to_dto: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: LiveRecord,
    D: Serialize,
    F: Fn(Vec<T>, u64) -> D + Send + 'static,
{
    let stream = async_stream::stream! {
        while let Some(state) = subscription.next().await {
            let event = match state {
                ViewState::Loading => continue,
                ViewState::Loaded(snapshot) => {
                    let dto = to_dto(snapshot.items, snapshot.version);
                    match Event::default().event("snapshot").json_data(&dto) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode snapshot event");
                            Event::default().event("error").data("could not encode snapshot")
                        }
                    }
                }
                ViewState::Failed(reason) => Event::default().event("error").data(reason),
            };
            yield Ok(event);
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
