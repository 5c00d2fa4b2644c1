use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WatchQuery {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub seq: Option<u64>,
}

/// GET /api/v1/watch: SSE stream of store changes, replaying buffered
/// events newer than `seq` before following live ones.
pub async fn watch_events(
    State(state): State<AppState>,
    Query(query): Query<WatchQuery>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let prefix = query.prefix.unwrap_or_default();
    let from_seq = query.seq.unwrap_or(0);

    info!(
        "Watch subscription: prefix='{}', from_seq={}",
        prefix, from_seq
    );

    // Subscribe before reading the buffer so nothing falls in between; the
    // live stream skips what the replay already sent.
    let event_log = &state.store.state().event_log;
    let rx = event_log.subscribe();
    let buffered = event_log.events_since(from_seq).await;
    let replayed_to = buffered.last().map_or(from_seq, |e| e.seq);

    let live_prefix = prefix.clone();
    let replay = tokio_stream::iter(
        buffered
            .into_iter()
            .filter(move |e| e.key.starts_with(&prefix))
            .filter_map(|e| serde_json::to_string(&e).ok())
            .map(|data| Ok::<_, Infallible>(Event::default().data(data))),
    );

    let live = BroadcastStream::new(rx).filter_map(move |result| {
        let event = result.ok()?;
        if event.seq <= replayed_to || !event.key.starts_with(&live_prefix) {
            return None;
        }
        let data = serde_json::to_string(&event).ok()?;
        Some(Ok::<_, Infallible>(Event::default().data(data)))
    });

    Sse::new(replay.chain(live)).keep_alive(KeepAlive::default())
}
