//! Server-Sent Events plumbing for the per-room streams.

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    dto::sse::ServerEvent,
    error::ServiceError,
    services::room_service,
    state::SharedState,
};

/// Subscribe to a room's event stream, verifying the race exists first.
pub async fn subscribe_room(
    state: &SharedState,
    raw_code: &str,
) -> Result<(broadcast::Receiver<ServerEvent>, String), ServiceError> {
    let store = state.require_race_store().await?;
    let code = room_service::normalize_code(raw_code)?;

    let race = store
        .find_race(code.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("race `{code}` not found")))?;

    // The room hub is dropped when a race finishes; hand a finished race a
    // closed stream instead of recreating its hub.
    if race.status.is_terminal() {
        let (sender, receiver) = broadcast::channel(1);
        drop(sender);
        return Ok((receiver, code));
    }

    let receiver = state.rooms().subscribe(&code);
    Ok((receiver, code))
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    code: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Skip lagged messages but keep the stream alive.
                            continue;
                        }
                    }
                }
            }
        }

        tracing::info!(code = %code, "room SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
