use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/races/{code}/events",
    tag = "races",
    params(("code" = String, Path, description = "Room code of the race")),
    responses(
        (status = 200, description = "Room event stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown room code")
    )
)]
/// Stream join/start/progress/finish events for one room.
///
/// Push is an addition on top of polling: clients may keep polling the room
/// read instead and observe exactly the same state.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let (receiver, code) = sse_service::subscribe_room(&state, &code).await?;
    info!(code = %code, "new room SSE connection");
    Ok(sse_service::to_sse_stream(receiver, code))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/races/{code}/events", get(room_stream))
}
