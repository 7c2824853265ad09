use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        identity::Identity,
        race::{FinishRequest, FinishResponse, ParticipantView, ProgressRequest, RaceView},
    },
    error::AppError,
    services::{progress_service, room_service},
    state::SharedState,
};

/// Routes covering the whole race lifecycle: creation, join, polling read,
/// start, progress, and finish.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/races", post(create_race))
        .route("/races/{code}", get(get_race))
        .route("/races/{code}/join", post(join_race))
        .route("/races/{code}/start", post(start_race))
        .route("/races/{code}/progress", post(update_progress))
        .route("/races/{code}/finish", post(finish_race))
}

/// Create a fresh room with the caller as its first participant.
#[utoipa::path(
    post,
    path = "/races",
    tag = "races",
    params(("X-User-Id" = String, Header, description = "Caller identity forwarded by the auth proxy")),
    responses(
        (status = 200, description = "Room created", body = RaceView),
        (status = 401, description = "No caller identity")
    )
)]
pub async fn create_race(
    State(state): State<SharedState>,
    identity: Identity,
) -> Result<Json<RaceView>, AppError> {
    let view = room_service::create_room(&state, &identity).await?;
    Ok(Json(view))
}

/// Poll the full room state: race, participants, and display fields.
#[utoipa::path(
    get,
    path = "/races/{code}",
    tag = "races",
    params(("code" = String, Path, description = "Room code of the race")),
    responses(
        (status = 200, description = "Race with participants", body = RaceView),
        (status = 404, description = "Unknown room code")
    )
)]
pub async fn get_race(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RaceView>, AppError> {
    let view = room_service::get_room(&state, &code).await?;
    Ok(Json(view))
}

/// Join a waiting race.
#[utoipa::path(
    post,
    path = "/races/{code}/join",
    tag = "races",
    params(
        ("code" = String, Path, description = "Room code of the race"),
        ("X-User-Id" = String, Header, description = "Caller identity forwarded by the auth proxy")
    ),
    responses(
        (status = 200, description = "Joined", body = RaceView),
        (status = 404, description = "Unknown room code"),
        (status = 409, description = "Race already started, or duplicate join")
    )
)]
pub async fn join_race(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    identity: Identity,
) -> Result<Json<RaceView>, AppError> {
    let view = room_service::join_room(&state, &code, &identity).await?;
    Ok(Json(view))
}

/// Start the race; creator only, needs at least two participants.
#[utoipa::path(
    post,
    path = "/races/{code}/start",
    tag = "races",
    params(
        ("code" = String, Path, description = "Room code of the race"),
        ("X-User-Id" = String, Header, description = "Caller identity forwarded by the auth proxy")
    ),
    responses(
        (status = 200, description = "Race activated", body = RaceView),
        (status = 403, description = "Caller is not the creator"),
        (status = 412, description = "Not enough participants")
    )
)]
pub async fn start_race(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    identity: Identity,
) -> Result<Json<RaceView>, AppError> {
    let view = room_service::start_race(&state, &code, &identity).await?;
    Ok(Json(view))
}

/// Push one keystroke-driven progress update.
#[utoipa::path(
    post,
    path = "/races/{code}/progress",
    tag = "races",
    params(
        ("code" = String, Path, description = "Room code of the race"),
        ("X-User-Id" = String, Header, description = "Caller identity forwarded by the auth proxy")
    ),
    request_body = ProgressRequest,
    responses(
        (status = 200, description = "Updated participant row", body = ParticipantView),
        (status = 404, description = "Unknown room code or caller never joined")
    )
)]
pub async fn update_progress(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    identity: Identity,
    Json(payload): Json<ProgressRequest>,
) -> Result<Json<ParticipantView>, AppError> {
    payload.validate()?;
    let view = progress_service::update_progress(&state, &code, &identity, payload).await?;
    Ok(Json(view))
}

/// Record the caller's finish and return the race-scoped leaderboard.
#[utoipa::path(
    post,
    path = "/races/{code}/finish",
    tag = "races",
    params(
        ("code" = String, Path, description = "Room code of the race"),
        ("X-User-Id" = String, Header, description = "Caller identity forwarded by the auth proxy")
    ),
    request_body = FinishRequest,
    responses(
        (status = 200, description = "Final row plus leaderboard", body = FinishResponse),
        (status = 404, description = "Unknown room code or caller never joined")
    )
)]
pub async fn finish_race(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    identity: Identity,
    Json(payload): Json<FinishRequest>,
) -> Result<Json<FinishResponse>, AppError> {
    payload.validate()?;
    let response = progress_service::finish_participant(&state, &code, &identity, payload).await?;
    Ok(Json(response))
}
