use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Typerace Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::races::create_race,
        crate::routes::races::get_race,
        crate::routes::races::join_race,
        crate::routes::races::start_race,
        crate::routes::races::update_progress,
        crate::routes::races::finish_race,
        crate::routes::sse::room_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::race::RaceView,
            crate::dto::race::ParticipantView,
            crate::dto::race::ProgressRequest,
            crate::dto::race::FinishRequest,
            crate::dto::race::FinishResponse,
            crate::dto::race::LeaderboardEntry,
            crate::dto::sse::ParticipantJoinedEvent,
            crate::dto::sse::RaceStartedEvent,
            crate::dto::sse::ProgressUpdatedEvent,
            crate::dto::sse::ParticipantFinishedEvent,
            crate::dto::sse::RaceFinishedEvent,
            crate::state::lifecycle::RaceStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "races", description = "Race rooms, progress tracking, and event streams"),
    )
)]
pub struct ApiDoc;
