//! Event payloads carried on the per-room SSE streams.

use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::race::{LeaderboardEntry, ParticipantView};

#[derive(Clone, Debug)]
/// Dispatched payload carried across the room broadcast channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event with a pre-rendered data field.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a user joins a waiting race.
pub struct ParticipantJoinedEvent {
    pub participant: ParticipantView,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the creator starts the race.
///
/// Clients that receive this push still derive the typing-start instant the
/// same way polling clients do: `started_at` plus `countdown_secs`.
pub struct RaceStartedEvent {
    pub code: String,
    pub started_at: String,
    pub countdown_secs: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast on every applied progress update so opponents can render live.
pub struct ProgressUpdatedEvent {
    pub user_id: String,
    pub progress: u32,
    pub accuracy: f64,
    pub wpm: f64,
    pub raw_wpm: f64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when one participant finishes.
pub struct ParticipantFinishedEvent {
    pub user_id: String,
    pub wpm: f64,
    pub accuracy: f64,
    pub raw_wpm: f64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once when the last participant finishes; final event of a room.
pub struct RaceFinishedEvent {
    pub code: String,
    /// RFC 3339 finish instant; omitted when the race row carries none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    pub leaderboard: Vec<LeaderboardEntry>,
}
