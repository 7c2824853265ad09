//! Builders that serialise room events and push them onto the per-room
//! broadcast channels.

use serde::Serialize;
use tracing::warn;

use crate::{
    dao::models::{ParticipantEntity, RaceEntity},
    dto::{
        format_system_time,
        race::{LeaderboardEntry, ParticipantView},
        sse::{
            ParticipantFinishedEvent, ParticipantJoinedEvent, ProgressUpdatedEvent,
            RaceFinishedEvent, RaceStartedEvent, ServerEvent,
        },
    },
    state::SharedState,
};

const EVENT_PARTICIPANT_JOINED: &str = "participant.joined";
const EVENT_RACE_STARTED: &str = "race.started";
const EVENT_PROGRESS_UPDATED: &str = "participant.progress";
const EVENT_PARTICIPANT_FINISHED: &str = "participant.finished";
const EVENT_RACE_FINISHED: &str = "race.finished";

/// Broadcast that a user joined the room.
pub fn broadcast_participant_joined(state: &SharedState, code: &str, participant: ParticipantView) {
    let payload = ParticipantJoinedEvent { participant };
    send_room_event(state, code, EVENT_PARTICIPANT_JOINED, &payload);
}

/// Broadcast the shared start instant and countdown to the room.
pub fn broadcast_race_started(state: &SharedState, race: &RaceEntity) {
    let Some(started_at) = race.started_at else {
        warn!(code = %race.code, "refusing to broadcast start without a start instant");
        return;
    };
    let payload = RaceStartedEvent {
        code: race.code.clone(),
        started_at: format_system_time(started_at),
        countdown_secs: race.countdown_secs,
    };
    send_room_event(state, &race.code, EVENT_RACE_STARTED, &payload);
}

/// Broadcast an applied progress update so opponents render live metrics.
pub fn broadcast_progress(state: &SharedState, code: &str, row: &ParticipantEntity) {
    let payload = ProgressUpdatedEvent {
        user_id: row.user_id.clone(),
        progress: row.progress,
        accuracy: row.accuracy,
        wpm: row.wpm,
        raw_wpm: row.raw_wpm,
    };
    send_room_event(state, code, EVENT_PROGRESS_UPDATED, &payload);
}

/// Broadcast one participant's finish.
pub fn broadcast_participant_finished(state: &SharedState, code: &str, row: &ParticipantEntity) {
    let payload = ParticipantFinishedEvent {
        user_id: row.user_id.clone(),
        wpm: row.wpm,
        accuracy: row.accuracy,
        raw_wpm: row.raw_wpm,
    };
    send_room_event(state, code, EVENT_PARTICIPANT_FINISHED, &payload);
}

/// Broadcast the terminal event carrying the final leaderboard.
pub fn broadcast_race_finished(
    state: &SharedState,
    race: &RaceEntity,
    leaderboard: &[LeaderboardEntry],
) {
    let payload = RaceFinishedEvent {
        code: race.code.clone(),
        finished_at: race.finished_at.map(format_system_time),
        leaderboard: leaderboard.to_vec(),
    };
    send_room_event(state, &race.code, EVENT_RACE_FINISHED, &payload);
}

fn send_room_event<T: Serialize>(state: &SharedState, code: &str, event: &str, payload: &T) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(server_event) => state.rooms().broadcast(code, server_event),
        Err(err) => warn!(code = %code, event, error = %err, "failed to serialise room event"),
    }
}
