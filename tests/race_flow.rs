//! End-to-end race flows through the service layer against the in-memory store.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use typerace_back::{
    config::AppConfig,
    dao::race_store::memory::MemoryRaceStore,
    dto::{
        identity::Identity,
        race::{FinishRequest, ProgressRequest},
    },
    error::ServiceError,
    services::{progress_service, room_service, sse_service},
    state::{AppState, SharedState, lifecycle::RaceStatus},
};

async fn racing_state() -> SharedState {
    let state = AppState::new(AppConfig::default());
    state
        .set_race_store(Arc::new(MemoryRaceStore::default()))
        .await;
    state
}

fn identity(user: &str) -> Identity {
    Identity {
        user_id: user.into(),
        name: user.into(),
        image: None,
    }
}

fn progress(seq: u64, typed: u32, wpm: f64) -> ProgressRequest {
    ProgressRequest {
        seq: Some(seq),
        progress: typed,
        accuracy: 96.0,
        wpm,
        raw_wpm: None,
    }
}

fn finish(wpm: f64, accuracy: f64) -> FinishRequest {
    FinishRequest {
        wpm,
        accuracy,
        raw_wpm: None,
    }
}

/// Create a room as `creator` and join `others`, returning the room code.
async fn room_with(state: &SharedState, creator: &str, others: &[&str]) -> String {
    let view = room_service::create_room(state, &identity(creator))
        .await
        .unwrap();
    for user in others {
        room_service::join_room(state, &view.code, &identity(user))
            .await
            .unwrap();
    }
    view.code
}

#[tokio::test]
async fn create_room_initializes_waiting_race_with_creator() {
    let state = racing_state().await;
    let view = room_service::create_room(&state, &identity("alice"))
        .await
        .unwrap();

    assert_eq!(view.status, RaceStatus::Waiting);
    assert_eq!(view.code.len(), 6);
    assert_eq!(view.countdown_secs, 10);
    assert!(view.started_at.is_none());
    assert!(view.sentence.is_some());
    assert_eq!(view.participants.len(), 1);
    assert_eq!(view.participants[0].user_id, "alice");
    assert_eq!(view.participants[0].progress, 0);
}

#[tokio::test]
async fn degraded_mode_rejects_room_creation() {
    let state = AppState::new(AppConfig::default());
    let err = room_service::create_room(&state, &identity("alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Degraded));
}

#[tokio::test]
async fn join_unknown_room_is_not_found() {
    let state = racing_state().await;
    let err = room_service::join_room(&state, "ZZZZZ0", &identity("bob"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn join_accepts_lowercase_codes() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &[]).await;

    let view = room_service::join_room(&state, &code.to_lowercase(), &identity("bob"))
        .await
        .unwrap();
    assert_eq!(view.participants.len(), 2);
}

#[tokio::test]
async fn duplicate_join_conflicts() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &["bob"]).await;

    let err = room_service::join_room(&state, &code, &identity("bob"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn join_after_start_is_rejected() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &["bob"]).await;
    room_service::start_race(&state, &code, &identity("alice"))
        .await
        .unwrap();

    let err = room_service::join_room(&state, &code, &identity("carol"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn start_requires_the_creator() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &["bob"]).await;

    let err = room_service::start_race(&state, &code, &identity("bob"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn start_requires_two_participants() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &[]).await;

    let err = room_service::start_race(&state, &code, &identity("alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::FailedPrecondition(_)));
}

#[tokio::test]
async fn start_stamps_start_time_and_countdown() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &["bob"]).await;

    let view = room_service::start_race(&state, &code, &identity("alice"))
        .await
        .unwrap();
    assert_eq!(view.status, RaceStatus::Active);
    assert!(view.started_at.is_some());
    assert_eq!(view.countdown_secs, 10);
    assert_eq!(view.participants.len(), 2);
}

#[tokio::test]
async fn start_cannot_be_repeated() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &["bob"]).await;
    room_service::start_race(&state, &code, &identity("alice"))
        .await
        .unwrap();

    let err = room_service::start_race(&state, &code, &identity("alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn progress_updates_are_stored_and_returned() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &["bob"]).await;
    room_service::start_race(&state, &code, &identity("alice"))
        .await
        .unwrap();

    let row = progress_service::update_progress(&state, &code, &identity("bob"), progress(1, 12, 60.0))
        .await
        .unwrap();
    assert_eq!(row.progress, 12);
    assert_eq!(row.wpm, 60.0);
    // raw_wpm defaults to wpm when the client omits it.
    assert_eq!(row.raw_wpm, 60.0);

    let view = room_service::get_room(&state, &code).await.unwrap();
    let bob = view
        .participants
        .iter()
        .find(|p| p.user_id == "bob")
        .unwrap();
    assert_eq!(bob.progress, 12);
}

#[tokio::test]
async fn progress_for_unknown_participant_is_not_found() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &["bob"]).await;

    let err =
        progress_service::update_progress(&state, &code, &identity("mallory"), progress(1, 5, 40.0))
            .await
            .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn stale_progress_update_is_ignored() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &["bob"]).await;
    room_service::start_race(&state, &code, &identity("alice"))
        .await
        .unwrap();

    progress_service::update_progress(&state, &code, &identity("bob"), progress(2, 30, 70.0))
        .await
        .unwrap();
    let row =
        progress_service::update_progress(&state, &code, &identity("bob"), progress(1, 10, 50.0))
            .await
            .unwrap();

    // The out-of-order update does not regress the row.
    assert_eq!(row.progress, 30);
    assert_eq!(row.wpm, 70.0);
}

#[tokio::test]
async fn accuracy_is_normalized_on_update() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &["bob"]).await;

    let over = ProgressRequest {
        accuracy: 150.0,
        ..progress(1, 10, 60.0)
    };
    let row = progress_service::update_progress(&state, &code, &identity("bob"), over)
        .await
        .unwrap();
    // Divide-then-clamp: 150 rescales to 1.5 instead of saturating at 100.
    assert_eq!(row.accuracy, 1.5);

    let negative = ProgressRequest {
        accuracy: -5.0,
        ..progress(2, 11, 60.0)
    };
    let row = progress_service::update_progress(&state, &code, &identity("bob"), negative)
        .await
        .unwrap();
    assert_eq!(row.accuracy, 0.0);
}

#[tokio::test]
async fn finish_convergence_flips_race_once_everyone_is_done() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &["bob"]).await;
    room_service::start_race(&state, &code, &identity("alice"))
        .await
        .unwrap();

    let response = progress_service::finish_participant(
        &state,
        &code,
        &identity("alice"),
        finish(82.0, 97.0),
    )
    .await
    .unwrap();
    assert!(response.participant.finished);

    // One participant still typing: the race stays active.
    let view = room_service::get_room(&state, &code).await.unwrap();
    assert_eq!(view.status, RaceStatus::Active);
    assert!(view.finished_at.is_none());

    let response =
        progress_service::finish_participant(&state, &code, &identity("bob"), finish(74.0, 95.0))
            .await
            .unwrap();
    assert_eq!(response.leaderboard.len(), 2);

    let view = room_service::get_room(&state, &code).await.unwrap();
    assert_eq!(view.status, RaceStatus::Finished);
    assert!(view.finished_at.is_some());
}

#[tokio::test]
async fn finished_row_ignores_late_progress() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &["bob"]).await;
    room_service::start_race(&state, &code, &identity("alice"))
        .await
        .unwrap();

    progress_service::finish_participant(&state, &code, &identity("bob"), finish(88.0, 99.0))
        .await
        .unwrap();
    let row =
        progress_service::update_progress(&state, &code, &identity("bob"), progress(9, 500, 20.0))
            .await
            .unwrap();

    assert!(row.finished);
    assert_eq!(row.wpm, 88.0);
    assert_eq!(row.progress, 0);
}

#[tokio::test]
async fn leaderboard_sorts_by_wpm_with_stable_ties() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &["bob", "carol"]).await;
    room_service::start_race(&state, &code, &identity("alice"))
        .await
        .unwrap();

    progress_service::finish_participant(&state, &code, &identity("alice"), finish(80.0, 96.0))
        .await
        .unwrap();
    progress_service::finish_participant(&state, &code, &identity("bob"), finish(95.0, 98.0))
        .await
        .unwrap();
    let response =
        progress_service::finish_participant(&state, &code, &identity("carol"), finish(80.0, 92.0))
            .await
            .unwrap();

    let order: Vec<&str> = response
        .leaderboard
        .iter()
        .map(|entry| entry.user_id.as_str())
        .collect();
    // bob leads; alice and carol tie at 80 and keep join order.
    assert_eq!(order, vec!["bob", "alice", "carol"]);
}

#[tokio::test]
async fn event_stream_for_finished_race_is_closed() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &["bob"]).await;
    room_service::start_race(&state, &code, &identity("alice"))
        .await
        .unwrap();
    progress_service::finish_participant(&state, &code, &identity("alice"), finish(82.0, 97.0))
        .await
        .unwrap();
    progress_service::finish_participant(&state, &code, &identity("bob"), finish(74.0, 95.0))
        .await
        .unwrap();

    // The final event already went out with the finish; a late subscriber gets
    // a stream that ends immediately rather than a fresh hub.
    let (mut receiver, _) = sse_service::subscribe_room(&state, &code).await.unwrap();
    assert!(matches!(receiver.recv().await, Err(RecvError::Closed)));
}

#[tokio::test]
async fn finish_accuracy_is_normalized_like_progress() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &["bob"]).await;
    room_service::start_race(&state, &code, &identity("alice"))
        .await
        .unwrap();

    let response =
        progress_service::finish_participant(&state, &code, &identity("bob"), finish(80.0, 140.0))
            .await
            .unwrap();
    // Same divide-then-clamp rule as progress updates: 140 stores as 1.4.
    assert_eq!(response.participant.accuracy, 1.4);
}

#[tokio::test]
async fn repeated_finish_keeps_first_result() {
    let state = racing_state().await;
    let code = room_with(&state, "alice", &["bob"]).await;
    room_service::start_race(&state, &code, &identity("alice"))
        .await
        .unwrap();

    progress_service::finish_participant(&state, &code, &identity("bob"), finish(91.0, 98.0))
        .await
        .unwrap();
    let response =
        progress_service::finish_participant(&state, &code, &identity("bob"), finish(10.0, 10.0))
            .await
            .unwrap();

    assert_eq!(response.participant.wpm, 91.0);
}
