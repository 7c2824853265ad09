//! Room directory: code generation, join admission control, polling reads,
//! and the creator-triggered race start.

use std::time::SystemTime;

use rand::Rng;

use crate::{
    dao::{
        models::{ParticipantEntity, RaceEntity},
        storage::StorageError,
    },
    dto::{
        identity::Identity,
        race::RaceView,
        validation::{ROOM_CODE_LENGTH, validate_room_code},
    },
    error::ServiceError,
    services::room_events,
    state::{
        SharedState,
        lifecycle::{RaceEvent, RaceStatus},
    },
};

/// Countdown between race activation and the typing start instant.
pub const COUNTDOWN_SECS: u32 = 10;
/// A race needs at least one opponent.
pub const MIN_PARTICIPANTS: usize = 2;
/// Code generation retries before giving up on a collision streak.
const MAX_CODE_ATTEMPTS: u32 = 4;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Create a fresh room with the caller as its first participant.
///
/// The room code is drawn at random and the insert retried on a collision,
/// bounded to [`MAX_CODE_ATTEMPTS`].
pub async fn create_room(state: &SharedState, identity: &Identity) -> Result<RaceView, ServiceError> {
    create_room_with(state, identity, generate_room_code).await
}

/// Collision handling with the code draw supplied by the caller.
async fn create_room_with(
    state: &SharedState,
    identity: &Identity,
    mut next_code: impl FnMut() -> String,
) -> Result<RaceView, ServiceError> {
    let store = state.require_race_store().await?;
    let now = SystemTime::now();

    let race = RaceEntity {
        code: String::new(),
        status: RaceStatus::Waiting,
        sentence_index: state.config().pick_sentence_index(),
        created_by: identity.user_id.clone(),
        created_at: now,
        started_at: None,
        finished_at: None,
        countdown_secs: COUNTDOWN_SECS,
    };

    let mut attempt = 0;
    let race = loop {
        let candidate = RaceEntity {
            code: next_code(),
            ..race.clone()
        };
        match store.insert_race(candidate.clone()).await {
            Ok(()) => break candidate,
            Err(StorageError::Duplicate { .. }) => {
                attempt += 1;
                if attempt >= MAX_CODE_ATTEMPTS {
                    return Err(ServiceError::Conflict(
                        "could not allocate a unique room code; try again".into(),
                    ));
                }
            }
            Err(err) => return Err(err.into()),
        }
    };

    store
        .insert_participant(new_participant(&race.code, identity, now))
        .await?;

    assemble_view(state, race).await
}

/// Admit a user into a waiting race.
pub async fn join_room(
    state: &SharedState,
    raw_code: &str,
    identity: &Identity,
) -> Result<RaceView, ServiceError> {
    let store = state.require_race_store().await?;
    let code = normalize_code(raw_code)?;

    let race = store
        .find_race(code.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("race `{code}` not found")))?;

    if race.status != RaceStatus::Waiting {
        return Err(ServiceError::InvalidState(format!(
            "race `{code}` is no longer accepting participants"
        )));
    }

    let participant = new_participant(&code, identity, SystemTime::now());
    match store.insert_participant(participant.clone()).await {
        Ok(()) => {}
        Err(StorageError::Duplicate { .. }) => {
            return Err(ServiceError::Conflict(format!(
                "user `{}` already joined race `{code}`",
                identity.user_id
            )));
        }
        Err(err) => return Err(err.into()),
    }

    room_events::broadcast_participant_joined(state, &code, participant.into());

    assemble_view(state, race).await
}

/// Primary polling read: the race plus all participants and display fields.
pub async fn get_room(state: &SharedState, raw_code: &str) -> Result<RaceView, ServiceError> {
    let store = state.require_race_store().await?;
    let code = normalize_code(raw_code)?;

    let race = store
        .find_race(code.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("race `{code}` not found")))?;

    assemble_view(state, race).await
}

/// Transition a waiting race to active, stamping the shared start instant.
///
/// Only the creator may start, and only with at least [`MIN_PARTICIPANTS`]
/// present. The store decides concurrent starts; the loser observes the race
/// as already started.
pub async fn start_race(
    state: &SharedState,
    raw_code: &str,
    identity: &Identity,
) -> Result<RaceView, ServiceError> {
    let store = state.require_race_store().await?;
    let code = normalize_code(raw_code)?;

    let race = store
        .find_race(code.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("race `{code}` not found")))?;

    if race.created_by != identity.user_id {
        return Err(ServiceError::Forbidden(format!(
            "only the creator may start race `{code}`"
        )));
    }

    // Reject from the current status before touching the store so the caller
    // gets the state-machine error rather than a generic lost-update one.
    race.status.transition(RaceEvent::Start)?;

    let participants = store.list_participants(code.clone()).await?;
    if participants.len() < MIN_PARTICIPANTS {
        return Err(ServiceError::FailedPrecondition(format!(
            "race `{code}` needs at least {MIN_PARTICIPANTS} participants to start"
        )));
    }

    let started_at = SystemTime::now();
    let race = store
        .activate_race(code.clone(), started_at, COUNTDOWN_SECS)
        .await?
        .ok_or_else(|| {
            ServiceError::InvalidState(format!("race `{code}` was already started"))
        })?;

    room_events::broadcast_race_started(state, &race);

    Ok(RaceView::assemble(
        race.clone(),
        participants,
        resolve_sentence(state, race.sentence_index),
    ))
}

/// Uppercase and validate a client-typed room code.
pub(crate) fn normalize_code(raw: &str) -> Result<String, ServiceError> {
    let code = raw.trim().to_ascii_uppercase();
    validate_room_code(&code).map_err(|err| {
        ServiceError::InvalidInput(
            err.message
                .map(|message| message.into_owned())
                .unwrap_or_else(|| format!("invalid room code `{raw}`")),
        )
    })?;
    Ok(code)
}

pub(crate) fn resolve_sentence(state: &SharedState, index: usize) -> Option<String> {
    state.config().sentence(index).map(str::to_owned)
}

pub(crate) async fn assemble_view(
    state: &SharedState,
    race: RaceEntity,
) -> Result<RaceView, ServiceError> {
    let store = state.require_race_store().await?;
    let participants = store.list_participants(race.code.clone()).await?;
    let sentence = resolve_sentence(state, race.sentence_index);
    Ok(RaceView::assemble(race, participants, sentence))
}

fn new_participant(code: &str, identity: &Identity, joined_at: SystemTime) -> ParticipantEntity {
    ParticipantEntity::joined(
        code.to_owned(),
        identity.user_id.clone(),
        identity.name.clone(),
        identity.image.clone(),
        joined_at,
    )
}

fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::race_store::memory::MemoryRaceStore, state::AppState};

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

    #[tokio::test]
    async fn colliding_code_draw_retries_until_free() {
        let state = racing_state().await;
        let taken = create_room_with(&state, &identity("alice"), || "AAAAAA".into())
            .await
            .unwrap();
        assert_eq!(taken.code, "AAAAAA");

        let mut draws = ["AAAAAA", "BBBBBB"].into_iter();
        let view = create_room_with(&state, &identity("bob"), || {
            draws.next().unwrap().to_owned()
        })
        .await
        .unwrap();
        assert_eq!(view.code, "BBBBBB");
        assert_eq!(view.participants.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_code_draws_surface_a_conflict() {
        let state = racing_state().await;
        create_room_with(&state, &identity("alice"), || "AAAAAA".into())
            .await
            .unwrap();

        let err = create_room_with(&state, &identity("bob"), || "AAAAAA".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn generated_codes_are_well_formed() {
        for _ in 0..64 {
            let code = generate_room_code();
            assert!(validate_room_code(&code).is_ok(), "bad code {code}");
        }
    }

    #[test]
    fn normalize_uppercases_and_trims() {
        assert_eq!(normalize_code(" ab12cd ").unwrap(), "AB12CD");
    }

    #[test]
    fn normalize_rejects_malformed_codes() {
        assert!(matches!(
            normalize_code("nope"),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            normalize_code("AB!2CD"),
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
