//! In-memory [`RaceStore`] used for tests and storeless runs.
//!
//! A single mutex over both maps gives every operation the per-key atomicity
//! the trait asks for; in particular "mark finished and count the rest" runs
//! inside one critical section.

use std::{
    sync::{Arc, Mutex},
    time::SystemTime,
};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use std::collections::HashMap;

use crate::dao::{
    models::{
        FinishOutcome, FinishPatch, ParticipantEntity, ProgressOutcome, ProgressPatch, RaceEntity,
    },
    race_store::RaceStore,
    storage::{StorageError, StorageResult},
};
use crate::state::lifecycle::{RaceEvent, RaceStatus};

#[derive(Default)]
struct MemoryInner {
    races: HashMap<String, RaceEntity>,
    /// Keyed by `(race_code, user_id)`; insertion order doubles as join order.
    participants: IndexMap<(String, String), ParticipantEntity>,
}

/// Non-persistent store backed by maps behind a single mutex.
#[derive(Clone, Default)]
pub struct MemoryRaceStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryRaceStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // Lock poisoning only happens if another thread panicked mid-write;
        // the maps hold plain data, so the inner value is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RaceStore for MemoryRaceStore {
    fn insert_race(&self, race: RaceEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            if inner.races.contains_key(&race.code) {
                return Err(StorageError::duplicate(format!(
                    "race code `{}` already exists",
                    race.code
                )));
            }
            inner.races.insert(race.code.clone(), race);
            Ok(())
        })
    }

    fn find_race(&self, code: String) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.lock().races.get(&code).cloned()) })
    }

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let key = (participant.race_code.clone(), participant.user_id.clone());
            let mut inner = store.lock();
            if inner.participants.contains_key(&key) {
                return Err(StorageError::duplicate(format!(
                    "user `{}` already joined race `{}`",
                    key.1, key.0
                )));
            }
            inner.participants.insert(key, participant);
            Ok(())
        })
    }

    fn list_participants(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.lock();
            Ok(inner
                .participants
                .values()
                .filter(|row| row.race_code == code)
                .cloned()
                .collect())
        })
    }

    fn activate_race(
        &self,
        code: String,
        started_at: SystemTime,
        countdown_secs: u32,
    ) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            let Some(race) = inner.races.get_mut(&code) else {
                return Ok(None);
            };
            let Ok(next) = race.status.transition(RaceEvent::Start) else {
                return Ok(None);
            };
            race.status = next;
            race.started_at = Some(started_at);
            race.countdown_secs = countdown_secs;
            Ok(Some(race.clone()))
        })
    }

    fn apply_progress(
        &self,
        code: String,
        user_id: String,
        patch: ProgressPatch,
    ) -> BoxFuture<'static, StorageResult<Option<ProgressOutcome>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            let Some(row) = inner.participants.get_mut(&(code, user_id)) else {
                return Ok(None);
            };

            let stale = patch.seq.is_some_and(|seq| seq <= row.last_seq);
            if row.finished || stale {
                return Ok(Some(ProgressOutcome {
                    row: row.clone(),
                    applied: false,
                }));
            }

            row.progress = patch.progress;
            row.accuracy = patch.accuracy;
            row.wpm = patch.wpm;
            row.raw_wpm = patch.raw_wpm;
            if let Some(seq) = patch.seq {
                row.last_seq = seq;
            }

            Ok(Some(ProgressOutcome {
                row: row.clone(),
                applied: true,
            }))
        })
    }

    fn finish_participant(
        &self,
        code: String,
        user_id: String,
        patch: FinishPatch,
    ) -> BoxFuture<'static, StorageResult<Option<FinishOutcome>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            let key = (code.clone(), user_id);
            let Some(row) = inner.participants.get_mut(&key) else {
                return Ok(None);
            };

            if !row.finished {
                row.finished = true;
                row.finished_at = Some(patch.finished_at);
                row.accuracy = patch.accuracy;
                row.wpm = patch.wpm;
                row.raw_wpm = patch.raw_wpm;
            }
            let row = row.clone();

            let remaining_unfinished = inner
                .participants
                .values()
                .filter(|p| p.race_code == code && !p.finished)
                .count() as u64;

            Ok(Some(FinishOutcome {
                row,
                remaining_unfinished,
            }))
        })
    }

    fn complete_race(
        &self,
        code: String,
        finished_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            let Some(race) = inner.races.get_mut(&code) else {
                return Ok(None);
            };
            if race.status == RaceStatus::Active {
                race.status = RaceStatus::Finished;
                race.finished_at = Some(finished_at);
            }
            Ok(Some(race.clone()))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::lifecycle::RaceStatus;

    fn race(code: &str) -> RaceEntity {
        RaceEntity {
            code: code.into(),
            status: RaceStatus::Waiting,
            sentence_index: 0,
            created_by: "creator".into(),
            created_at: SystemTime::now(),
            started_at: None,
            finished_at: None,
            countdown_secs: 10,
        }
    }

    fn participant(code: &str, user: &str) -> ParticipantEntity {
        ParticipantEntity::joined(
            code.into(),
            user.into(),
            user.into(),
            None,
            SystemTime::now(),
        )
    }

    #[tokio::test]
    async fn duplicate_race_code_is_rejected() {
        let store = MemoryRaceStore::default();
        store.insert_race(race("AAAAAA")).await.unwrap();
        let err = store.insert_race(race("AAAAAA")).await.unwrap_err();
        assert!(matches!(err, StorageError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn duplicate_participant_is_rejected() {
        let store = MemoryRaceStore::default();
        store.insert_race(race("AAAAAA")).await.unwrap();
        store
            .insert_participant(participant("AAAAAA", "alice"))
            .await
            .unwrap();
        let err = store
            .insert_participant(participant("AAAAAA", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn activate_loses_when_race_already_active() {
        let store = MemoryRaceStore::default();
        store.insert_race(race("AAAAAA")).await.unwrap();
        let now = SystemTime::now();
        let first = store.activate_race("AAAAAA".into(), now, 10).await.unwrap();
        assert_eq!(first.map(|r| r.status), Some(RaceStatus::Active));
        let second = store.activate_race("AAAAAA".into(), now, 10).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn stale_sequence_is_ignored() {
        let store = MemoryRaceStore::default();
        store.insert_race(race("AAAAAA")).await.unwrap();
        store
            .insert_participant(participant("AAAAAA", "alice"))
            .await
            .unwrap();

        let fresh = ProgressPatch {
            seq: Some(2),
            progress: 40,
            accuracy: 98.0,
            wpm: 80.0,
            raw_wpm: 85.0,
        };
        let outcome = store
            .apply_progress("AAAAAA".into(), "alice".into(), fresh)
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.applied);

        let stale = ProgressPatch {
            seq: Some(1),
            progress: 20,
            accuracy: 90.0,
            wpm: 60.0,
            raw_wpm: 65.0,
        };
        let outcome = store
            .apply_progress("AAAAAA".into(), "alice".into(), stale)
            .await
            .unwrap()
            .unwrap();
        assert!(!outcome.applied);
        assert_eq!(outcome.row.progress, 40);
    }

    #[tokio::test]
    async fn finish_reports_remaining_and_is_idempotent() {
        let store = MemoryRaceStore::default();
        store.insert_race(race("AAAAAA")).await.unwrap();
        store
            .insert_participant(participant("AAAAAA", "alice"))
            .await
            .unwrap();
        store
            .insert_participant(participant("AAAAAA", "bob"))
            .await
            .unwrap();

        let patch = FinishPatch {
            accuracy: 97.0,
            wpm: 82.0,
            raw_wpm: 88.0,
            finished_at: SystemTime::now(),
        };
        let outcome = store
            .finish_participant("AAAAAA".into(), "alice".into(), patch.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.remaining_unfinished, 1);

        // Second finish leaves the original metrics in place.
        let repeat = FinishPatch {
            wpm: 10.0,
            ..patch.clone()
        };
        let outcome = store
            .finish_participant("AAAAAA".into(), "alice".into(), repeat)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.row.wpm, 82.0);
        assert_eq!(outcome.remaining_unfinished, 1);

        let outcome = store
            .finish_participant("AAAAAA".into(), "bob".into(), patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.remaining_unfinished, 0);
    }
}
