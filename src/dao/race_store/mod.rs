//! Persistence abstraction for races and participants.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;

use crate::dao::models::{
    FinishOutcome, FinishPatch, ParticipantEntity, ProgressOutcome, ProgressPatch, RaceEntity,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for races and their participants.
///
/// Backends must provide read-after-write consistency per key and reject
/// duplicate race codes and duplicate `(race, user)` participant rows with
/// [`StorageError::Duplicate`](crate::dao::storage::StorageError::Duplicate).
pub trait RaceStore: Send + Sync {
    /// Insert a fresh race; fails with a duplicate error on code collision.
    fn insert_race(&self, race: RaceEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Look up a race by its code.
    fn find_race(&self, code: String) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>>;

    /// Insert a participant row; fails with a duplicate error when the user
    /// already joined the race.
    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// All participant rows of a race in join order.
    fn list_participants(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;

    /// Conditionally move a `waiting` race to `active`, stamping the start
    /// instant and countdown. Returns `None` when the race is absent or no
    /// longer waiting, so concurrent starts resolve to a single winner.
    fn activate_race(
        &self,
        code: String,
        started_at: SystemTime,
        countdown_secs: u32,
    ) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>>;

    /// Apply a progress update to a participant row as one conditional write.
    /// Updates with a stale sequence number or against a finished row are
    /// ignored and reported via [`ProgressOutcome::applied`]. Returns `None`
    /// when the participant row does not exist.
    fn apply_progress(
        &self,
        code: String,
        user_id: String,
        patch: ProgressPatch,
    ) -> BoxFuture<'static, StorageResult<Option<ProgressOutcome>>>;

    /// Mark a participant finished and report how many participants of the
    /// race remain unfinished, as close to atomically as the backend allows.
    /// Repeated finish calls are idempotent. Returns `None` when the
    /// participant row does not exist.
    fn finish_participant(
        &self,
        code: String,
        user_id: String,
        patch: FinishPatch,
    ) -> BoxFuture<'static, StorageResult<Option<FinishOutcome>>>;

    /// Conditionally move an `active` race to `finished`. When the race is in
    /// any other status the row is returned unchanged, making concurrent
    /// completion attempts idempotent. Returns `None` when the race is absent.
    fn complete_race(
        &self,
        code: String,
        finished_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>>;

    /// Cheap connectivity probe used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;

    /// Attempt to re-establish the backend connection after a failed probe.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
