//! MongoDB implementation of the race store.
//!
//! Conditional `findOneAndUpdate` filters carry the atomicity the trait asks
//! for: start wins are decided by the `status: waiting` filter, stale progress
//! updates by the `last_seq` filter, and repeated finishes by `finished: false`.

use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database, IndexModel,
    bson::{DateTime, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoParticipantDocument, MongoRaceDocument},
};
use crate::dao::{
    models::{
        FinishOutcome, FinishPatch, ParticipantEntity, ProgressOutcome, ProgressPatch, RaceEntity,
    },
    race_store::RaceStore,
    storage::{StorageError, StorageResult},
};

const RACE_COLLECTION_NAME: &str = "races";
const PARTICIPANT_COLLECTION_NAME: &str = "participants";

#[derive(Clone)]
pub struct MongoRaceStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.database.write().await;
        *guard = database;
        Ok(())
    }
}

impl MongoRaceStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            database: RwLock::new(database),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        // Race codes are the `_id` and therefore already unique; participants
        // need the compound unique index that backs duplicate-join detection.
        let collection = self.participants().await;
        let index = IndexModel::builder()
            .keys(doc! {"race_code": 1, "user_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("participant_race_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PARTICIPANT_COLLECTION_NAME,
                index: "race_code,user_id",
                source,
            })?;

        Ok(())
    }

    async fn races(&self) -> Collection<MongoRaceDocument> {
        let guard = self.inner.database.read().await;
        guard.collection::<MongoRaceDocument>(RACE_COLLECTION_NAME)
    }

    async fn participants(&self) -> Collection<MongoParticipantDocument> {
        let guard = self.inner.database.read().await;
        guard.collection::<MongoParticipantDocument>(PARTICIPANT_COLLECTION_NAME)
    }

    async fn find_participant_row(
        &self,
        code: &str,
        user_id: &str,
    ) -> MongoResult<Option<ParticipantEntity>> {
        let collection = self.participants().await;
        let document = collection
            .find_one(doc! { "race_code": code, "user_id": user_id })
            .await
            .map_err(|source| MongoDaoError::LoadParticipants {
                code: code.to_owned(),
                source,
            })?;
        Ok(document.map(ParticipantEntity::from))
    }

    async fn count_unfinished(&self, code: &str) -> MongoResult<u64> {
        let collection = self.participants().await;
        collection
            .count_documents(doc! { "race_code": code, "finished": false })
            .await
            .map_err(|source| MongoDaoError::CountParticipants {
                code: code.to_owned(),
                source,
            })
    }
}

/// True when the server rejected a write because of a unique-key violation.
fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => false,
    }
}

impl RaceStore for MongoRaceStore {
    fn insert_race(&self, race: RaceEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let code = race.code.clone();
            let document = MongoRaceDocument::from(race);
            let collection = store.races().await;
            collection.insert_one(&document).await.map_err(|source| {
                if is_duplicate_key(&source) {
                    StorageError::duplicate(format!("race code `{code}` already exists"))
                } else {
                    MongoDaoError::InsertRace { code, source }.into()
                }
            })?;
            Ok(())
        })
    }

    fn find_race(&self, code: String) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.races().await;
            let document = collection
                .find_one(doc! { "_id": &code })
                .await
                .map_err(|source| MongoDaoError::LoadRace { code, source })?;
            Ok(document.map(RaceEntity::from))
        })
    }

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let code = participant.race_code.clone();
            let user_id = participant.user_id.clone();
            let document = MongoParticipantDocument::from(participant);
            let collection = store.participants().await;
            collection.insert_one(&document).await.map_err(|source| {
                if is_duplicate_key(&source) {
                    StorageError::duplicate(format!(
                        "user `{user_id}` already joined race `{code}`"
                    ))
                } else {
                    MongoDaoError::InsertParticipant {
                        code,
                        user_id,
                        source,
                    }
                    .into()
                }
            })?;
            Ok(())
        })
    }

    fn list_participants(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.participants().await;
            let documents: Vec<MongoParticipantDocument> = collection
                .find(doc! { "race_code": &code })
                .sort(doc! { "joined_at": 1 })
                .await
                .map_err(|source| MongoDaoError::LoadParticipants {
                    code: code.clone(),
                    source,
                })?
                .try_collect()
                .await
                .map_err(|source| MongoDaoError::LoadParticipants { code, source })?;

            Ok(documents.into_iter().map(ParticipantEntity::from).collect())
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
            let collection = store.races().await;
            let updated = collection
                .find_one_and_update(
                    doc! { "_id": &code, "status": "waiting" },
                    doc! { "$set": {
                        "status": "active",
                        "started_at": DateTime::from_system_time(started_at),
                        "countdown_secs": countdown_secs as i32,
                    }},
                )
                .return_document(ReturnDocument::After)
                .await
                .map_err(|source| MongoDaoError::UpdateRace { code, source })?;
            Ok(updated.map(RaceEntity::from))
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
            let mut filter = doc! {
                "race_code": &code,
                "user_id": &user_id,
                "finished": false,
            };
            let mut fields = doc! {
                "progress": patch.progress as i64,
                "accuracy": patch.accuracy,
                "wpm": patch.wpm,
                "raw_wpm": patch.raw_wpm,
            };
            if let Some(seq) = patch.seq {
                filter.insert("last_seq", doc! { "$lt": seq as i64 });
                fields.insert("last_seq", seq as i64);
            }

            let collection = store.participants().await;
            let updated = collection
                .find_one_and_update(filter, doc! { "$set": fields })
                .return_document(ReturnDocument::After)
                .await
                .map_err(|source| MongoDaoError::UpdateParticipant {
                    code: code.clone(),
                    user_id: user_id.clone(),
                    source,
                })?;

            if let Some(document) = updated {
                return Ok(Some(ProgressOutcome {
                    row: document.into(),
                    applied: true,
                }));
            }

            // The conditional write lost: either the row is missing, already
            // finished, or the sequence was stale. Report the current row.
            let current = store.find_participant_row(&code, &user_id).await?;
            Ok(current.map(|row| ProgressOutcome {
                row,
                applied: false,
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
            let collection = store.participants().await;
            let updated = collection
                .find_one_and_update(
                    doc! { "race_code": &code, "user_id": &user_id, "finished": false },
                    doc! { "$set": {
                        "finished": true,
                        "finished_at": DateTime::from_system_time(patch.finished_at),
                        "accuracy": patch.accuracy,
                        "wpm": patch.wpm,
                        "raw_wpm": patch.raw_wpm,
                    }},
                )
                .return_document(ReturnDocument::After)
                .await
                .map_err(|source| MongoDaoError::UpdateParticipant {
                    code: code.clone(),
                    user_id: user_id.clone(),
                    source,
                })?;

            let row = match updated {
                Some(document) => ParticipantEntity::from(document),
                // Already finished earlier; keep the original final metrics.
                None => match store.find_participant_row(&code, &user_id).await? {
                    Some(row) => row,
                    None => return Ok(None),
                },
            };

            let remaining_unfinished = store.count_unfinished(&code).await?;
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
            let collection = store.races().await;
            let updated = collection
                .find_one_and_update(
                    doc! { "_id": &code, "status": "active" },
                    doc! { "$set": {
                        "status": "finished",
                        "finished_at": DateTime::from_system_time(finished_at),
                    }},
                )
                .return_document(ReturnDocument::After)
                .await
                .map_err(|source| MongoDaoError::UpdateRace {
                    code: code.clone(),
                    source,
                })?;

            if let Some(document) = updated {
                return Ok(Some(document.into()));
            }

            // Another finisher already completed the race, or it never became
            // active; return the row as stored.
            let document = collection
                .find_one(doc! { "_id": &code })
                .await
                .map_err(|source| MongoDaoError::LoadRace { code, source })?;
            Ok(document.map(RaceEntity::from))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.ping().await?;
            Ok(())
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.reconnect().await?;
            Ok(())
        })
    }
}
