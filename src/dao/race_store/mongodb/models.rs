use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::dao::models::{ParticipantEntity, RaceEntity};
use crate::state::lifecycle::RaceStatus;

/// Race document persisted in the `races` collection, keyed by room code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRaceDocument {
    #[serde(rename = "_id")]
    code: String,
    status: RaceStatus,
    sentence_index: i64,
    created_by: String,
    created_at: DateTime,
    started_at: Option<DateTime>,
    finished_at: Option<DateTime>,
    countdown_secs: i32,
}

impl From<RaceEntity> for MongoRaceDocument {
    fn from(value: RaceEntity) -> Self {
        Self {
            code: value.code,
            status: value.status,
            sentence_index: value.sentence_index as i64,
            created_by: value.created_by,
            created_at: DateTime::from_system_time(value.created_at),
            started_at: value.started_at.map(DateTime::from_system_time),
            finished_at: value.finished_at.map(DateTime::from_system_time),
            countdown_secs: value.countdown_secs as i32,
        }
    }
}

impl From<MongoRaceDocument> for RaceEntity {
    fn from(value: MongoRaceDocument) -> Self {
        Self {
            code: value.code,
            status: value.status,
            sentence_index: value.sentence_index.max(0) as usize,
            created_by: value.created_by,
            created_at: value.created_at.to_system_time(),
            started_at: value.started_at.map(|at| at.to_system_time()),
            finished_at: value.finished_at.map(|at| at.to_system_time()),
            countdown_secs: value.countdown_secs.max(0) as u32,
        }
    }
}

/// Participant document persisted in the `participants` collection, unique on
/// `(race_code, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoParticipantDocument {
    pub race_code: String,
    pub user_id: String,
    user_name: String,
    user_image: Option<String>,
    progress: i64,
    accuracy: f64,
    wpm: f64,
    raw_wpm: f64,
    pub finished: bool,
    finished_at: Option<DateTime>,
    last_seq: i64,
    joined_at: DateTime,
}

impl From<ParticipantEntity> for MongoParticipantDocument {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            race_code: value.race_code,
            user_id: value.user_id,
            user_name: value.user_name,
            user_image: value.user_image,
            progress: value.progress as i64,
            accuracy: value.accuracy,
            wpm: value.wpm,
            raw_wpm: value.raw_wpm,
            finished: value.finished,
            finished_at: value.finished_at.map(DateTime::from_system_time),
            last_seq: value.last_seq as i64,
            joined_at: DateTime::from_system_time(value.joined_at),
        }
    }
}

impl From<MongoParticipantDocument> for ParticipantEntity {
    fn from(value: MongoParticipantDocument) -> Self {
        Self {
            race_code: value.race_code,
            user_id: value.user_id,
            user_name: value.user_name,
            user_image: value.user_image,
            progress: value.progress.max(0) as u32,
            accuracy: value.accuracy,
            wpm: value.wpm,
            raw_wpm: value.raw_wpm,
            finished: value.finished,
            finished_at: value.finished_at.map(|at| at.to_system_time()),
            last_seq: value.last_seq.max(0) as u64,
            joined_at: value.joined_at.to_system_time(),
        }
    }
}
