use thiserror::Error;

/// Result alias for MongoDB DAO operations.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Errors raised by the MongoDB race store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("invalid MongoDB connection string `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to construct MongoDB client")]
    ClientConstruction {
        #[source]
        source: mongodb::error::Error,
    },
    #[error("MongoDB did not answer the initial ping after {attempts} attempts")]
    InitialPing {
        attempts: u32,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("MongoDB health ping failed")]
    HealthPing {
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to insert race `{code}`")]
    InsertRace {
        code: String,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to load race `{code}`")]
    LoadRace {
        code: String,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to update race `{code}`")]
    UpdateRace {
        code: String,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to insert participant `{user_id}` into race `{code}`")]
    InsertParticipant {
        code: String,
        user_id: String,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to load participants of race `{code}`")]
    LoadParticipants {
        code: String,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to update participant `{user_id}` of race `{code}`")]
    UpdateParticipant {
        code: String,
        user_id: String,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to count unfinished participants of race `{code}`")]
    CountParticipants {
        code: String,
        #[source]
        source: mongodb::error::Error,
    },
}
