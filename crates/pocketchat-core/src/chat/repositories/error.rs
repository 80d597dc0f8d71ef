use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("session title must not be empty")]
    EmptyTitle,

    #[error("store initialization failed: {message}")]
    Initialization { message: String },

    #[error("no such session: {session_id}")]
    MissingSession { session_id: i64 },

    #[error("corrupt row: {message}")]
    CorruptRow { message: String },
}

pub type StoreResult<T> = Result<T, StoreError>;
