use thiserror::Error;

#[derive(Error, Debug)]
pub enum TitlesError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Failure to read or write a title snapshot. The cache logs these and
/// carries on with its in-memory state.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TitlesError>;
