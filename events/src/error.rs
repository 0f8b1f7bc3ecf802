use musiconn_api_client::FetchError;
use musiconn_api_client::Uid;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventsError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Location {uid} is missing from the response")]
    MissingNode { uid: Uid },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EventsError>;
