use musiconn_api_client::FetchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SuggestError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Unexpected autocomplete response: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SuggestError>;
