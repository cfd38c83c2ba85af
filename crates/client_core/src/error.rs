use shared::error::ApiException;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiException),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid server url: {0}")]
    Url(#[from] url::ParseError),
    #[error("no bearer token set")]
    MissingToken,
}

impl ClientError {
    /// The server-side error, when the request reached the engine.
    pub fn api(&self) -> Option<&ApiException> {
        match self {
            ClientError::Api(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
