use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transfer position {index} is outside the {len} argument(s) of the message")]
    InvalidTransfer { index: usize, len: usize },

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
