use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Fabric(#[from] courier_fabric::Error),

    #[error(transparent)]
    Core(#[from] courier_core::Error),

    #[error("A worker pool needs at least one channel")]
    EmptyPool,

    #[error("Operation {operation} failed: {message}")]
    InvocationFailure { operation: String, message: String },

    #[error("Proxy dropped before the call was answered")]
    ReplyDropped,
}

pub type Result<T> = std::result::Result<T, Error>;
