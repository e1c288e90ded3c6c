//! Error taxonomy shared by the store, the like tracker and the data manager.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VideoError {
    /// The referenced video id is not in the store.
    #[error("Missing video with id {0}")]
    NotFound(u64),

    /// The request would break a store invariant (double like, unlike without
    /// a like, reusing a taken id).
    #[error("{0}")]
    InvalidOperation(String),

    /// The data manager could not read or write a payload.
    #[error("video data unavailable: {0}")]
    Io(#[from] io::Error),
}

impl VideoError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }
}

pub type VideoResult<T> = Result<T, VideoError>;
