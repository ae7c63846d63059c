use std::path::PathBuf;

use thiserror::Error;

use crate::dates::DateError;
use crate::frontmatter::ParseError;

/// Failure taxonomy surfaced by the access layer. Backends convert raw
/// transport and filesystem errors into these variants; callers never see a
/// reqwest or io error directly.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    InvalidDate(#[from] DateError),
    #[error("corrupt task file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("task title must not be empty")]
    EmptyTitle,
    #[error("exhausted id generation attempts")]
    IdExhausted,
    #[error("daemon transport failure: {0}")]
    Transport(String),
    #[error("daemon rejected request ({code}): {message}")]
    Daemon { code: String, message: String },
    #[error("vault io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True for failures that mean "the daemon could not be reached or did
    /// not speak the protocol", the only class that triggers vault fallback.
    pub fn is_transport(&self) -> bool {
        matches!(self, StoreError::Transport(_))
    }
}
