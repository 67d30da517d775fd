use alloc::string::String;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}: no such file or directory")]
    NotFound(String),

    #[error("{0}: not a directory")]
    NotADirectory(String),

    #[error("{path}: {reason}")]
    Io { path: String, reason: String },
}
