//! Error taxonomy for the chat core.

use std::path::PathBuf;

/// Rejections from the turn controller. Neither one ever becomes a chat message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("Nothing to send: type a message or attach an image")]
    EmptyInput,

    #[error("Still waiting for the previous response")]
    Busy,
}

/// Load/save failures of the session store
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("No saved session at {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Could not access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a session file: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

impl PersistenceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            PersistenceError::NotFound { path: path.into() }
        } else {
            PersistenceError::Io {
                path: path.into(),
                source,
            }
        }
    }
}

/// A single record skipped while loading a session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Skipped record {index}: {reason}")]
pub struct MalformedRecord {
    pub index: usize,
    pub reason: String,
}
